use std::fmt;

/// agui_storage 的统一错误类型
#[derive(Debug)]
pub enum StorageError {
    /// 底层存储（substrate）错误
    Substrate(SubstrateError),
    /// 序列化/反序列化错误
    Serialization(String),
    /// 配置错误
    Config(ConfigError),
    /// IO 错误
    Io(std::io::Error),
}

/// 底层存储错误
#[derive(Debug)]
pub enum SubstrateError {
    /// 写入后超出容量上限
    QuotaExceeded { needed: usize, capacity: usize },
    /// 存储不可用（锁中毒、访问被拒绝等）
    Unavailable(String),
    /// 持久化文件读写失败
    Io(String),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Substrate(e) => write!(f, "Substrate Error: {}", e),
            StorageError::Serialization(msg) => write!(f, "Serialization Error: {}", msg),
            StorageError::Config(e) => write!(f, "Config Error: {}", e),
            StorageError::Io(e) => write!(f, "IO Error: {}", e),
        }
    }
}

impl fmt::Display for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstrateError::QuotaExceeded { needed, capacity } => write!(
                f,
                "Quota exceeded: {} bytes needed, capacity is {} bytes",
                needed, capacity
            ),
            SubstrateError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            SubstrateError::Io(msg) => write!(f, "Storage IO failed: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Substrate(e) => Some(e),
            StorageError::Config(e) => Some(e),
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_) => None,
        }
    }
}

impl std::error::Error for SubstrateError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        StorageError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<SubstrateError> for StorageError {
    fn from(err: SubstrateError) -> Self {
        StorageError::Substrate(err)
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::Config(err)
    }
}

impl StorageError {
    /// 是否为容量超限错误
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            StorageError::Substrate(SubstrateError::QuotaExceeded { .. })
        )
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, StorageError>;
