//! 存储配置加载
//!
//! 支持两种来源：
//!
//! - YAML 文件：[`StorageConfig::load`]
//! - 环境变量（自动读取 `.env`）：[`StorageConfig::from_env`]
//!
//! ```yaml
//! prefix: "agui-chat:"
//! capacity_bytes: 5242880
//! cleanup_max_age_days: 30
//! backend:
//!   kind: file
//!   path: ~/.agui-chat/storage.json
//! ```
//!
//! 环境变量：
//! ```text
//! AGUI_STORAGE_PREFIX=agui-chat:
//! AGUI_STORAGE_CAPACITY=5242880
//! AGUI_STORAGE_CLEANUP_DAYS=30
//! AGUI_STORAGE_PATH=~/.agui-chat/storage.json
//! ```

use crate::error::{ConfigError, Result};
use crate::storage::substrate::DEFAULT_CAPACITY;
use dotenv::dotenv;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// 未配置时使用的键前缀
pub const DEFAULT_PREFIX: &str = "agui-chat:";

/// `cleanup` 默认清理阈值（天）
pub const DEFAULT_CLEANUP_MAX_AGE_DAYS: u64 = 30;

const ENV_PREFIX: &str = "AGUI_STORAGE_PREFIX";
const ENV_CAPACITY: &str = "AGUI_STORAGE_CAPACITY";
const ENV_CLEANUP_DAYS: &str = "AGUI_STORAGE_CLEANUP_DAYS";
const ENV_PATH: &str = "AGUI_STORAGE_PATH";

/// 底层存储后端选择
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// 进程内存，重启即清空
    #[default]
    Memory,
    /// JSON 文件持久化
    File { path: PathBuf },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// 所有键统一追加的前缀
    pub prefix: String,
    /// 底层存储容量上限（字节），同时作为 `storage_stats().total`
    pub capacity_bytes: usize,
    pub cleanup_max_age_days: u64,
    pub backend: BackendConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            capacity_bytes: DEFAULT_CAPACITY,
            cleanup_max_age_days: DEFAULT_CLEANUP_MAX_AGE_DAYS,
            backend: BackendConfig::Memory,
        }
    }
}

impl StorageConfig {
    /// 从 YAML 文件加载，缺失字段使用默认值
    pub fn load(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: StorageConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// 从环境变量加载（先尝试读取 `.env`），未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// 从任意键值对中读取 `AGUI_STORAGE_*` 配置
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            match key.as_str() {
                ENV_PREFIX => config.prefix = value,
                ENV_CAPACITY => config.capacity_bytes = parse_number(&key, &value)?,
                ENV_CLEANUP_DAYS => config.cleanup_max_age_days = parse_number(&key, &value)?,
                ENV_PATH => {
                    config.backend = BackendConfig::File {
                        path: PathBuf::from(value),
                    }
                }
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "prefix".to_string(),
                message: "prefix must not be empty".to_string(),
            }
            .into());
        }
        if self.capacity_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capacity_bytes".to_string(),
                message: "capacity must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_days * 24 * 60 * 60)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("'{}' is not a valid number", value),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.prefix, "agui-chat:");
        assert_eq!(config.capacity_bytes, 5 * 1024 * 1024);
        assert_eq!(config.backend, BackendConfig::Memory);
        assert_eq!(
            config.cleanup_max_age(),
            Duration::from_secs(30 * 24 * 60 * 60)
        );
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = StorageConfig::from_vars(vars(&[
            ("AGUI_STORAGE_PREFIX", "t:"),
            ("AGUI_STORAGE_CAPACITY", "1024"),
            ("AGUI_STORAGE_CLEANUP_DAYS", "7"),
            ("AGUI_STORAGE_PATH", "/tmp/agui/storage.json"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();
        assert_eq!(config.prefix, "t:");
        assert_eq!(config.capacity_bytes, 1024);
        assert_eq!(config.cleanup_max_age_days, 7);
        assert_eq!(
            config.backend,
            BackendConfig::File {
                path: PathBuf::from("/tmp/agui/storage.json")
            }
        );
    }

    #[test]
    fn test_from_vars_rejects_bad_number() {
        let err = StorageConfig::from_vars(vars(&[("AGUI_STORAGE_CAPACITY", "lots")]))
            .unwrap_err();
        match err {
            StorageError::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "AGUI_STORAGE_CAPACITY")
            }
            other => panic!("应该是 InvalidValue，实际为 {other:?}"),
        }
    }

    #[test]
    fn test_empty_prefix_is_invalid() {
        let err = StorageConfig::from_vars(vars(&[("AGUI_STORAGE_PREFIX", "")])).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "prefix: \"app:\"\nbackend:\n  kind: file\n  path: /tmp/agui-store.json"
        )
        .unwrap();

        let config = StorageConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.prefix, "app:");
        assert_eq!(config.capacity_bytes, DEFAULT_CAPACITY);
        assert_eq!(
            config.backend,
            BackendConfig::File {
                path: PathBuf::from("/tmp/agui-store.json")
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = StorageConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Config(ConfigError::FileNotFound(_))
        ));
    }
}
