//! 底层同步键值存储（substrate）
//!
//! [`Substrate`] 只提供四个同步原语：按 key 读、写、删，以及枚举全部 key。
//! 所有 key 区分大小写；同一个 substrate 可被多个使用方共享，
//! 容量上限对所有使用方合计生效。
//!
//! ## 内置实现
//!
//! | 类型 | 说明 |
//! |------|------|
//! | [`MemorySubstrate`] | 进程内存，重启即清空，适合测试 |
//! | [`FileSubstrate`] | JSON 文件持久化，写时立即落盘 |

use crate::error::{Result, SubstrateError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// 默认容量（5 MiB），与浏览器 localStorage 的常见上限一致
pub const DEFAULT_CAPACITY: usize = 5 * 1024 * 1024;

// ── Substrate trait ───────────────────────────────────────────────────────────

/// 同步字符串键值存储接口
///
/// 实现方可替换为任意后端（内存、文件、远程等），上层 [`ChatStorage`] 无需改动。
///
/// [`ChatStorage`]: crate::storage::ChatStorage
pub trait Substrate: Send + Sync {
    /// 读取原始值，不存在时返回 `None`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// 写入或覆盖；超出容量时返回 [`SubstrateError::QuotaExceeded`]，原值保持不变
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// 删除指定 key，不存在时视为成功
    fn remove_item(&self, key: &str) -> Result<()>;

    /// 按迭代顺序列出全部 key（包括其他使用方写入的 key）
    fn keys(&self) -> Result<Vec<String>>;
}

// ── MemorySubstrate ───────────────────────────────────────────────────────────

/// 进程内存 substrate，不持久化
pub struct MemorySubstrate {
    entries: RwLock<BTreeMap<String, String>>,
    capacity: usize,
}

impl Default for MemorySubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前占用字节数（所有 key 与 value 长度之和）
    pub fn usage(&self) -> Result<usize> {
        Ok(usage_of(&*read_lock(&self.entries)?))
    }
}

impl Substrate for MemorySubstrate {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = write_lock(&self.entries)?;
        check_quota(&entries, key, value, self.capacity)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        write_lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(read_lock(&self.entries)?.keys().cloned().collect())
    }
}

// ── FileSubstrate ─────────────────────────────────────────────────────────────

/// 基于 JSON 文件的持久化 substrate
///
/// 写时立即落盘（先写临时文件再原子重命名），读时从内存缓存返回。
///
/// 存储格式（key 为带前缀的完整 key，value 为序列化后的文本）：
/// ```json
/// {
///   "agui-chat:theme": "{\"mode\":\"dark\"}"
/// }
/// ```
pub struct FileSubstrate {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    capacity: usize,
}

impl FileSubstrate {
    /// 打开或创建存储文件，自动建父目录
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SubstrateError::Io(format!("创建目录失败: {e}")))?;
        }
        let entries: BTreeMap<String, String> = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| SubstrateError::Io(format!("读取存储文件失败: {e}")))?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("存储文件解析失败，从空状态开始: {e}");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), entries = entries.len(), capacity, "🗄️ FileSubstrate 初始化");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let temp = temp_path(&self.path);
        std::fs::write(&temp, json)
            .map_err(|e| SubstrateError::Io(format!("写入存储文件失败: {e}")))?;
        std::fs::rename(&temp, &self.path)
            .map_err(|e| SubstrateError::Io(format!("替换存储文件失败: {e}")))?;
        debug!(path = %self.path.display(), "💾 Substrate 已持久化");
        Ok(())
    }
}

impl Substrate for FileSubstrate {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = write_lock(&self.entries)?;
        check_quota(&entries, key, value, self.capacity)?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&entries) {
            // 落盘失败时回滚内存状态，保持与文件一致
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = write_lock(&self.entries)?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(read_lock(&self.entries)?.keys().cloned().collect())
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn read_lock(
    lock: &RwLock<BTreeMap<String, String>>,
) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>> {
    lock.read()
        .map_err(|_| SubstrateError::Unavailable("storage lock poisoned".to_string()).into())
}

fn write_lock(
    lock: &RwLock<BTreeMap<String, String>>,
) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
    lock.write()
        .map_err(|_| SubstrateError::Unavailable("storage lock poisoned".to_string()).into())
}

fn usage_of(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// 计算写入后的总占用，超出容量则拒绝
fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    capacity: usize,
) -> std::result::Result<(), SubstrateError> {
    let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    let needed = usage_of(entries) - replaced + key.len() + value.len();
    if needed > capacity {
        return Err(SubstrateError::QuotaExceeded { needed, capacity });
    }
    Ok(())
}

/// 在完整文件名后追加 `.tmp`，避免与存储文件本身或同名异扩展名的文件冲突
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}
