//! 带命名空间的异步 KV 适配器
//!
//! [`ChatStorage`] 把同步的 [`Substrate`] 包装成异步接口：
//!
//! - 所有 key 自动加上前缀（默认 `"agui-chat:"`），与共享同一 substrate 的其他数据隔离
//! - 值以 JSON 文本存储，读取时反序列化为调用方期望的类型
//! - 在四个原语（get / set / remove / keys）之上提供会话、主题、配置、附件等便捷方法
//!
//! 错误策略：
//!
//! | 操作 | 失败时 |
//! |------|--------|
//! | 读（`get` / `lookup`） | 记录 warn，按未命中返回 |
//! | 写 / 删（`set` / `remove` / `clear`） | 记录 error，向上传播 |
//! | 枚举 / 统计（`keys` / `storage_stats`） | 记录 warn，退化为空结果 |
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use agui_storage::storage::{ChatStorage, MemorySubstrate};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> agui_storage::error::Result<()> {
//! let storage = ChatStorage::with_prefix(Arc::new(MemorySubstrate::new()), "t:");
//! storage.set_theme(&json!({"mode": "dark"})).await?;
//! let theme: Option<serde_json::Value> = storage.get_theme().await;
//! # Ok(())
//! # }
//! ```

use crate::config::{BackendConfig, DEFAULT_PREFIX, StorageConfig};
use crate::error::{Result, StorageError};
use crate::storage::keys::{Namespace, StorageKey};
use crate::storage::substrate::{DEFAULT_CAPACITY, FileSubstrate, MemorySubstrate, Substrate};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const UPDATED_AT_FIELD: &str = "updatedAt";

// ── Lookup ───────────────────────────────────────────────────────────────────

/// 单次读取的结果，区分真正的未命中与无法解析的值
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// 值无法读取或无法反序列化为目标类型
    Corrupt(String),
}

impl<T> Lookup<T> {
    /// 折叠为 `Option`，`NotFound` 与 `Corrupt` 都视为 `None`
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Corrupt(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Lookup::Corrupt(_))
    }
}

// ── StorageStats / CleanupReport ─────────────────────────────────────────────

/// 当前前缀下的占用统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// 所有值文本的字节数之和
    pub used: usize,
    /// 容量估计值
    pub total: usize,
    /// key 数量
    pub count: usize,
}

/// 一次 `cleanup` 的执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// 检查过的会话数
    pub scanned: usize,
    /// 被删除的会话 id
    pub removed: Vec<String>,
    /// 缺少或无法解析 `updatedAt` 而跳过的会话数
    pub skipped: usize,
    /// 删除失败的会话数
    pub failed: usize,
}

// ── KeyValueStore trait ──────────────────────────────────────────────────────

/// 与具体 substrate 无关的异步 KV 接口（JSON 值）
///
/// 调用方只依赖该接口，即可在内存、文件或其他后端之间切换。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取并区分未命中 / 损坏
    async fn lookup_value(&self, key: &str) -> Lookup<Value>;

    /// 读取，未命中或损坏时返回 `None`
    async fn get_value(&self, key: &str) -> Option<Value> {
        self.lookup_value(key).await.into_option()
    }

    /// 写入或覆盖
    async fn set_value(&self, key: &str, value: &Value) -> Result<()>;

    /// 删除，不存在时视为成功
    async fn remove(&self, key: &str) -> Result<()>;

    /// 删除当前前缀下的全部 key
    async fn clear(&self) -> Result<()>;

    /// 列出当前前缀下的逻辑 key（已去掉前缀）
    async fn keys(&self) -> Vec<String>;
}

// ── ChatStorage ──────────────────────────────────────────────────────────────

/// 带前缀命名空间、JSON 序列化的聊天数据存储
#[derive(Clone)]
pub struct ChatStorage {
    substrate: Arc<dyn Substrate>,
    prefix: String,
    capacity: usize,
    cleanup_max_age: Duration,
}

impl ChatStorage {
    /// 使用默认前缀 `"agui-chat:"`
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self::with_prefix(substrate, DEFAULT_PREFIX)
    }

    pub fn with_prefix(substrate: Arc<dyn Substrate>, prefix: impl Into<String>) -> Self {
        Self {
            substrate,
            prefix: prefix.into(),
            capacity: DEFAULT_CAPACITY,
            cleanup_max_age: StorageConfig::default().cleanup_max_age(),
        }
    }

    /// 按配置创建 substrate 与适配器
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let substrate: Arc<dyn Substrate> = match &config.backend {
            BackendConfig::Memory => Arc::new(MemorySubstrate::with_capacity(config.capacity_bytes)),
            BackendConfig::File { path } => Arc::new(FileSubstrate::open_with_capacity(
                path,
                config.capacity_bytes,
            )?),
        };
        info!(prefix = %config.prefix, backend = ?config.backend, "📦 ChatStorage 初始化");
        Ok(Self::with_prefix(substrate, config.prefix.clone())
            .with_capacity(config.capacity_bytes)
            .with_cleanup_max_age(config.cleanup_max_age()))
    }

    /// 设置 `storage_stats().total` 报告的容量估计值
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// 设置 [`cleanup_default`](Self::cleanup_default) 使用的阈值
    pub fn with_cleanup_max_age(mut self, max_age: Duration) -> Self {
        self.cleanup_max_age = max_age;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn substrate(&self) -> &Arc<dyn Substrate> {
        &self.substrate
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    // ── 基础操作 ──

    /// 读取并反序列化，区分未命中与损坏
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let raw = match self.substrate.get_item(&self.namespaced(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Lookup::NotFound,
            Err(e) => {
                warn!(key = %key, error = %e, "⚠️ 读取失败，按未命中处理");
                return Lookup::Corrupt(e.to_string());
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Lookup::Found(value),
            Err(e) => {
                warn!(key = %key, error = %e, "⚠️ 值无法解析，按未命中处理");
                Lookup::Corrupt(e.to_string())
            }
        }
    }

    /// 读取，未命中或损坏时返回 `None`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_option()
    }

    /// 序列化并写入；序列化失败或 substrate 写入失败（如超出容量）时返回错误
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value).map_err(|e| {
            error!(key = %key, error = %e, "❌ 序列化失败");
            StorageError::from(e)
        })?;
        self.substrate
            .set_item(&self.namespaced(key), &text)
            .inspect_err(|e| error!(key = %key, error = %e, "❌ 写入失败"))?;
        debug!(key = %key, bytes = text.len(), "💾 已写入");
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.substrate
            .remove_item(&self.namespaced(key))
            .inspect_err(|e| error!(key = %key, error = %e, "❌ 删除失败"))?;
        debug!(key = %key, "🗑️ 已删除");
        Ok(())
    }

    /// 删除当前前缀下的全部 key，遇到第一个删除失败即返回
    pub async fn clear(&self) -> Result<()> {
        let keys = self.keys().await;
        for key in &keys {
            self.remove(key).await?;
        }
        info!(prefix = %self.prefix, removed = keys.len(), "🧹 已清空");
        Ok(())
    }

    /// 列出当前前缀下的逻辑 key；枚举失败时返回空列表
    pub async fn keys(&self) -> Vec<String> {
        match self.substrate.keys() {
            Ok(all) => all
                .into_iter()
                .filter_map(|k| k.strip_prefix(self.prefix.as_str()).map(String::from))
                .collect(),
            Err(e) => {
                warn!(prefix = %self.prefix, error = %e, "⚠️ 枚举 key 失败");
                Vec::new()
            }
        }
    }

    async fn keys_in(&self, namespace: Namespace) -> Vec<String> {
        self.keys()
            .await
            .into_iter()
            .filter(|k| k.starts_with(namespace.prefix()))
            .collect()
    }

    // ── 会话 ──

    /// 所有会话的逻辑 key（`conversation:<id>`）
    pub async fn conversations(&self) -> Vec<String> {
        self.keys_in(Namespace::Conversation).await
    }

    /// 所有会话摘要的逻辑 key（`conversation-summary:<id>`）
    pub async fn conversation_summaries(&self) -> Vec<String> {
        self.keys_in(Namespace::ConversationSummary).await
    }

    /// 所有会话 id
    pub async fn conversation_ids(&self) -> Vec<String> {
        self.conversations()
            .await
            .iter()
            .filter_map(|k| Namespace::Conversation.strip(k).map(String::from))
            .collect()
    }

    pub async fn set_conversation<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> Result<()> {
        self.set(&Namespace::Conversation.key(id).logical(), value).await
    }

    pub async fn get_conversation<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.get(&Namespace::Conversation.key(id).logical()).await
    }

    /// 删除会话及其摘要
    ///
    /// 两次删除相互独立：会话先删，若随后删除摘要失败，会话不会恢复。
    pub async fn remove_conversation(&self, id: &str) -> Result<()> {
        self.remove(&Namespace::Conversation.key(id).logical()).await?;
        self.remove(&Namespace::ConversationSummary.key(id).logical())
            .await
    }

    pub async fn set_conversation_summary<T: Serialize + ?Sized>(
        &self,
        id: &str,
        value: &T,
    ) -> Result<()> {
        self.set(&Namespace::ConversationSummary.key(id).logical(), value)
            .await
    }

    pub async fn get_conversation_summary<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.get(&Namespace::ConversationSummary.key(id).logical())
            .await
    }

    // ── 主题 / 配置 ──

    pub async fn set_theme<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.set(&StorageKey::Theme.logical(), value).await
    }

    pub async fn get_theme<T: DeserializeOwned>(&self) -> Option<T> {
        self.get(&StorageKey::Theme.logical()).await
    }

    pub async fn set_config<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.set(&StorageKey::Config.logical(), value).await
    }

    pub async fn get_config<T: DeserializeOwned>(&self) -> Option<T> {
        self.get(&StorageKey::Config.logical()).await
    }

    // ── 文件附件 ──

    pub async fn set_file_attachment<T: Serialize + ?Sized>(
        &self,
        id: &str,
        value: &T,
    ) -> Result<()> {
        self.set(&Namespace::File.key(id).logical(), value).await
    }

    pub async fn get_file_attachment<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.get(&Namespace::File.key(id).logical()).await
    }

    pub async fn remove_file_attachment(&self, id: &str) -> Result<()> {
        self.remove(&Namespace::File.key(id).logical()).await
    }

    // ── 维护 ──

    /// 按配置的阈值（默认 30 天）清理过期会话
    pub async fn cleanup_default(&self) -> CleanupReport {
        self.cleanup(self.cleanup_max_age).await
    }

    /// 删除 `updatedAt` 早于 `max_age` 的会话及其摘要
    pub async fn cleanup(&self, max_age: Duration) -> CleanupReport {
        self.cleanup_at(max_age, Utc::now()).await
    }

    /// 以 `now` 为当前时间执行清理
    ///
    /// 尽力而为：单个会话删除失败只记录并计数，不中断后续清理。
    /// 缺少 `updatedAt`、值损坏或时间无法解析的会话会被跳过，不会被删除。
    pub async fn cleanup_at(&self, max_age: Duration, now: DateTime<Utc>) -> CleanupReport {
        let now_ms = now.timestamp_millis();
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let mut report = CleanupReport::default();

        for id in self.conversation_ids().await {
            report.scanned += 1;
            let updated_ms = self
                .get::<Value>(&Namespace::Conversation.key(id.as_str()).logical())
                .await
                .as_ref()
                .and_then(updated_at_millis);
            let Some(updated_ms) = updated_ms else {
                debug!(conversation = %id, "⏭️ 缺少 updatedAt，跳过");
                report.skipped += 1;
                continue;
            };
            if now_ms.saturating_sub(updated_ms) <= max_age_ms {
                continue;
            }
            let removed = self.remove_conversation(&id).await;
            match removed {
                Ok(()) => report.removed.push(id),
                Err(e) => {
                    warn!(conversation = %id, error = %e, "⚠️ 清理会话失败，继续");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed.len(),
            skipped = report.skipped,
            failed = report.failed,
            "🧹 会话清理完成"
        );
        report
    }

    /// 当前前缀下的占用统计；读取失败的值按 0 字节计
    pub async fn storage_stats(&self) -> StorageStats {
        let keys = self.keys().await;
        let used: usize = keys
            .iter()
            .filter_map(|k| self.substrate.get_item(&self.namespaced(k)).ok().flatten())
            .map(|v| v.len())
            .sum();
        StorageStats {
            used,
            total: self.capacity,
            count: keys.len(),
        }
    }
}

#[async_trait]
impl KeyValueStore for ChatStorage {
    async fn lookup_value(&self, key: &str) -> Lookup<Value> {
        self.lookup(key).await
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        self.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        ChatStorage::remove(self, key).await
    }

    async fn clear(&self) -> Result<()> {
        ChatStorage::clear(self).await
    }

    async fn keys(&self) -> Vec<String> {
        ChatStorage::keys(self).await
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

/// 解析 `updatedAt`：数字视为毫秒时间戳，字符串支持 RFC 3339、无时区日期时间及纯日期
fn updated_at_millis(value: &Value) -> Option<i64> {
    match value.get(UPDATED_AT_FIELD)? {
        Value::Number(n) => n.as_i64().or_else(|| float_millis(n.as_f64()?)),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

/// 超出 i64 范围的数字（如大于 `i64::MAX` 的 u64）无法表示为时间戳，按无法解析处理
fn float_millis(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// 纯数字字符串（如 `"2026"`、`"20261017"`）不是时间戳，返回 `None`
fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
