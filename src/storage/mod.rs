//! 存储系统
//!
//! 分两层：
//!
//! | 层次 | 实现 | 特点 |
//! |------|------|------|
//! | 底层存储 | [`Substrate`] / [`MemorySubstrate`] / [`FileSubstrate`] | 同步、原始字符串、多方共享 |
//! | 适配器 | [`KeyValueStore`] / [`ChatStorage`] | 异步、带前缀、JSON 序列化 |
//!
//! ```rust,no_run
//! use agui_storage::storage::{ChatStorage, FileSubstrate};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> agui_storage::error::Result<()> {
//! let substrate = Arc::new(FileSubstrate::open("~/.agui-chat/storage.json")?);
//! let storage = ChatStorage::new(substrate);
//! storage.set_conversation("c1", &json!({
//!     "title": "你好",
//!     "updatedAt": "2024-05-01T08:00:00Z"
//! })).await?;
//! let removed = storage.cleanup_default().await.removed;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod keys;
pub mod substrate;

pub use adapter::{ChatStorage, CleanupReport, KeyValueStore, Lookup, StorageStats};
pub use keys::{Namespace, StorageKey};
pub use substrate::{DEFAULT_CAPACITY, FileSubstrate, MemorySubstrate, Substrate};
