//! 测试基础设施
//!
//! 提供在不依赖真实存储后端的情况下测试 [`ChatStorage`] 错误路径的工具。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockSubstrate`] | 内存 substrate，可按操作注入失败，并记录每次调用 |
//!
//! # 使用示例
//!
//! ```rust
//! use agui_storage::storage::ChatStorage;
//! use agui_storage::testing::MockSubstrate;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let substrate = Arc::new(MockSubstrate::new());
//! let storage = ChatStorage::with_prefix(substrate.clone(), "t:");
//!
//! substrate.fail_writes(true);
//! assert!(storage.set("theme", &"dark").await.is_err());
//!
//! substrate.fail_writes(false);
//! storage.set("theme", &"dark").await.unwrap();
//! assert_eq!(substrate.set_calls(), 2);
//! # }
//! ```
//!
//! [`ChatStorage`]: crate::storage::ChatStorage

mod mock_substrate;

pub use mock_substrate::{MockSubstrate, SubstrateCall};
