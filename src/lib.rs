pub mod config;
pub mod error;
pub mod storage;
pub mod testing;

pub mod prelude {
    pub use crate::config::{BackendConfig, StorageConfig};
    pub use crate::error::{Result, StorageError};
    pub use crate::storage::{
        ChatStorage, FileSubstrate, KeyValueStore, Lookup, MemorySubstrate, StorageKey,
        StorageStats, Substrate,
    };
}
