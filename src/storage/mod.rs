//! Durable key/value storage for the PKP record
//!
//! Backends are chosen once, when the client is built:
//!
//! - **FileStore**: one file per key under a directory
//! - **MemoryStore**: process-local map (testing, ephemeral sessions)
//!
//! [`CredentialStore`] sits on top and (de)serializes the one record this
//! crate persists.

mod credential;
mod file;
mod memory;

pub use credential::{CredentialStore, PKP_STORAGE_KEY};
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::Result;

/// String key/value storage, mirroring `getItem`/`setItem`
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` if nothing was written
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Open the backend described by `config`
pub fn open(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageConfig::File { dir } => Ok(Arc::new(FileStore::new(dir)?)),
    }
}
