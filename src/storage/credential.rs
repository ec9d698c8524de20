use std::sync::Arc;

use super::KeyValueStore;
use crate::types::PkpRecord;
use crate::Result;

/// Storage key the PKP record lives under
pub const PKP_STORAGE_KEY: &str = "pkp";

/// Persists the single PKP record a client tracks
///
/// There is no coordination between writers; the last `put` wins.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(backend, PKP_STORAGE_KEY)
    }

    /// Store the record under a different key, e.g. one per wallet
    pub fn with_key(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize and write `record`, replacing any previous one
    pub async fn put(&self, record: &PkpRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.backend.set_item(&self.key, &json).await
    }

    /// The stored record, or `None` if none was ever written
    pub async fn get(&self) -> Result<Option<PkpRecord>> {
        match self.backend.get_item(&self.key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
