//! Single-record persistent store for the cached company logo

use std::sync::Arc;
use tracing::{debug, warn};

use super::key_value::KeyValueStore;
use crate::errors::StorageResult;
use crate::models::CachedLogoRecord;

/// Storage key of the embedded-image cache generation
pub const DEFAULT_STORAGE_KEY: &str = "persistent_company_logo_cache";

/// Adapter holding exactly one [`CachedLogoRecord`] under a fixed key
#[derive(Clone)]
pub struct PersistentLogoStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistentLogoStore {
    pub fn new<S: Into<String>>(backend: Arc<dyn KeyValueStore>, key: S) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the record, failing soft
    ///
    /// Backend errors and undecodable entries yield `None`; an undecodable
    /// entry is also removed so it is not parsed again on the next mount.
    pub async fn read(&self) -> Option<CachedLogoRecord> {
        let raw = match self.backend.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read logo cache '{}': {}", self.key, e);
                return None;
            }
        };

        match serde_json::from_str::<CachedLogoRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Discarding undecodable logo cache '{}': {}", self.key, e);
                if let Err(e) = self.backend.remove(&self.key).await {
                    debug!("Failed to remove undecodable logo cache: {}", e);
                }
                None
            }
        }
    }

    pub async fn write(&self, record: &CachedLogoRecord) -> StorageResult<()> {
        let json = serde_json::to_string(record)?;
        self.backend.set(&self.key, &json).await
    }

    /// Idempotent
    pub async fn delete(&self) -> StorageResult<()> {
        self.backend.remove(&self.key).await
    }
}

impl std::fmt::Debug for PersistentLogoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentLogoStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
