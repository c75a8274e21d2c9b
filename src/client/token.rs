//! Bearer token providers

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::TokenProvider;
use crate::storage::KeyValueStore;

/// Well-known key the session token is stored under
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Fixed token (or none), e.g. from the command line
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.trim().is_empty())
    }
}

/// Reads the token from a key-value store on every call, so a login or
/// logout in between two requests is picked up
#[derive(Clone)]
pub struct StoredTokenProvider {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl StoredTokenProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: AUTH_TOKEN_KEY.to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn token(&self) -> Option<String> {
        match self.store.get(&self.key).await {
            Ok(token) => token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("Failed to read auth token '{}': {}", self.key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_static_provider() {
        assert_eq!(StaticTokenProvider::new("abc").token().await.as_deref(), Some("abc"));
        assert_eq!(StaticTokenProvider::new("  ").token().await, None);
        assert_eq!(StaticTokenProvider::anonymous().token().await, None);
    }

    #[tokio::test]
    async fn test_stored_provider_reads_at_call_time() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let provider = StoredTokenProvider::new(store.clone());
        assert_eq!(provider.token().await, None);

        store.set(AUTH_TOKEN_KEY, "secret\n").await.unwrap();
        assert_eq!(provider.token().await.as_deref(), Some("secret"));

        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(provider.token().await, None);
    }
}
