//! Controller configuration: TTL, encoding strategy and storage key

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;

use crate::config::defaults::{DEFAULT_EMBEDDED_TTL, DEFAULT_SHORT_LIVED_TTL};
use crate::storage::DEFAULT_STORAGE_KEY;

/// How fetched logo bytes are turned into the cached image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EncodingStrategy {
    /// Bounded JPEG data URL, white background
    #[default]
    Reencode,
    /// Fetched bytes wrapped unchanged
    Original,
}

impl EncodingStrategy {
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Reencode => DEFAULT_EMBEDDED_TTL,
            Self::Original => DEFAULT_SHORT_LIVED_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub strategy: EncodingStrategy,
    pub storage_key: String,
}

impl CacheConfig {
    /// Long-lived re-encoded cache (7 days)
    pub fn embedded() -> Self {
        Self::for_strategy(EncodingStrategy::Reencode)
    }

    /// Short-lived cache of the original bytes (24 hours)
    pub fn short_lived() -> Self {
        Self::for_strategy(EncodingStrategy::Original)
    }

    pub fn for_strategy(strategy: EncodingStrategy) -> Self {
        Self {
            ttl: strategy.default_ttl(),
            strategy,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::embedded()
    }
}
