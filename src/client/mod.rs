//! Remote collaborators of the logo cache
//!
//! The controller only depends on the traits in this module:
//!
//! - [`SettingsClient`] returns the company settings (logo metadata)
//! - [`LogoBlobFetcher`] downloads the logo bytes for a file identifier
//! - [`TokenProvider`] hands out the bearer token at request time
//!
//! [`HttpSettingsClient`] implements the first two over REST.

use async_trait::async_trait;

use crate::errors::LogoCacheResult;
use crate::models::CompanySettings;

pub mod http;
pub mod token;

pub use http::HttpSettingsClient;
pub use token::{AUTH_TOKEN_KEY, StaticTokenProvider, StoredTokenProvider};

#[cfg(test)]
use mockall::automock;

/// Raw logo body with the content type declared by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Outcome of a logo download; a missing file is not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoFetch {
    Found(LogoBlob),
    NotFound,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettingsClient: Send + Sync {
    async fn get_company_settings(&self) -> LogoCacheResult<CompanySettings>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogoBlobFetcher: Send + Sync {
    /// Download the logo stored under `file_id`
    async fn fetch_logo(&self, file_id: &str) -> LogoCacheResult<LogoFetch>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, read on every call
    async fn token(&self) -> Option<String>;
}
