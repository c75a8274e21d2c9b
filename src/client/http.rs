//! REST implementation of the settings client and the logo fetcher

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

use super::{LogoBlob, LogoBlobFetcher, LogoFetch, SettingsClient, TokenProvider};
use crate::config::ApiConfig;
use crate::config::defaults::DEFAULT_MAX_INPUT_BYTES;
use crate::errors::{LogoCacheError, LogoCacheResult};
use crate::models::CompanySettings;
use crate::utils::url::UrlUtils;

const USER_AGENT: &str = concat!("company-logo-cache/", env!("CARGO_PKG_VERSION"));
const SETTINGS_PATH: &str = "company-settings";
const LOGO_PATH: &str = "logo";

/// The settings endpoint answers either `{ "data": {...} }` or the bare document
#[derive(Deserialize)]
#[serde(untagged)]
enum SettingsEnvelope {
    Wrapped { data: CompanySettings },
    Bare(CompanySettings),
}

impl SettingsEnvelope {
    fn into_inner(self) -> CompanySettings {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(settings) => settings,
        }
    }
}

#[derive(Clone)]
pub struct HttpSettingsClient {
    client: Client,
    api_base: String,
    tokens: Arc<dyn TokenProvider>,
    /// Largest logo body accepted from the blob endpoint
    max_body_bytes: usize,
}

impl HttpSettingsClient {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> LogoCacheResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Self::with_client(client, &config.base_url, tokens)
    }

    /// Use a preconfigured client, e.g. one shared with other services
    pub fn with_client(
        client: Client,
        api_base: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> LogoCacheResult<Self> {
        UrlUtils::endpoint(api_base, &[]).map_err(|e| {
            LogoCacheError::configuration(format!("invalid API base URL '{api_base}': {e}"))
        })?;

        Ok(Self {
            client,
            api_base: api_base.trim().to_string(),
            tokens,
            max_body_bytes: DEFAULT_MAX_INPUT_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, segments: &[&str]) -> LogoCacheResult<Url> {
        UrlUtils::endpoint(&self.api_base, segments)
            .map_err(|e| LogoCacheError::configuration(e.to_string()))
    }
}

#[async_trait]
impl SettingsClient for HttpSettingsClient {
    async fn get_company_settings(&self) -> LogoCacheResult<CompanySettings> {
        let url = self.endpoint(&[SETTINGS_PATH])?;
        trace!("GET {}", UrlUtils::obfuscate_credentials(url.as_str()));

        let mut request = self.client.get(url);
        if let Some(token) = self.tokens.token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LogoCacheError::settings(format!(
                "company settings request failed: HTTP {status}"
            )));
        }

        let body = response.bytes().await?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&body).map_err(|e| {
            LogoCacheError::settings(format!("malformed company settings: {e}"))
        })?;
        Ok(envelope.into_inner())
    }
}

#[async_trait]
impl LogoBlobFetcher for HttpSettingsClient {
    async fn fetch_logo(&self, file_id: &str) -> LogoCacheResult<LogoFetch> {
        let token = self
            .tokens
            .token()
            .await
            .ok_or(LogoCacheError::Unauthenticated)?;
        let url = self.endpoint(&[SETTINGS_PATH, LOGO_PATH, file_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "image/*")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(LogoFetch::NotFound);
        }
        if !status.is_success() {
            return Err(LogoCacheError::remote(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if let Some(length) = response.content_length()
            && length > self.max_body_bytes as u64
        {
            return Err(LogoCacheError::invalid_payload(format!(
                "logo body of {length} bytes exceeds {} bytes",
                self.max_body_bytes
            )));
        }

        // Chunked responses carry no length
        let bytes = response.bytes().await?;
        if bytes.len() > self.max_body_bytes {
            return Err(LogoCacheError::invalid_payload(format!(
                "logo body of {} bytes exceeds {} bytes",
                bytes.len(),
                self.max_body_bytes
            )));
        }
        debug!(
            "Fetched logo '{}': {} bytes ({})",
            file_id,
            bytes.len(),
            content_type
        );

        Ok(LogoFetch::Found(LogoBlob {
            bytes: bytes.to_vec(),
            content_type,
        }))
    }
}

impl std::fmt::Debug for HttpSettingsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSettingsClient")
            .field("api_base", &UrlUtils::obfuscate_credentials(&self.api_base))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockTokenProvider, StaticTokenProvider};

    #[test]
    fn test_rejects_unusable_base_url() {
        let err = HttpSettingsClient::with_client(
            Client::new(),
            "not a url",
            Arc::new(StaticTokenProvider::anonymous()),
        )
        .unwrap_err();
        assert!(matches!(err, LogoCacheError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_fetch_without_token_is_unauthenticated() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_token().times(1).returning(|| None);

        // Nothing listens here; the token check must fail first
        let client =
            HttpSettingsClient::with_client(Client::new(), "http://127.0.0.1:9/api", Arc::new(tokens))
                .unwrap();
        let err = client.fetch_logo("logo123").await.unwrap_err();
        assert!(matches!(err, LogoCacheError::Unauthenticated));
    }

    #[test]
    fn test_settings_envelope_shapes() {
        let wrapped: SettingsEnvelope =
            serde_json::from_str(r#"{"data":{"logoSettings":{"hasLogo":true,"logoFileName":"a"}}}"#)
                .unwrap();
        assert!(wrapped.into_inner().logo_settings.has_logo);

        let bare: SettingsEnvelope =
            serde_json::from_str(r#"{"logoSettings":{"hasLogo":false}}"#).unwrap();
        assert!(!bare.into_inner().logo_settings.has_logo);
    }

    #[test]
    fn test_body_limit_defaults_to_input_limit() {
        let client = HttpSettingsClient::with_client(
            Client::new(),
            "http://localhost:3000/api",
            Arc::new(StaticTokenProvider::anonymous()),
        )
        .unwrap();
        assert_eq!(client.max_body_bytes, DEFAULT_MAX_INPUT_BYTES);
        assert_eq!(client.with_max_body_bytes(10).max_body_bytes, 10);
    }

    #[test]
    fn test_endpoint_layout() {
        let client = HttpSettingsClient::with_client(
            Client::new(),
            "http://localhost:3000/api/",
            Arc::new(StaticTokenProvider::anonymous()),
        )
        .unwrap();
        let url = client.endpoint(&[SETTINGS_PATH, LOGO_PATH, "logo123"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/company-settings/logo/logo123"
        );
    }
}
