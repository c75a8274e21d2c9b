use anyhow::Result;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::{duration, option_duration};

use crate::services::logo_cache::{CacheConfig, EncodingStrategy, ReencodeConfig};
use crate::storage::DEFAULT_STORAGE_KEY;

/// Environment variable prefix; nested keys are separated by `__`,
/// e.g. `LOGO_CACHE_API__BASE_URL`
pub const ENV_PREFIX: &str = "LOGO_CACHE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub reencode: ReencodeSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Remote settings API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_connect_timeout", with = "duration")]
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub strategy: EncodingStrategy,
    /// Overrides the TTL implied by the strategy
    #[serde(default, with = "option_duration", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReencodeSettings {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_quality")]
    pub quality: f32,
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
    #[serde(default = "default_passthrough_threshold_bytes")]
    pub passthrough_threshold_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory of the file backed key-value store
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_quality() -> f32 {
    DEFAULT_JPEG_QUALITY
}

fn default_max_input_bytes() -> usize {
    DEFAULT_MAX_INPUT_BYTES
}

fn default_passthrough_threshold_bytes() -> usize {
    DEFAULT_PASSTHROUGH_THRESHOLD_BYTES
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_PATH)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            strategy: EncodingStrategy::default(),
            ttl: None,
            storage_key: default_storage_key(),
        }
    }
}

impl Default for ReencodeSettings {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            quality: default_quality(),
            max_input_bytes: default_max_input_bytes(),
            passthrough_threshold_bytes: default_passthrough_threshold_bytes(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::for_strategy(self.strategy);
        if let Some(ttl) = self.ttl {
            config.ttl = ttl;
        }
        config.storage_key = self.storage_key.clone();
        config
    }
}

impl ReencodeSettings {
    pub fn to_reencode_config(&self) -> ReencodeConfig {
        ReencodeConfig {
            max_width: self.max_width,
            quality: self.quality,
            max_input_bytes: self.max_input_bytes,
            passthrough_threshold_bytes: self.passthrough_threshold_bytes,
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file and `LOGO_CACHE_*` environment variables
    ///
    /// A missing file is created with the default configuration.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !std::path::Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
        if self.reencode.max_width == 0 {
            anyhow::bail!("reencode.max_width must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.reencode.quality) {
            anyhow::bail!(
                "reencode.quality must be between 0.0 and 1.0, got {}",
                self.reencode.quality
            );
        }
        if self.cache.storage_key.trim().is_empty() {
            anyhow::bail!("cache.storage_key must not be empty");
        }
        Ok(())
    }
}
