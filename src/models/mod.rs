//! Data model of the logo cache: settings snapshot, persisted record and the
//! value published to subscribers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::url::UrlUtils;

pub mod embedded_image;

pub use embedded_image::{EmbeddedImage, EmbeddedImageError, JPEG_DATA_URL_PREFIX, KNOWN_IMAGE_TYPES};

/// Fingerprint of a settings snapshot that has no logo
pub const NO_LOGO_FINGERPRINT: &str = "no-logo";

/// Logo metadata as reported by the company settings endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSettings {
    #[serde(default)]
    pub has_logo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_size: Option<u64>,
}

impl LogoSettings {
    /// Snapshot describing a company without a logo
    pub fn none() -> Self {
        Self::default()
    }

    /// Snapshot describing an uploaded logo file
    pub fn with_file<S: Into<String>>(file_name: S, size: u64) -> Self {
        Self {
            has_logo: true,
            logo_file_name: Some(file_name.into()),
            logo_url: None,
            logo_size: Some(size),
        }
    }

    /// Remote file identifier of the logo
    ///
    /// The explicit file name wins; otherwise the identifier is read from the
    /// segment after `/logo/` in the logo URL.
    pub fn file_id(&self) -> Option<String> {
        if let Some(name) = self.logo_file_name.as_deref()
            && !name.trim().is_empty()
        {
            return Some(name.trim().to_string());
        }

        self.logo_url
            .as_deref()
            .and_then(UrlUtils::extract_logo_file_id)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }
}

/// Cheap change detector for logo settings
///
/// Depends only on the file identifier and the declared size.
pub fn fingerprint(settings: &LogoSettings) -> String {
    if !settings.has_logo {
        return NO_LOGO_FINGERPRINT.to_string();
    }

    format!(
        "{}-{}",
        settings.file_id().unwrap_or_default(),
        settings.logo_size.unwrap_or(0)
    )
}

/// The part of the company settings document the cache depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    #[serde(default)]
    pub logo_settings: LogoSettings,
}

/// The single persisted cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLogoRecord {
    pub encoded_image: Option<EmbeddedImage>,
    pub settings_snapshot: LogoSettings,
    pub content_fingerprint: String,
    pub fetched_at_millis: i64,
}

impl CachedLogoRecord {
    /// Build a record, deriving the fingerprint from the snapshot
    pub fn new(
        encoded_image: Option<EmbeddedImage>,
        settings_snapshot: LogoSettings,
        fetched_at_millis: i64,
    ) -> Self {
        let content_fingerprint = fingerprint(&settings_snapshot);
        Self {
            encoded_image,
            settings_snapshot,
            content_fingerprint,
            fetched_at_millis,
        }
    }

    /// Age of the record; records stamped in the future count as fresh
    pub fn age(&self, now_millis: i64) -> Duration {
        Duration::from_millis(now_millis.saturating_sub(self.fetched_at_millis).max(0) as u64)
    }

    /// Image presence matches the snapshot and the fingerprint is derived from it
    pub fn is_consistent(&self) -> bool {
        self.encoded_image.is_some() == self.settings_snapshot.has_logo
            && self.content_fingerprint == fingerprint(&self.settings_snapshot)
    }

    /// Fresh, consistent and carrying a well-formed image
    pub fn is_valid_for_use(&self, now_millis: i64, ttl: Duration) -> bool {
        self.age(now_millis) < ttl
            && self.is_consistent()
            && self
                .encoded_image
                .as_ref()
                .is_some_and(EmbeddedImage::is_well_formed)
    }
}

/// Coarse state of the published value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoPhase {
    Loading,
    Error,
    ReadyWithLogo,
    ReadyEmpty,
}

/// Value published by the controller to every display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoState {
    pub logo_url: Option<EmbeddedImage>,
    pub loading: bool,
    pub error: Option<String>,
}

impl LogoState {
    /// No logo, not loading, no error
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ready(image: EmbeddedImage) -> Self {
        Self {
            logo_url: Some(image),
            loading: false,
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            logo_url: None,
            loading: false,
            error: Some(message.into()),
        }
    }

    /// Loading state that keeps whatever logo is currently shown
    pub fn loading_from(previous: &LogoState) -> Self {
        Self {
            logo_url: previous.logo_url.clone(),
            loading: true,
            error: None,
        }
    }

    pub fn phase(&self) -> LogoPhase {
        if self.loading {
            LogoPhase::Loading
        } else if self.error.is_some() {
            LogoPhase::Error
        } else if self.logo_url.is_some() {
            LogoPhase::ReadyWithLogo
        } else {
            LogoPhase::ReadyEmpty
        }
    }
}
