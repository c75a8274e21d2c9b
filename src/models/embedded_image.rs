//! Self-describing embedded image (data URL)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Image types accepted as a cached or displayed logo
pub const KNOWN_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
];

/// Prefix every re-encoded logo starts with
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EmbeddedImageError {
    #[error("not a data URL")]
    MissingScheme,
    #[error("data URL has no payload separator")]
    MissingPayload,
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error("data URL has an empty media type")]
    EmptyMediaType,
}

/// An image carried inline as `data:<mime>;base64,<payload>`
///
/// The payload is kept base64 encoded; it is only decoded when the bytes are
/// actually needed (display checks, exports).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmbeddedImage {
    mime_type: String,
    payload: String,
}

impl EmbeddedImage {
    /// Wrap raw bytes with the given media type
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: normalize_mime(mime_type),
            payload: STANDARD.encode(bytes),
        }
    }

    /// Parse a data URL string
    pub fn parse(data_url: &str) -> Result<Self, EmbeddedImageError> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or(EmbeddedImageError::MissingScheme)?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or(EmbeddedImageError::MissingPayload)?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or(EmbeddedImageError::NotBase64)?;
        let mime_type = normalize_mime(media_type);
        if mime_type.is_empty() {
            return Err(EmbeddedImageError::EmptyMediaType);
        }

        Ok(Self {
            mime_type,
            payload: payload.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Whether the declared type tag is one of [`KNOWN_IMAGE_TYPES`]
    pub fn is_known_image_type(&self) -> bool {
        KNOWN_IMAGE_TYPES.contains(&self.mime_type.as_str())
    }

    /// Known image type with a non-empty payload
    pub fn is_well_formed(&self) -> bool {
        self.is_known_image_type() && !self.payload.is_empty()
    }

    pub fn is_jpeg(&self) -> bool {
        self.mime_type == "image/jpeg"
    }

    /// Decode the base64 payload back into image bytes
    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.payload.as_bytes())
    }

    /// Length of the full data URL in bytes
    pub fn encoded_len(&self) -> usize {
        "data:".len() + self.mime_type.len() + ";base64,".len() + self.payload.len()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }
}

/// Lowercase the media type and drop parameters such as `; charset=...`
fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl fmt::Display for EmbeddedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

impl TryFrom<String> for EmbeddedImage {
    type Error = EmbeddedImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmbeddedImage> for String {
    fn from(value: EmbeddedImage) -> Self {
        value.to_data_url()
    }
}
