//! Error type definitions for the logo cache
//!
//! This module defines the error kinds raised while fetching, re-encoding and
//! persisting the company logo. Errors raised on the explicit refresh path are
//! published to subscribers; storage errors are always logged and dropped by
//! the controller.

use strum::{AsRefStr, Display};
use thiserror::Error;

/// Top-level logo cache error type
///
/// Every step of the refresh pipeline returns this type so the controller can
/// decide in one place whether a failure is surfaced or only logged.
#[derive(Error, Debug)]
pub enum LogoCacheError {
    /// No bearer token was available when the request was built
    #[error("Not authenticated: no bearer token available")]
    Unauthenticated,

    /// Settings report a logo, but neither the file name nor the URL yields an id
    #[error("Logo is configured but no file identifier could be derived")]
    MissingIdentifier,

    /// Non-2xx, non-404 answer from the logo endpoint
    #[error("Remote error: HTTP {status} - {message}")]
    Remote { status: u16, message: String },

    /// Empty body, non-image content type or oversized body
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// Bytes could not be decoded as an image
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Decoded image could not be encoded again
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Company settings could not be fetched or parsed
    #[error("Settings error: {message}")]
    Settings { message: String },

    /// Invalid client or cache configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Persistent store failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transport level HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Stable classification of [`LogoCacheError`] used in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    MissingIdentifier,
    RemoteError,
    InvalidPayload,
    DecodeError,
    EncodeError,
    SettingsError,
    ConfigurationError,
    StorageError,
    TransportError,
}

/// Errors raised by the image re-encoder
///
/// The three input rejections are separate variants so callers can tell an
/// empty body from a wrong content type or an oversized upload.
#[derive(Error, Debug)]
pub enum ReencodeError {
    #[error("image payload is empty")]
    EmptyPayload,

    #[error("declared type '{mime_type}' is not an image type")]
    NotAnImage { mime_type: String },

    #[error("image payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("failed to encode image: {message}")]
    Encode { message: String },
}

/// Persistent store errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failures of the file backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized or deserialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the operation (full, closed, read-only)
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

impl LogoCacheError {
    /// Create a remote error from a status code and message
    pub fn remote<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload<S: Into<String>>(reason: S) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Create a settings error
    pub fn settings<S: Into<String>>(message: S) -> Self {
        Self::Settings {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Classify this error for logging
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::MissingIdentifier => ErrorKind::MissingIdentifier,
            Self::Remote { .. } => ErrorKind::RemoteError,
            Self::InvalidPayload { .. } => ErrorKind::InvalidPayload,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Encode { .. } => ErrorKind::EncodeError,
            Self::Settings { .. } => ErrorKind::SettingsError,
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::Http(_) => ErrorKind::TransportError,
        }
    }
}

impl From<ReencodeError> for LogoCacheError {
    fn from(err: ReencodeError) -> Self {
        match err {
            ReencodeError::EmptyPayload
            | ReencodeError::NotAnImage { .. }
            | ReencodeError::PayloadTooLarge { .. } => Self::InvalidPayload {
                reason: err.to_string(),
            },
            ReencodeError::Decode { message } => Self::Decode { message },
            ReencodeError::Encode { message } => Self::Encode { message },
        }
    }
}

impl StorageError {
    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
