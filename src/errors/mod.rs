//! Centralized error handling for the logo cache
//!
//! # Error Categories
//!
//! - **Authentication**: no bearer token when the logo is requested
//! - **Remote**: settings endpoint or logo endpoint failures
//! - **Payload**: empty, non-image or oversized logo bodies
//! - **Imaging**: decode and encode failures in the re-encoder
//! - **Storage**: persistent store failures (never surfaced to subscribers)

pub mod types;

pub use types::*;

/// Convenience type alias for Results using LogoCacheError
pub type LogoCacheResult<T> = Result<T, LogoCacheError>;

/// Convenience type alias for persistent store Results
pub type StorageResult<T> = Result<T, StorageError>;

/// Convenience type alias for re-encoder Results
pub type ReencodeResult<T> = Result<T, ReencodeError>;
