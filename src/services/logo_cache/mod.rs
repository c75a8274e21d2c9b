//! Persistent company logo cache
//!
//! [`LogoCacheController`] owns the published value and the persisted record,
//! [`ImageReencoder`] bounds what gets persisted and [`LogoDisplay`] turns the
//! published value into something a logo slot can render.

pub mod cache_config;
pub mod controller;
pub mod display;
pub mod reencoder;

pub use cache_config::{CacheConfig, EncodingStrategy};
pub use controller::{LogoCacheController, LogoCacheControllerBuilder, VerifyOutcome};
pub use display::{DisplayOptions, LogoDisplay, LogoView};
pub use reencoder::{ImageReencoder, ReencodeConfig, is_image_mime};
