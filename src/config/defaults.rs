/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// API defaults
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Cache defaults
pub const DEFAULT_EMBEDDED_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_SHORT_LIVED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// Re-encoder defaults
pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_JPEG_QUALITY: f32 = 0.9;
pub const DEFAULT_MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_PASSTHROUGH_THRESHOLD_BYTES: usize = 0;

// Storage defaults
pub const DEFAULT_STORAGE_PATH: &str = "./data/logo-cache";
