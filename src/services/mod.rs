pub mod logo_cache;

pub use logo_cache::{CacheConfig, EncodingStrategy, LogoCacheController};
