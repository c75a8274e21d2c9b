//! Utility modules shared by the cache, client and binary
//!
//! - `utils::url` for endpoint building and logo identifier extraction
//! - `utils::time` for the injectable wall clock

pub mod time;
pub mod url;

pub use self::time::{Clock, ManualClock, SystemClock};
pub use self::url::UrlUtils;
