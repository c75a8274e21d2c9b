//! Persistent storage for the logo cache
//!
//! `KeyValueStore` stands in for browser persistent storage: a flat string
//! map. `PersistentLogoStore` owns the single cache record on top of it.

pub mod key_value;
pub mod logo_store;

pub use key_value::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use logo_store::{DEFAULT_STORAGE_KEY, PersistentLogoStore};
