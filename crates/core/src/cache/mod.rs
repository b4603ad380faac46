//! Offline fallback cache over the secure store

mod local_cache;
pub mod ports;

pub use local_cache::LocalCache;
pub use ports::{LegacyStore, LegacyValue, SecureStore};
