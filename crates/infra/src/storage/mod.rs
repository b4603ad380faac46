//! Storage adapters for the local cache

pub mod keychain_store;
pub mod legacy_preferences;

pub use keychain_store::KeychainSecureStore;
pub use legacy_preferences::JsonPreferencesStore;
