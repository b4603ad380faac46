//! Platform secret storage
//!
//! Thin wrapper over the OS keychain (Keychain Access on macOS, Credential
//! Manager on Windows, Secret Service on Linux) via `keyring`.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider};
