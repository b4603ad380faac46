//! Generic keychain provider for secure credential storage
//!
//! ## Usage
//!
//! ```no_run
//! use creditsync_common::security::keychain::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("com.checkkicks.credits");
//! keychain.set_bytes("cached_credits", &25_i64.to_le_bytes())?;
//! let raw = keychain.get_bytes("cached_credits")?;
//! assert_eq!(raw.len(), 8);
//! # Ok::<(), creditsync_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use crate::error::CommonError;

/// Generic keychain provider for secure credential storage
///
/// Entries are addressed by `(service_name, key)`.
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a UTF-8 secret (API tokens and the like)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {}: {}", key, e))
        })
    }

    /// Retrieve a UTF-8 secret
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if secret doesn't exist
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| Self::map_read_error(key, e))
    }

    /// Store raw bytes
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, len = value.len(), "Storing bytes in keychain");

        let entry = self.create_entry(key)?;
        entry.set_secret(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store bytes for {}: {}", key, e))
        })
    }

    /// Retrieve raw bytes
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if the entry doesn't exist
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>, KeychainError> {
        let entry = self.create_entry(key)?;
        entry.get_secret().map_err(|e| Self::map_read_error(key, e))
    }

    /// Delete a secret from the platform keychain (idempotent)
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {}: {}",
                key, e
            ))),
        }
    }

    /// Check if a secret exists in the keychain
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).is_ok_and(|entry| entry.get_secret().is_ok())
    }

    fn map_read_error(key: &str, err: keyring::Error) -> KeychainError {
        if matches!(err, keyring::Error::NoEntry) {
            KeychainError::NotFound
        } else {
            KeychainError::AccessFailed(format!("Failed to retrieve secret for {}: {}", key, err))
        }
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {}", e))
        })
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Underlying keyring library error
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<KeychainError> for CommonError {
    fn from(err: KeychainError) -> Self {
        match err {
            KeychainError::NotFound => CommonError::not_found("keychain entry", "unknown"),
            other => CommonError::persistence("keychain", other.to_string()),
        }
    }
}
