//! Keychain-backed secure store

use creditsync_common::error::CommonResult;
use creditsync_common::security::{KeychainError, KeychainProvider};
use creditsync_core::ports::SecureStore;
use tracing::debug;

/// [`SecureStore`] over the platform keychain.
///
/// One keychain item per cache key, all under the same service name.
#[derive(Debug, Clone)]
pub struct KeychainSecureStore {
    keychain: KeychainProvider,
}

impl KeychainSecureStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { keychain: KeychainProvider::new(service_name) }
    }

    pub fn service_name(&self) -> &str {
        self.keychain.service_name()
    }
}

impl SecureStore for KeychainSecureStore {
    fn save(&self, key: &str, value: &[u8]) -> CommonResult<()> {
        self.keychain.set_bytes(key, value)?;
        Ok(())
    }

    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        match self.keychain.get_bytes(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(KeychainError::NotFound) => {
                debug!(key, "no keychain item");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, key: &str) -> CommonResult<()> {
        self.keychain.delete_secret(key)?;
        Ok(())
    }
}
