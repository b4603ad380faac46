//! Storage ports backing the local cache

use creditsync_common::error::CommonResult;
use serde::{Deserialize, Serialize};

/// Durable, encrypted key/value bytes (platform keychain in production)
pub trait SecureStore: Send + Sync {
    fn save(&self, key: &str, value: &[u8]) -> CommonResult<()>;

    /// `Ok(None)` when nothing is stored under `key`
    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> CommonResult<()>;
}

/// Scalar as it was written by the old, unencrypted preferences store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyValue {
    Bool(bool),
    Int(i64),
}

/// Old insecure store that values are migrated out of
pub trait LegacyStore: Send + Sync {
    fn read(&self, key: &str) -> CommonResult<Option<LegacyValue>>;

    fn remove(&self, key: &str) -> CommonResult<()>;
}
