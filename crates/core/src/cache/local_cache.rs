//! Typed scalars and pending-sync markers on top of a [`SecureStore`]
//!
//! Integers are stored as 8-byte little-endian `i64`, booleans as a single
//! byte. A value with the wrong width is treated as absent.

use std::sync::Arc;

use creditsync_common::error::{CommonError, CommonResult};
use creditsync_domain::constants::{
    CACHE_KEY_ACCOUNT_EXCEPTION, CACHE_KEY_CREDITS, CACHE_KEY_PENDING_INDEX, PENDING_SYNC_PREFIX,
};
use creditsync_domain::CreditBalance;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::ports::{LegacyStore, LegacyValue, SecureStore};

/// Read-through fallback for when the ledger cannot be reached.
///
/// Writes are last-writer-wins.
pub struct LocalCache {
    store: Arc<dyn SecureStore>,
    /// Serializes read-modify-write of the pending index
    index_lock: Mutex<()>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store, index_lock: Mutex::new(()) }
    }

    pub fn save_int(&self, key: &str, value: i64) -> CommonResult<()> {
        self.store.save(key, &value.to_le_bytes())
    }

    pub fn read_int(&self, key: &str) -> CommonResult<Option<i64>> {
        let Some(raw) = self.store.read(key)? else {
            return Ok(None);
        };
        match <[u8; 8]>::try_from(raw.as_slice()) {
            Ok(bytes) => Ok(Some(i64::from_le_bytes(bytes))),
            Err(_) => {
                debug!(key, len = raw.len(), "cached integer has wrong width");
                Ok(None)
            }
        }
    }

    pub fn save_bool(&self, key: &str, value: bool) -> CommonResult<()> {
        self.store.save(key, &[u8::from(value)])
    }

    pub fn read_bool(&self, key: &str) -> CommonResult<Option<bool>> {
        let Some(raw) = self.store.read(key)? else {
            return Ok(None);
        };
        match raw.as_slice() {
            [byte] => Ok(Some(*byte == 1)),
            _ => {
                debug!(key, len = raw.len(), "cached boolean has wrong width");
                Ok(None)
            }
        }
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> CommonResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.save(key, &bytes)
    }

    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> CommonResult<Option<T>> {
        match self.store.read(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, key: &str) -> CommonResult<()> {
        self.store.delete(key)
    }

    /// Last cached balance, zero if none or unreadable.
    pub fn cached_credits(&self) -> CreditBalance {
        match self.read_int(CACHE_KEY_CREDITS) {
            Ok(value) => value.map(CreditBalance::from_stored).unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "failed to read cached credits");
                CreditBalance::ZERO
            }
        }
    }

    /// Best effort; a failed write is logged.
    pub fn store_credits(&self, balance: CreditBalance) {
        if let Err(err) = self.save_int(CACHE_KEY_CREDITS, i64::from(balance)) {
            warn!(error = %err, credits = balance.get(), "failed to cache credits");
        }
    }

    /// Last cached exception flag, false if none or unreadable.
    pub fn cached_exception(&self) -> bool {
        match self.read_bool(CACHE_KEY_ACCOUNT_EXCEPTION) {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                warn!(error = %err, "failed to read cached account exception");
                false
            }
        }
    }

    pub fn store_exception(&self, active: bool) {
        if let Err(err) = self.save_bool(CACHE_KEY_ACCOUNT_EXCEPTION, active) {
            warn!(error = %err, "failed to cache account exception");
        }
    }

    /// Move `key` out of the legacy store into secure storage.
    ///
    /// Returns `true` if a value was migrated, `false` if there was nothing
    /// left to migrate.
    pub fn migrate_from_legacy(&self, legacy: &dyn LegacyStore, key: &str) -> CommonResult<bool> {
        let Some(value) = legacy.read(key)? else {
            return Ok(false);
        };

        match value {
            LegacyValue::Int(v) => self.save_int(key, v)?,
            LegacyValue::Bool(v) => self.save_bool(key, v)?,
        }
        legacy.remove(key)?;

        info!(key, "migrated legacy value to secure storage");
        Ok(true)
    }

    /// Record that a delivered transaction has not reached the ledger yet.
    pub fn mark_pending_sync(&self, transaction_id: &str) -> CommonResult<()> {
        let _guard = self.index_lock.lock();
        self.save_bool(&pending_key(transaction_id), true)?;

        let mut index = self.read_pending_index()?;
        if !index.iter().any(|id| id == transaction_id) {
            index.push(transaction_id.to_string());
            self.save_json(CACHE_KEY_PENDING_INDEX, &index)?;
        }
        Ok(())
    }

    pub fn clear_pending_sync(&self, transaction_id: &str) -> CommonResult<()> {
        let _guard = self.index_lock.lock();
        self.store.delete(&pending_key(transaction_id))?;

        let mut index = self.read_pending_index()?;
        let before = index.len();
        index.retain(|id| id != transaction_id);
        if index.len() != before {
            self.save_json(CACHE_KEY_PENDING_INDEX, &index)?;
        }
        Ok(())
    }

    pub fn is_pending_sync(&self, transaction_id: &str) -> bool {
        matches!(self.read_bool(&pending_key(transaction_id)), Ok(Some(true)))
    }

    /// Transaction ids with an outstanding marker, oldest first.
    pub fn pending_sync_ids(&self) -> CommonResult<Vec<String>> {
        let _guard = self.index_lock.lock();
        self.read_pending_index()
    }

    fn read_pending_index(&self) -> CommonResult<Vec<String>> {
        match self.read_json::<Vec<String>>(CACHE_KEY_PENDING_INDEX) {
            Ok(index) => Ok(index.unwrap_or_default()),
            Err(CommonError::Serialization { message, .. }) => {
                warn!(error = %message, "discarding unreadable pending-sync index");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

fn pending_key(transaction_id: &str) -> String {
    format!("{PENDING_SYNC_PREFIX}{transaction_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryLegacyStore, InMemorySecureStore};

    fn cache() -> (Arc<InMemorySecureStore>, LocalCache) {
        let store = Arc::new(InMemorySecureStore::new());
        (store.clone(), LocalCache::new(store))
    }

    #[test]
    fn integers_are_eight_byte_little_endian() {
        let (store, cache) = cache();
        cache.save_int("cached_credits", 25).unwrap();

        assert_eq!(store.raw("cached_credits"), Some(25_i64.to_le_bytes().to_vec()));
        assert_eq!(cache.read_int("cached_credits").unwrap(), Some(25));
    }

    #[test]
    fn wrong_width_reads_as_absent() {
        let (store, cache) = cache();
        store.save("cached_credits", &[1, 2, 3]).unwrap();
        store.save("cached_account_exception", &[1, 1]).unwrap();

        assert_eq!(cache.read_int("cached_credits").unwrap(), None);
        assert_eq!(cache.read_bool("cached_account_exception").unwrap(), None);
        assert_eq!(cache.cached_credits(), CreditBalance::ZERO);
        assert!(!cache.cached_exception());
    }

    #[test]
    fn booleans_are_one_byte() {
        let (store, cache) = cache();
        cache.save_bool("flag", true).unwrap();
        assert_eq!(store.raw("flag"), Some(vec![1]));
        cache.save_bool("flag", false).unwrap();
        assert_eq!(cache.read_bool("flag").unwrap(), Some(false));
    }

    #[test]
    fn negative_cached_credits_clamp_to_zero() {
        let (_store, cache) = cache();
        cache.save_int(CACHE_KEY_CREDITS, -3).unwrap();
        assert_eq!(cache.cached_credits(), CreditBalance::ZERO);
    }

    #[test]
    fn storage_failures_fall_back_to_defaults() {
        let (store, cache) = cache();
        cache.store_credits(CreditBalance::new(9));
        store.fail_reads(true);

        assert_eq!(cache.cached_credits(), CreditBalance::ZERO);
        assert!(cache.read_int(CACHE_KEY_CREDITS).is_err());
    }

    /// Validates legacy migration moves the value and is idempotent.
    ///
    /// Assertions:
    /// - First run copies the value into secure storage and removes it
    /// - Second run reports nothing migrated
    /// - A zero balance is migrated, not skipped
    #[test]
    fn legacy_migration_is_one_shot() {
        let (_store, cache) = cache();
        let legacy = InMemoryLegacyStore::new()
            .with_value(CACHE_KEY_CREDITS, LegacyValue::Int(0))
            .with_value(CACHE_KEY_ACCOUNT_EXCEPTION, LegacyValue::Bool(true));

        assert!(cache.migrate_from_legacy(&legacy, CACHE_KEY_CREDITS).unwrap());
        assert!(cache.migrate_from_legacy(&legacy, CACHE_KEY_ACCOUNT_EXCEPTION).unwrap());
        assert_eq!(cache.read_int(CACHE_KEY_CREDITS).unwrap(), Some(0));
        assert!(cache.cached_exception());
        assert!(legacy.is_empty());

        assert!(!cache.migrate_from_legacy(&legacy, CACHE_KEY_CREDITS).unwrap());
    }

    #[test]
    fn pending_markers_round_trip_through_index() {
        let (_store, cache) = cache();
        cache.mark_pending_sync("tx-1").unwrap();
        cache.mark_pending_sync("tx-2").unwrap();
        cache.mark_pending_sync("tx-1").unwrap();

        assert!(cache.is_pending_sync("tx-1"));
        assert_eq!(cache.pending_sync_ids().unwrap(), vec!["tx-1", "tx-2"]);

        cache.clear_pending_sync("tx-1").unwrap();
        assert!(!cache.is_pending_sync("tx-1"));
        assert_eq!(cache.pending_sync_ids().unwrap(), vec!["tx-2"]);

        // clearing an unknown id is a no-op
        cache.clear_pending_sync("tx-404").unwrap();
    }

    #[test]
    fn corrupt_pending_index_is_discarded() {
        let (store, cache) = cache();
        store.save(CACHE_KEY_PENDING_INDEX, b"not json").unwrap();

        assert!(cache.pending_sync_ids().unwrap().is_empty());
        cache.mark_pending_sync("tx-3").unwrap();
        assert_eq!(cache.pending_sync_ids().unwrap(), vec!["tx-3"]);
    }
}
