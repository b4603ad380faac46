//! Application constants
//!
//! Centralized location for domain-level constants shared by the engine and
//! its adapters.

// Product ids
pub const PRODUCT_BASIC: &str = "com.checkkicks.credits.basic";
pub const PRODUCT_STANDARD: &str = "com.checkkicks.credits.standard";
pub const PRODUCT_PRO: &str = "com.checkkicks.credits.pro";
pub const PRODUCT_BUSINESS: &str = "com.checkkicks.credits.business";

// Local cache keys
pub const CACHE_KEY_CREDITS: &str = "cached_credits";
pub const CACHE_KEY_ACCOUNT_EXCEPTION: &str = "cached_account_exception";
pub const PENDING_SYNC_PREFIX: &str = "pending_sync_";
/// Index of outstanding pending-sync markers (JSON array of transaction ids)
pub const CACHE_KEY_PENDING_INDEX: &str = "pending_sync_index";

// Ledger
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_LEDGER_KEYCHAIN_SERVICE: &str = "com.checkkicks.ledger";
pub const LEDGER_API_KEY_ACCOUNT: &str = "ledger_api_key";

// Local cache
pub const DEFAULT_CACHE_KEYCHAIN_SERVICE: &str = "com.checkkicks.credits";

// Connectivity probe
pub const DEFAULT_PROBE_HOST: &str = "1.1.1.1";
pub const DEFAULT_PROBE_PORT: u16 = 443;
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

// Workers
pub const DEFAULT_LISTENER_JOIN_TIMEOUT_SECS: u64 = 5;
