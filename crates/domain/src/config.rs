//! Configuration structures
//!
//! Loaded by `creditsync_infra::config`. Every section has defaults except the
//! ledger base URL.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_KEYCHAIN_SERVICE, DEFAULT_LEDGER_KEYCHAIN_SERVICE, DEFAULT_LEDGER_TIMEOUT_SECS,
    DEFAULT_LISTENER_JOIN_TIMEOUT_SECS, DEFAULT_PROBE_HOST, DEFAULT_PROBE_INTERVAL_MS,
    DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT_MS,
};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
}

impl Config {
    pub fn new(ledger_url: impl Into<String>) -> Self {
        Self {
            ledger: LedgerConfig::new(ledger_url),
            cache: CacheConfig::default(),
            connectivity: ConnectivityConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

/// Remote ledger endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    #[serde(default = "default_ledger_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Keychain service holding the API key
    #[serde(default = "default_ledger_keychain_service")]
    pub keychain_service: String,
}

impl LedgerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: DEFAULT_LEDGER_TIMEOUT_SECS,
            keychain_service: DEFAULT_LEDGER_KEYCHAIN_SERVICE.to_string(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Local secure cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_keychain_service")]
    pub keychain_service: String,
    /// Old insecure preferences file to migrate from, if any
    #[serde(default)]
    pub legacy_preferences_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            keychain_service: default_cache_keychain_service(),
            legacy_preferences_path: None,
        }
    }
}

/// Reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub probe_enabled: bool,
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_host: default_probe_host(),
            probe_port: DEFAULT_PROBE_PORT,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_enabled: true,
        }
    }
}

/// Transaction listener worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { join_timeout_secs: DEFAULT_LISTENER_JOIN_TIMEOUT_SECS }
    }
}

fn default_ledger_timeout_secs() -> u64 {
    DEFAULT_LEDGER_TIMEOUT_SECS
}

fn default_ledger_keychain_service() -> String {
    DEFAULT_LEDGER_KEYCHAIN_SERVICE.to_string()
}

fn default_cache_keychain_service() -> String {
    DEFAULT_CACHE_KEYCHAIN_SERVICE.to_string()
}

fn default_probe_host() -> String {
    DEFAULT_PROBE_HOST.to_string()
}

fn default_probe_port() -> u16 {
    DEFAULT_PROBE_PORT
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_join_timeout_secs() -> u64 {
    DEFAULT_LISTENER_JOIN_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}
