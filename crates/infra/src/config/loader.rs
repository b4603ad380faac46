//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the ledger URL is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CREDITSYNC_LEDGER_URL`: Ledger API base URL (required)
//! - `CREDITSYNC_LEDGER_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `CREDITSYNC_KEYCHAIN_SERVICE`: Keychain service holding the ledger API key
//! - `CREDITSYNC_CACHE_KEYCHAIN_SERVICE`: Keychain service for cached values
//! - `CREDITSYNC_LEGACY_PREFS_PATH`: Old preferences file to migrate from
//! - `CREDITSYNC_PROBE_HOST`: Reachability probe host
//! - `CREDITSYNC_PROBE_PORT`: Reachability probe TCP port
//! - `CREDITSYNC_PROBE_INTERVAL_MS`: Interval between probes
//! - `CREDITSYNC_PROBE_TIMEOUT_MS`: Connect timeout per probe
//! - `CREDITSYNC_PROBE_ENABLED`: Whether the probe runs (true/false)
//! - `CREDITSYNC_LISTENER_JOIN_TIMEOUT_SECS`: Listener shutdown timeout
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./creditsync.json` or `./creditsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use creditsync_domain::{Config, CreditError, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// ledger URL is missing or a value is invalid, falls back to loading from a
/// config file.
///
/// # Errors
/// Returns `CreditError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `CREDITSYNC_LEDGER_URL` is required; everything else falls back to
/// the defaults in [`Config::new`].
///
/// # Errors
/// Returns `CreditError::Config` if the ledger URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::new(env_var("CREDITSYNC_LEDGER_URL")?);

    if let Some(secs) = env_parse("CREDITSYNC_LEDGER_TIMEOUT_SECS")? {
        config.ledger.request_timeout_secs = secs;
    }
    if let Ok(service) = std::env::var("CREDITSYNC_KEYCHAIN_SERVICE") {
        config.ledger.keychain_service = service;
    }

    if let Ok(service) = std::env::var("CREDITSYNC_CACHE_KEYCHAIN_SERVICE") {
        config.cache.keychain_service = service;
    }
    config.cache.legacy_preferences_path =
        std::env::var("CREDITSYNC_LEGACY_PREFS_PATH").ok().map(PathBuf::from);

    if let Ok(host) = std::env::var("CREDITSYNC_PROBE_HOST") {
        config.connectivity.probe_host = host;
    }
    if let Some(port) = env_parse("CREDITSYNC_PROBE_PORT")? {
        config.connectivity.probe_port = port;
    }
    if let Some(ms) = env_parse("CREDITSYNC_PROBE_INTERVAL_MS")? {
        config.connectivity.probe_interval_ms = ms;
    }
    if let Some(ms) = env_parse("CREDITSYNC_PROBE_TIMEOUT_MS")? {
        config.connectivity.probe_timeout_ms = ms;
    }
    config.connectivity.probe_enabled = env_bool("CREDITSYNC_PROBE_ENABLED", true);

    if let Some(secs) = env_parse("CREDITSYNC_LISTENER_JOIN_TIMEOUT_SECS")? {
        config.listener.join_timeout_secs = secs;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CreditError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CreditError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CreditError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CreditError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CreditError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CreditError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CreditError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./creditsync.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("creditsync.json"),
        dir.join("creditsync.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `CreditError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CreditError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `CreditError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CreditError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_KEYS: &[&str] = &[
        "CREDITSYNC_LEDGER_URL",
        "CREDITSYNC_LEDGER_TIMEOUT_SECS",
        "CREDITSYNC_KEYCHAIN_SERVICE",
        "CREDITSYNC_CACHE_KEYCHAIN_SERVICE",
        "CREDITSYNC_LEGACY_PREFS_PATH",
        "CREDITSYNC_PROBE_HOST",
        "CREDITSYNC_PROBE_PORT",
        "CREDITSYNC_PROBE_INTERVAL_MS",
        "CREDITSYNC_PROBE_TIMEOUT_MS",
        "CREDITSYNC_PROBE_ENABLED",
        "CREDITSYNC_LISTENER_JOIN_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_BOOL_TRUE_YES", "yes");
        std::env::set_var("TEST_BOOL_TRUE_UPPER", "TRUE");
        std::env::set_var("TEST_BOOL_FALSE_OFF", "off");

        assert!(env_bool("TEST_BOOL_TRUE_YES", false));
        assert!(env_bool("TEST_BOOL_TRUE_UPPER", false));
        assert!(!env_bool("TEST_BOOL_FALSE_OFF", true));

        std::env::remove_var("TEST_BOOL_MISSING");
        assert!(env_bool("TEST_BOOL_MISSING", true));
        assert!(!env_bool("TEST_BOOL_MISSING", false));

        std::env::remove_var("TEST_BOOL_TRUE_YES");
        std::env::remove_var("TEST_BOOL_TRUE_UPPER");
        std::env::remove_var("TEST_BOOL_FALSE_OFF");
    }

    #[test]
    fn test_load_from_env_only_url_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CREDITSYNC_LEDGER_URL", "https://ledger.test/rest/v1");

        let config = load_from_env().unwrap();
        assert_eq!(config, Config::new("https://ledger.test/rest/v1"));

        clear_env();
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CREDITSYNC_LEDGER_URL", "https://ledger.test");
        std::env::set_var("CREDITSYNC_LEDGER_TIMEOUT_SECS", "7");
        std::env::set_var("CREDITSYNC_KEYCHAIN_SERVICE", "com.example.ledger");
        std::env::set_var("CREDITSYNC_CACHE_KEYCHAIN_SERVICE", "com.example.cache");
        std::env::set_var("CREDITSYNC_LEGACY_PREFS_PATH", "/tmp/prefs.json");
        std::env::set_var("CREDITSYNC_PROBE_HOST", "ledger.test");
        std::env::set_var("CREDITSYNC_PROBE_PORT", "8443");
        std::env::set_var("CREDITSYNC_PROBE_INTERVAL_MS", "1500");
        std::env::set_var("CREDITSYNC_PROBE_TIMEOUT_MS", "250");
        std::env::set_var("CREDITSYNC_PROBE_ENABLED", "off");
        std::env::set_var("CREDITSYNC_LISTENER_JOIN_TIMEOUT_SECS", "9");

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.ledger.request_timeout(), Duration::from_secs(7));
        assert_eq!(config.ledger.keychain_service, "com.example.ledger");
        assert_eq!(config.cache.keychain_service, "com.example.cache");
        assert_eq!(config.cache.legacy_preferences_path, Some(PathBuf::from("/tmp/prefs.json")));
        assert_eq!(config.connectivity.probe_host, "ledger.test");
        assert_eq!(config.connectivity.probe_port, 8443);
        assert_eq!(config.connectivity.probe_interval(), Duration::from_millis(1500));
        assert_eq!(config.connectivity.probe_timeout(), Duration::from_millis(250));
        assert!(!config.connectivity.probe_enabled);
        assert_eq!(config.listener.join_timeout(), Duration::from_secs(9));

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CreditError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CREDITSYNC_LEDGER_URL", "https://ledger.test");
        std::env::set_var("CREDITSYNC_PROBE_PORT", "not-a-port");

        let err = load_from_env().unwrap_err();
        match err {
            CreditError::Config(message) => assert!(message.contains("CREDITSYNC_PROBE_PORT")),
            other => panic!("expected Config error, got {other:?}"),
        }

        clear_env();
    }

    #[test]
    fn test_load_from_file_json() {
        let path = temp_config(
            r#"{
                "ledger": { "base_url": "https://ledger.test", "request_timeout_secs": 4 },
                "cache": { "legacy_preferences_path": "/tmp/old.json" }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert_eq!(config.ledger.base_url, "https://ledger.test");
        assert_eq!(config.ledger.request_timeout_secs, 4);
        assert_eq!(config.cache.legacy_preferences_path, Some(PathBuf::from("/tmp/old.json")));
        assert!(config.connectivity.probe_enabled);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = temp_config(
            r#"
[ledger]
base_url = "https://ledger.test"

[connectivity]
probe_enabled = false

[listener]
join_timeout_secs = 2
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert!(!config.connectivity.probe_enabled);
        assert_eq!(config.listener.join_timeout_secs, 2);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/config.json"))).unwrap_err();
        assert!(matches!(err, CreditError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_missing_ledger_section() {
        let path = temp_config(r#"{ "cache": {} }"#, "json");

        assert!(load_from_file(Some(path.clone())).is_err(), "ledger section is required");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
