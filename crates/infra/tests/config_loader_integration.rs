//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use creditsync_infra::config;
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let path = write_config(
        r#"{
            "ledger": {
                "base_url": "https://ledger.test/rest/v1",
                "request_timeout_secs": 10,
                "keychain_service": "com.example.ledger"
            },
            "cache": {
                "keychain_service": "com.example.credits",
                "legacy_preferences_path": "/tmp/legacy_prefs.json"
            },
            "connectivity": {
                "probe_host": "ledger.test",
                "probe_port": 443,
                "probe_interval_ms": 10000,
                "probe_timeout_ms": 1000
            },
            "listener": { "join_timeout_secs": 3 }
        }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load JSON config");

    assert_eq!(config.ledger.base_url, "https://ledger.test/rest/v1");
    assert_eq!(config.ledger.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.ledger.keychain_service, "com.example.ledger");
    assert_eq!(config.cache.keychain_service, "com.example.credits");
    assert_eq!(
        config.cache.legacy_preferences_path,
        Some(PathBuf::from("/tmp/legacy_prefs.json"))
    );
    assert_eq!(config.connectivity.probe_host, "ledger.test");
    assert_eq!(config.connectivity.probe_interval(), Duration::from_secs(10));
    assert!(config.connectivity.probe_enabled);
    assert_eq!(config.listener.join_timeout(), Duration::from_secs(3));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let path = write_config(
        r#"
[ledger]
base_url = "https://ledger.test"
request_timeout_secs = 20

[connectivity]
probe_enabled = false
"#,
        "toml",
    );

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load TOML config");

    assert_eq!(config.ledger.request_timeout_secs, 20);
    assert!(!config.connectivity.probe_enabled);
    assert_eq!(config.connectivity.probe_port, 443, "unset fields keep their defaults");
    assert!(config.cache.legacy_preferences_path.is_none());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_invalid_toml_is_rejected() {
    let path = write_config("[ledger\nbase_url = ", "toml");

    let err = config::load_from_file(Some(path.clone())).unwrap_err();
    assert!(err.to_string().contains("TOML"), "unexpected error: {err}");

    std::fs::remove_file(path).ok();
}
