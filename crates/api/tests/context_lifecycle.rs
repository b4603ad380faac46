//! Integration tests for AppContext lifecycle
//!
//! Tests verify that AppContext can be created, drives purchases through the
//! listener, and shuts down gracefully.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use creditsync_app::{AppContext, HostServices};
use creditsync_core::ports::SecureStore;
use creditsync_core::testing::{FakeAuthority, FakeLedger, InMemorySecureStore, StaticSession};
use creditsync_domain::constants::{CACHE_KEY_CREDITS, PRODUCT_PRO};
use creditsync_domain::{Config, CreditBalance, Identity, PurchaseTransaction, VerificationResult};
use creditsync_infra::HttpLedgerClient;
use tempfile::NamedTempFile;
use uuid::Uuid;

fn identity() -> Identity {
    Identity::new(Uuid::new_v4(), None)
}

fn offline_config() -> Config {
    let mut config = Config::new("https://ledger.invalid");
    config.connectivity.probe_enabled = false;
    config.listener.join_timeout_secs = 1;
    config
}

struct Fixture {
    ledger: Arc<FakeLedger>,
    authority: Arc<FakeAuthority>,
    store: Arc<InMemorySecureStore>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            ledger: Arc::new(FakeLedger::new()),
            authority: Arc::new(FakeAuthority::new()),
            store: Arc::new(InMemorySecureStore::new()),
        }
    }

    async fn context(&self, config: Config, session: Option<Identity>) -> AppContext {
        let session = Arc::new(match session {
            Some(identity) => StaticSession::signed_in(identity),
            None => StaticSession::signed_out(),
        });
        AppContext::with_adapters(
            config,
            HostServices::new(self.authority.clone(), session),
            self.ledger.clone(),
            self.store.clone(),
        )
        .await
        .expect("context should build")
    }
}

/// Test that the context starts its workers and shuts them down
///
/// This test verifies:
/// - The listener is running after construction
/// - The probe is not started when disabled
/// - Shutdown stops the listener and is idempotent
#[tokio::test]
async fn test_context_creation_and_shutdown() {
    let fixture = Fixture::new();
    let ctx = fixture.context(offline_config(), Some(identity())).await;

    assert!(ctx.is_listening().await);
    assert!(!ctx.is_probing().await);

    ctx.shutdown().await.expect("shutdown should succeed");
    assert!(!ctx.is_listening().await);

    ctx.shutdown().await.expect("second shutdown is a no-op");
}

#[tokio::test]
async fn test_listener_credits_deliveries() {
    let fixture = Fixture::new();
    let ctx = fixture.context(offline_config(), Some(identity())).await;

    fixture
        .authority
        .deliver(VerificationResult::verified(PurchaseTransaction::new("tx-ctx", PRODUCT_PRO)));

    tokio::time::timeout(Duration::from_secs(2), async {
        while fixture.authority.finalized().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("delivery was not finalized");

    assert_eq!(ctx.reconciler.credits(), CreditBalance::new(60));
    assert_eq!(fixture.ledger.balance(), 60);
    ctx.shutdown().await.unwrap();
}

/// Test that legacy preferences are migrated into the secure store
#[tokio::test]
async fn test_legacy_preferences_are_migrated() {
    let mut prefs = NamedTempFile::new().unwrap();
    prefs.write_all(br#"{ "cached_credits": 9, "cached_account_exception": false }"#).unwrap();

    let mut config = offline_config();
    config.cache.legacy_preferences_path = Some(prefs.path().to_path_buf());

    let fixture = Fixture::new();
    let ctx = fixture.context(config, None).await;

    assert_eq!(fixture.store.read(CACHE_KEY_CREDITS).unwrap(), Some(9_i64.to_le_bytes().to_vec()));
    let remaining: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(prefs.path()).unwrap()).unwrap();
    assert_eq!(remaining, serde_json::json!({}));

    // signed out: the cached value is all there is
    let report = ctx.reconciler.load_credits(None).await;
    assert_eq!(report.balance, CreditBalance::new(9));
    ctx.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_probe_runs_when_enabled() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let mut config = offline_config();
    config.connectivity.probe_enabled = true;
    config.connectivity.probe_host = "127.0.0.1".to_string();
    config.connectivity.probe_port = listener.local_addr().unwrap().port();
    config.connectivity.probe_interval_ms = 20;

    let fixture = Fixture::new();
    let ctx = fixture.context(config, None).await;

    assert!(ctx.is_probing().await);
    assert!(ctx.connectivity.is_connected());

    ctx.shutdown().await.unwrap();
    assert!(!ctx.is_probing().await);
}

#[tokio::test]
async fn test_production_ledger_rejects_bad_url() {
    let config = Config::new("not a url");
    assert!(HttpLedgerClient::with_api_key(&config.ledger, "key").is_err());

    let fixture = Fixture::new();
    let session = Arc::new(StaticSession::signed_out());
    let result = AppContext::new_with_config(
        config,
        HostServices::new(fixture.authority.clone(), session),
    )
    .await;

    assert!(result.is_err());
}
