//! Integration tests for purchase writes on a flaky network
//!
//! Drives the reconciler through the in-memory doubles with a real
//! `ConnectivityMonitor` gating retries.

use std::sync::Arc;
use std::time::Duration;

use creditsync_common::{ConnectionType, ConnectivityMonitor, NetworkPath};
use creditsync_core::testing::{FakeAuthority, FakeLedger, InMemorySecureStore, StaticSession};
use creditsync_core::{CreditReconciler, LocalCache};
use creditsync_domain::constants::PRODUCT_STANDARD;
use creditsync_domain::{
    CreditBalance, CreditError, Identity, LedgerError, PurchaseOutcome, PurchaseTransaction,
    VerificationResult,
};
use tokio::time::Instant;
use uuid::Uuid;

struct World {
    ledger: Arc<FakeLedger>,
    authority: Arc<FakeAuthority>,
    monitor: Arc<ConnectivityMonitor>,
    reconciler: CreditReconciler,
}

fn world(initial: NetworkPath) -> World {
    let identity = Identity::new(Uuid::new_v4(), Some("buyer@example.com".into()));
    let ledger = Arc::new(FakeLedger::new());
    let authority = Arc::new(FakeAuthority::new());
    let monitor = Arc::new(ConnectivityMonitor::with_path(initial));
    let cache = Arc::new(LocalCache::new(Arc::new(InMemorySecureStore::new())));

    let reconciler = CreditReconciler::builder(
        ledger.clone(),
        authority.clone(),
        Arc::new(StaticSession::signed_in(identity)),
        cache,
    )
    .connectivity(monitor.clone())
    .build();

    World { ledger, authority, monitor, reconciler }
}

fn verified(id: &str) -> PurchaseOutcome {
    PurchaseOutcome::Success {
        result: VerificationResult::verified(PurchaseTransaction::new(id, PRODUCT_STANDARD)),
    }
}

/// Validates a purchase made offline lands once connectivity returns.
///
/// Assertions:
/// - Retries are parked while the monitor reports offline
/// - The write succeeds after reconnecting and the transaction is finalized
/// - The balance grows by the pack size exactly once
#[tokio::test(start_paused = true)]
async fn offline_purchase_completes_after_reconnect() {
    let w = world(NetworkPath::offline());
    w.ledger.fail_next_appends(2, LedgerError::ConnectionLost("no route".into()));
    w.authority.will_return(verified("tx-offline"));

    let monitor = w.monitor.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        monitor.apply_path(NetworkPath::online(ConnectionType::Cellular));
    });

    let added = w.reconciler.purchase(PRODUCT_STANDARD).await.unwrap();

    assert_eq!(added, 25);
    assert_eq!(w.ledger.append_calls(), 3);
    assert_eq!(w.reconciler.credits(), CreditBalance::new(25));
    assert_eq!(w.authority.finalized(), vec!["tx-offline"]);
}

/// Validates the patient policy gives up after six attempts.
///
/// Assertions:
/// - Exactly six writes are attempted
/// - The transaction is not finalized and the balance is unchanged
#[tokio::test(start_paused = true)]
async fn exhausted_purchase_is_not_finalized() {
    let w = world(NetworkPath::online(ConnectionType::Wifi));
    w.ledger.fail_appends(LedgerError::Timeout);
    w.authority.will_return(verified("tx-lost"));

    let err = w.reconciler.purchase(PRODUCT_STANDARD).await.unwrap_err();

    assert_eq!(err, CreditError::SyncFailed(LedgerError::Timeout));
    assert_eq!(w.ledger.append_calls(), 6);
    assert_eq!(w.reconciler.credits(), CreditBalance::ZERO);
    assert!(w.authority.finalized().is_empty());
}

#[tokio::test(start_paused = true)]
async fn staying_offline_reports_offline() {
    let w = world(NetworkPath::offline());
    w.ledger.fail_appends(LedgerError::Dns);
    w.authority.will_return(verified("tx-dark"));

    let started = Instant::now();
    let err = w.reconciler.purchase(PRODUCT_STANDARD).await.unwrap_err();

    assert_eq!(err, CreditError::SyncFailed(LedgerError::Offline));
    assert_eq!(w.ledger.append_calls(), 1);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(w.authority.finalized().is_empty());
}

/// A ledger that answers slower than the attempt deadline counts as a timeout.
#[tokio::test(start_paused = true)]
async fn slow_ledger_attempts_time_out() {
    let identity = Identity::new(Uuid::new_v4(), None);
    let ledger = Arc::new(FakeLedger::new().with_balance(2));
    ledger.delay_appends(Duration::from_secs(5));
    let cache = Arc::new(LocalCache::new(Arc::new(InMemorySecureStore::new())));
    let reconciler = CreditReconciler::builder(
        ledger.clone(),
        Arc::new(FakeAuthority::new()),
        Arc::new(StaticSession::signed_in(identity.clone())),
        cache,
    )
    .attempt_timeout(Duration::from_secs(2))
    .usage_retry(creditsync_common::RetryConfig::builder().max_retries(0).build().unwrap())
    .build();
    reconciler.load_credits(Some(&identity)).await;

    let started = Instant::now();
    let err = reconciler.use_credit(&identity).await.unwrap_err();

    assert_eq!(err, CreditError::SyncFailed(LedgerError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(reconciler.credits(), CreditBalance::new(2));

    // the cancelled attempt never reaches the ledger
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(ledger.entries().is_empty());
}
