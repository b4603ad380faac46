//! Integration tests for the connectivity monitor

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use creditsync_common::network::{ConnectionType, ConnectivityGate, ConnectivityMonitor, NetworkPath};
use tokio::time::Instant;

#[test]
fn test_shared_monitor_is_a_single_instance() {
    let a = ConnectivityMonitor::shared();
    let b = ConnectivityMonitor::shared();
    assert!(Arc::ptr_eq(&a, &b));
}

/// Validates that a path stream driven from another task is observed by a
/// waiter polling through the gate trait.
#[tokio::test(start_paused = true)]
async fn test_gate_waits_for_streamed_reconnect() {
    let monitor = Arc::new(ConnectivityMonitor::with_path(NetworkPath::offline()));
    let (tx, rx) = futures::channel::mpsc::unbounded::<NetworkPath>();

    let follower = Arc::clone(&monitor);
    tokio::spawn(async move { follower.follow(rx).await });
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = tx.unbounded_send(NetworkPath::online(ConnectionType::Wifi));
    });

    let gate: Arc<dyn ConnectivityGate> = monitor.clone();
    assert!(!gate.is_connected());

    let started = Instant::now();
    assert!(gate.wait_for_connection(Duration::from_secs(10)).await);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(monitor.is_suitable_for_upload());
}

#[test]
fn test_watch_receiver_tracks_latest_path() {
    let monitor = ConnectivityMonitor::new();
    let rx = monitor.subscribe();

    monitor.apply_path(NetworkPath::offline());
    monitor.apply_path(NetworkPath::online(ConnectionType::Ethernet));

    assert_eq!(rx.borrow().connection_type, ConnectionType::Ethernet);
    assert!(rx.borrow().connected);
}
