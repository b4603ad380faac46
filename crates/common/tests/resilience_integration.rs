//! Integration tests for resilience module
//!
//! Exercises the retry executor together with the connectivity monitor and
//! the timeout guard, the way ledger calls compose them.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use creditsync_common::error::{ErrorClassification, ErrorSeverity};
use creditsync_common::network::{ConnectionType, ConnectivityMonitor, NetworkPath};
use creditsync_common::resilience::{
    policies, with_timeout, RetryConfig, RetryError, RetryExecutor, TimeoutError,
};
use tokio::time::Instant;

/// Custom error type for testing
#[derive(Debug, Clone)]
struct TestError {
    message: String,
    retryable: bool,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

impl ErrorClassification for TestError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}

fn transient() -> TestError {
    TestError { message: "connection lost".to_string(), retryable: true }
}

/// Validates that a purchase-style write keeps retrying under the patient
/// configuration while offline, and succeeds once connectivity returns.
///
/// # Test Steps
/// 1. Start offline with the patient configuration
/// 2. Fail the first two attempts with a transient error
/// 3. Reconnect after 4 seconds from a background task
/// 4. Confirm the third attempt succeeds
#[tokio::test(start_paused = true)]
async fn test_patient_retry_recovers_when_connectivity_returns() {
    let monitor = Arc::new(ConnectivityMonitor::with_path(NetworkPath::offline()));
    let executor = RetryExecutor::new(RetryConfig::patient(), policies::ClassifiedRetry)
        .with_connectivity(monitor.clone());

    let reconnect = Arc::clone(&monitor);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        reconnect.apply_path(NetworkPath::online(ConnectionType::Cellular));
    });

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let result = executor
        .execute(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("written")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "written");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// Validates that the patient configuration makes six attempts in total
/// against a reachable but failing backend.
#[tokio::test(start_paused = true)]
async fn test_patient_retry_exhausts_after_six_attempts() {
    let monitor = Arc::new(ConnectivityMonitor::new());
    let executor = RetryExecutor::new(RetryConfig::patient(), policies::ClassifiedRetry)
        .with_connectivity(monitor);

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let result: Result<(), _> = executor
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 6);
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 6, .. })));
}

/// Validates that classified non-retryable errors are not retried.
#[tokio::test(start_paused = true)]
async fn test_classified_policy_stops_on_permanent_error() {
    let executor = RetryExecutor::new(RetryConfig::standard(), policies::ClassifiedRetry);
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result: Result<(), _> = executor
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { message: "bad request".to_string(), retryable: false }) }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, .. })));
}

/// Validates that each attempt can carry its own deadline, and timeouts count
/// as retryable failures.
#[tokio::test(start_paused = true)]
async fn test_per_attempt_timeout_inside_retry() {
    let config = RetryConfig::builder()
        .max_retries(2)
        .exponential_backoff(Duration::from_millis(100), 2.0, Duration::from_secs(1))
        .no_jitter()
        .build()
        .unwrap();
    let executor = RetryExecutor::new(config, policies::ClassifiedRetry);
    let started = Instant::now();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let result: Result<(), RetryError<TimeoutError>> = executor
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            with_timeout(Duration::from_secs(2), tokio::time::sleep(Duration::from_secs(5)))
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
    // 3 x 2s deadlines + 100ms + 200ms backoff
    assert_eq!(started.elapsed(), Duration::from_millis(6_300));
}
