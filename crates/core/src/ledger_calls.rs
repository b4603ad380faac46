//! Retry and deadline plumbing shared by every ledger call

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use creditsync_common::resilience::policies::ClassifiedRetry;
use creditsync_common::resilience::{RetryConfig, RetryError, RetryExecutor};
use creditsync_common::{with_deadline_detached, with_timeout, ConnectivityGate, TimeoutError};
use creditsync_domain::{AppendOutcome, LedgerEntry, LedgerError};

use crate::credits::ports::LedgerClient;

pub(crate) fn executor(
    config: RetryConfig,
    gate: Option<&Arc<dyn ConnectivityGate>>,
) -> RetryExecutor<ClassifiedRetry> {
    let executor = RetryExecutor::new(config, ClassifiedRetry);
    match gate {
        Some(gate) => executor.with_connectivity(Arc::clone(gate)),
        None => executor,
    }
}

/// One attempt, cut off at `timeout`. The abandoned request is dropped.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match with_timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout),
    }
}

/// One write attempt, waited on for at most `timeout`.
///
/// A write still in flight at the deadline runs to completion in the
/// background. Its result is discarded; the idempotency key makes the retry
/// safe and the next balance read picks up whatever landed.
pub(crate) async fn detached_append(
    ledger: Arc<dyn LedgerClient>,
    entry: LedgerEntry,
    timeout: Duration,
) -> Result<AppendOutcome, LedgerError> {
    let write = async move {
        let key = entry.idempotency_key.clone();
        ledger.append_entry(&entry, key.as_deref()).await
    };
    match with_deadline_detached(timeout, write).await {
        Ok(result) => result,
        Err(TimeoutError::TimedOut(_)) => Err(LedgerError::Timeout),
        Err(TimeoutError::Abandoned) => {
            Err(LedgerError::ConnectionLost("ledger write task ended early".into()))
        }
    }
}

/// Collapse a retry failure into the ledger error callers report.
pub(crate) fn into_ledger_error(err: RetryError<LedgerError>) -> LedgerError {
    match err {
        RetryError::Offline { .. } => LedgerError::Offline,
        RetryError::InvalidConfiguration { message } => LedgerError::Config(message),
        other => other.into_last_error().unwrap_or(LedgerError::Offline),
    }
}
