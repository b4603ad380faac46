//! Deadline racing for async operations
//!
//! [`with_timeout`] races a future against a sleep. Whichever finishes first
//! wins and the loser is dropped, which cancels it at its next await point.
//!
//! [`with_deadline_detached`] is for work that must not be torn down halfway:
//! the operation is spawned and allowed to finish, but its late result is
//! thrown away once the caller has given up on it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The detached task panicked or was aborted by runtime shutdown
    #[error("detached operation ended without a result")]
    Abandoned,
}

impl ErrorClassification for TimeoutError {
    fn is_retryable(&self) -> bool {
        true
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TimedOut(_) => ErrorSeverity::Warning,
            Self::Abandoned => ErrorSeverity::Error,
        }
    }
}

impl From<TimeoutError> for CommonError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::TimedOut(duration) => CommonError::timeout("deadline", duration),
            TimeoutError::Abandoned => {
                CommonError::cancelled("deadline", "task ended without a result")
            }
        }
    }
}

/// Race `operation` against `duration`. The losing side is dropped.
pub async fn with_timeout<F, T>(duration: Duration, operation: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        output = operation => Ok(output),
        () = tokio::time::sleep(duration) => {
            debug!(timeout_ms = duration.as_millis() as u64, "operation lost race against deadline");
            Err(TimeoutError::TimedOut(duration))
        }
    }
}

/// Wait at most `duration` for a spawned `operation`.
///
/// On timeout the task keeps running to completion in the background and its
/// output is discarded.
pub async fn with_deadline_detached<F, T>(duration: Duration, operation: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(duration, handle).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "detached operation did not complete");
            Err(TimeoutError::Abandoned)
        }
        Err(_) => {
            debug!(
                timeout_ms = duration.as_millis() as u64,
                "caller stopped waiting; detached operation continues"
            );
            Err(TimeoutError::TimedOut(duration))
        }
    }
}
