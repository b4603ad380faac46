//! Background worker lifecycle errors

use std::time::Duration;

use thiserror::Error;

/// Failures starting or stopping a background worker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("{0} already started")]
    AlreadyStarted(&'static str),

    #[error("{0} not running")]
    NotRunning(&'static str),

    #[error("{worker} task panicked: {message}")]
    Panicked { worker: &'static str, message: String },

    #[error("{worker} task did not finish within {timeout:?}")]
    JoinTimeout { worker: &'static str, timeout: Duration },
}
