//! Shared error vocabulary
//!
//! [`CommonError`] covers the failures that several crates hit without
//! needing their own words for them: configuration, serialization, local
//! persistence, deadlines, missing entries and cancelled tasks.
//!
//! [`ErrorClassification`] is how retry policies and log levels ask an error
//! whether it is transient and how loud it should be. Crate-level errors
//! implement it and wrap `CommonError` instead of duplicating its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("entry is corrupt: {0}")]
//!     Corrupt(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    #[error("Configuration error{}: {message}", scope(field))]
    Config { message: String, field: Option<String> },

    #[error("Serialization error ({format}): {message}")]
    Serialization { message: String, format: String },

    /// File I/O and keychain failures.
    #[error("Persistence error during '{operation}': {message}")]
    Persistence { message: String, operation: String },

    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("{resource} not found: '{identifier}'")]
    NotFound { resource: String, identifier: String },

    #[error("Task '{task}' cancelled: {reason}")]
    Cancelled { task: String, reason: String },
}

fn scope(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: format.into() }
    }

    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), operation: operation.into() }
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into(), identifier: identifier.into() }
    }

    pub fn cancelled(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cancelled { task: task.into(), reason: reason.into() }
    }

    /// Short machine-friendly name, used as the `error_type` log field.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::NotFound { .. } => "not_found",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::NotFound { .. } | Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::Config { .. } | Self::Serialization { .. } | Self::Persistence { .. } => {
                ErrorSeverity::Error
            }
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence("io", err.to_string())
    }
}

/// Uniform retry and severity questions for any error type.
pub trait ErrorClassification {
    /// Transient failures: timeouts, dropped connections, 5xx responses.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}
