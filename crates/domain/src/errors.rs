//! Error types used throughout the credit engine

use creditsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to the remote ledger
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum LedgerError {
    #[error("ledger request timed out")]
    Timeout,

    #[error("ledger host could not be resolved")]
    Dns,

    #[error("connection to ledger lost: {0}")]
    ConnectionLost(String),

    #[error("no internet connection")]
    Offline,

    #[error("ledger server error (HTTP {status})")]
    Server { status: u16 },

    #[error("ledger rejected request (HTTP {status})")]
    Client { status: u16 },

    #[error("ledger authentication failed")]
    Auth,

    #[error("malformed ledger response: {0}")]
    Malformed(String),

    #[error("ledger client misconfigured: {0}")]
    Config(String),
}

impl LedgerError {
    /// Retry allow-list: transport failures and 5xx only.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Dns | Self::ConnectionLost(_) | Self::Server { .. }
        )
    }

    /// Map an HTTP status outside 2xx.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            500..=599 => Self::Server { status },
            _ => Self::Client { status },
        }
    }
}

impl ErrorClassification for LedgerError {
    fn is_retryable(&self) -> bool {
        LedgerError::is_retryable(self)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout | Self::Dns | Self::ConnectionLost(_) | Self::Offline => {
                ErrorSeverity::Warning
            }
            Self::Server { .. } | Self::Client { .. } | Self::Malformed(_) => ErrorSeverity::Error,
            Self::Auth | Self::Config(_) => ErrorSeverity::Critical,
        }
    }
}

/// Main error type for credit operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum CreditError {
    #[error("purchase was cancelled")]
    Cancelled,

    #[error("purchase is pending approval")]
    Pending,

    #[error("not enough credits")]
    InsufficientCredits,

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("failed to sync: {0}")]
    SyncFailed(#[source] LedgerError),

    /// A ledger read failed and there is no fallback for it
    #[error("ledger unavailable: {0}")]
    Unavailable(#[source] LedgerError),

    #[error("no active session")]
    NoSession,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CreditError {
    /// Underlying ledger failure, if any.
    pub fn ledger_cause(&self) -> Option<&LedgerError> {
        match self {
            Self::SyncFailed(e) | Self::Unavailable(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorClassification for CreditError {
    fn is_retryable(&self) -> bool {
        self.ledger_cause().is_some_and(LedgerError::is_retryable)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled | Self::Pending | Self::InsufficientCredits | Self::NoSession => {
                ErrorSeverity::Info
            }
            Self::VerificationFailed(_) => ErrorSeverity::Warning,
            Self::SyncFailed(e) | Self::Unavailable(e) => e.severity(),
            Self::Storage(_) | Self::Config(_) => ErrorSeverity::Error,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }
}

impl From<CommonError> for CreditError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Config { .. } => Self::Config(err.to_string()),
            CommonError::Persistence { .. }
            | CommonError::Serialization { .. }
            | CommonError::NotFound { .. } => Self::Storage(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Result type alias for credit operations
pub type Result<T> = std::result::Result<T, CreditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_allow_list() {
        assert!(LedgerError::Timeout.is_retryable());
        assert!(LedgerError::Dns.is_retryable());
        assert!(LedgerError::ConnectionLost("reset".into()).is_retryable());
        assert!(LedgerError::Server { status: 503 }.is_retryable());

        assert!(!LedgerError::Client { status: 422 }.is_retryable());
        assert!(!LedgerError::Auth.is_retryable());
        assert!(!LedgerError::Malformed("eof".into()).is_retryable());
        assert!(!LedgerError::Offline.is_retryable());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(LedgerError::from_status(401), LedgerError::Auth);
        assert_eq!(LedgerError::from_status(502), LedgerError::Server { status: 502 });
        assert_eq!(LedgerError::from_status(404), LedgerError::Client { status: 404 });
    }

    #[test]
    fn sync_failures_inherit_retryability() {
        assert!(CreditError::SyncFailed(LedgerError::Timeout).is_retryable());
        assert!(!CreditError::SyncFailed(LedgerError::Auth).is_retryable());
        assert!(!CreditError::InsufficientCredits.is_retryable());
        assert_eq!(CreditError::InsufficientCredits.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn user_facing_messages() {
        assert_eq!(CreditError::Pending.to_string(), "purchase is pending approval");
        assert_eq!(
            CreditError::SyncFailed(LedgerError::Server { status: 500 }).to_string(),
            "failed to sync: ledger server error (HTTP 500)"
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(CreditError::NoSession).unwrap();
        assert_eq!(json["type"], "NoSession");
    }

    #[test]
    fn common_config_errors_stay_config() {
        let err: CreditError = CommonError::config("missing url").into();
        assert!(matches!(err, CreditError::Config(_)));
    }
}
