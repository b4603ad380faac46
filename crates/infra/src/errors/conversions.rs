//! Conversions from external infrastructure errors into ledger errors.

use std::error::Error as StdError;

use creditsync_common::security::KeychainError;
use creditsync_domain::LedgerError;
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LedgerError);

impl From<InfraError> for LedgerError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LedgerError> for InfraError {
    fn from(value: LedgerError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoLedgerError {
    fn into_ledger(self) -> LedgerError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → LedgerError */
/* -------------------------------------------------------------------------- */

impl IntoLedgerError for HttpError {
    fn into_ledger(self) -> LedgerError {
        if self.is_timeout() {
            return LedgerError::Timeout;
        }

        if self.is_connect() {
            if looks_like_dns_failure(&self) {
                return LedgerError::Dns;
            }
            return LedgerError::ConnectionLost(root_cause(&self));
        }

        if let Some(status) = self.status() {
            return LedgerError::from_status(status.as_u16());
        }

        if self.is_decode() {
            return LedgerError::Malformed(self.to_string());
        }

        if self.is_builder() {
            return LedgerError::Config(self.to_string());
        }

        LedgerError::ConnectionLost(root_cause(&self))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_ledger())
    }
}

fn looks_like_dns_failure(err: &HttpError) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        let message = cause.to_string().to_ascii_lowercase();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}

fn root_cause(err: &HttpError) -> String {
    let mut current: &(dyn StdError + 'static) = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → LedgerError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(LedgerError::Malformed(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* keychain → LedgerError (API key lookup) */
/* -------------------------------------------------------------------------- */

impl IntoLedgerError for KeyringError {
    fn into_ledger(self) -> LedgerError {
        match self {
            KeyringError::NoEntry => LedgerError::Config("ledger API key not in keychain".into()),
            KeyringError::BadEncoding(_) => {
                LedgerError::Config("ledger API key in keychain is not valid UTF-8".into())
            }
            KeyringError::NoStorageAccess(err) => {
                LedgerError::Config(format!("unable to access secure storage: {err}"))
            }
            other => LedgerError::Config(format!("keychain error: {other}")),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_ledger())
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        match value {
            KeychainError::NotFound => KeyringError::NoEntry.into(),
            KeychainError::Keyring(err) => err.into(),
            KeychainError::AccessFailed(message) => InfraError(LedgerError::Config(message)),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
