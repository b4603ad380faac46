//! Account exception lookup with cached fallback

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use creditsync_common::resilience::RetryConfig;
use creditsync_common::ConnectivityGate;
use creditsync_domain::constants::DEFAULT_LEDGER_TIMEOUT_SECS;
use creditsync_domain::{ExceptionResolution, Identity, LedgerError};
use tracing::{info, instrument, warn};

use crate::cache::LocalCache;
use crate::credits::ports::LedgerClient;
use crate::ledger_calls::{bounded, executor, into_ledger_error};

/// Decides whether an identity holds a standing bypass entitlement.
pub struct AccountExceptionResolver {
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<LocalCache>,
    retry: RetryConfig,
    attempt_timeout: Duration,
    connectivity: Option<Arc<dyn ConnectivityGate>>,
}

impl AccountExceptionResolver {
    pub fn new(ledger: Arc<dyn LedgerClient>, cache: Arc<LocalCache>) -> Self {
        Self {
            ledger,
            cache,
            retry: RetryConfig::quick(),
            attempt_timeout: Duration::from_secs(DEFAULT_LEDGER_TIMEOUT_SECS),
            connectivity: None,
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connectivity(mut self, gate: Arc<dyn ConnectivityGate>) -> Self {
        self.connectivity = Some(gate);
        self
    }

    /// Query the ledger and cache the answer; fall back to the cached flag on
    /// failure. An identity without an email never holds an exception.
    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    pub async fn resolve(&self, identity: &Identity) -> ExceptionResolution {
        if identity.email.is_none() {
            return ExceptionResolution::Remote(false);
        }

        match self.fetch_active(identity).await {
            Ok(active) => {
                self.cache.store_exception(active);
                if active {
                    info!("account has an active exception");
                }
                ExceptionResolution::Remote(active)
            }
            Err(err) => {
                let cached = self.cache.cached_exception();
                warn!(error = %err, cached, "exception lookup failed, using cached flag");
                ExceptionResolution::Cached(cached)
            }
        }
    }

    async fn fetch_active(&self, identity: &Identity) -> Result<bool, LedgerError> {
        let ledger = &self.ledger;
        let timeout = self.attempt_timeout;
        let rows = executor(self.retry.clone(), self.connectivity.as_ref())
            .execute(move || bounded(timeout, ledger.read_exceptions(identity)))
            .await
            .map_err(into_ledger_error)?;

        let now = Utc::now();
        Ok(rows.iter().any(|row| row.is_in_effect(now)))
    }
}
