//! Retry with exponential backoff, jitter and connectivity awareness
//!
//! [`RetryExecutor`] runs an async operation up to `max_retries + 1` times.
//! Between attempts it asks a [`RetryPolicy`] whether the failure is worth
//! retrying, waits for the network to come back if a [`ConnectivityGate`]
//! reports the device offline, then sleeps for the next backoff delay.
//!
//! Delay for retry `n` (0-based) is `min(initial * multiplier^n, max_delay)`,
//! scaled by a uniform factor in `[1.0, 1.25)` when jitter is enabled.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::ErrorClassification;
use crate::network::ConnectivityGate;

/// How long a retry waits for connectivity before giving up.
pub const DEFAULT_CONNECTIVITY_WAIT: Duration = Duration::from_secs(10);

/// Upper bound (exclusive) of the jitter multiplier.
pub const MAX_JITTER_FACTOR: f64 = 1.25;

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed
    #[error("all {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The policy refused to retry this failure
    #[error("operation failed with non-retryable error: {error}")]
    NonRetryable { attempts: u32, error: E },

    /// The device stayed offline past the connectivity wait
    #[error("no connection after waiting {waited:?}, last error: {last}")]
    Offline { waited: Duration, last: E },

    /// The retry configuration is invalid
    #[error("invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E> {
    /// The failure from the final attempt, if one was made.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last, .. } | Self::Offline { last, .. } => Some(last),
            Self::NonRetryable { error, .. } => Some(error),
            Self::InvalidConfiguration { .. } => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } | Self::Offline { last, .. } => Some(last),
            Self::NonRetryable { error, .. } => Some(error),
            Self::InvalidConfiguration { .. } => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. })
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay. `attempt` is the 0-based index of the attempt that just failed.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
    /// Bounded wait for connectivity before a retry while offline
    pub connectivity_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryConfig {
    /// 3 retries, 1s doubling up to 30s.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
            connectivity_wait: DEFAULT_CONNECTIVITY_WAIT,
        }
    }

    /// 2 retries, 0.5s doubling up to 5s.
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            ..Self::standard()
        }
    }

    /// 5 retries, 2s doubling up to 60s. Used for purchase ledger writes.
    pub fn patient() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            ..Self::standard()
        }
    }

    /// Create a configuration builder starting from [`RetryConfig::standard`]
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(RetryError::InvalidConfiguration {
                message: "backoff_multiplier must be a finite value >= 1.0".to_string(),
            });
        }
        if self.initial_delay > self.max_delay {
            return Err(RetryError::InvalidConfiguration {
                message: "initial_delay must not exceed max_delay".to_string(),
            });
        }
        Ok(())
    }

    /// Total attempts this configuration permits.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pre-jitter delays, one per retry.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            current: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.backoff_multiplier,
            remaining: self.max_retries,
        }
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::standard() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.initial_delay = initial_delay;
        self.config.backoff_multiplier = multiplier;
        self.config.max_delay = max_delay;
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.use_jitter = false;
        self
    }

    pub fn connectivity_wait(mut self, wait: Duration) -> Self {
        self.config.connectivity_wait = wait;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Iterator over the capped exponential delays of a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    current: Duration,
    max_delay: Duration,
    multiplier: f64,
    remaining: u32,
}

impl BackoffSchedule {
    fn advance(&mut self) -> Duration {
        let delay = self.current.min(self.max_delay);
        // Once past the cap the exact value no longer matters; clamp so the
        // multiplication can't overflow.
        let next = self.current.as_secs_f64() * self.multiplier;
        self.current = Duration::try_from_secs_f64(next)
            .map_or(self.max_delay, |d| d.min(self.max_delay));
        delay
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.advance())
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0..MAX_JITTER_FACTOR);
    delay.mul_f64(factor)
}

/// The main retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
    connectivity: Option<Arc<dyn ConnectivityGate>>,
}

impl<P> fmt::Debug for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("connectivity_aware", &self.connectivity.is_some())
            .finish_non_exhaustive()
    }
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy, connectivity: None }
    }

    /// Create with the standard configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::standard(), policy)
    }

    /// Wait for this gate to report connectivity before each retry.
    #[must_use]
    pub fn with_connectivity(mut self, gate: Arc<dyn ConnectivityGate>) -> Self {
        self.connectivity = Some(gate);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    #[instrument(skip_all, fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut schedule = self.config.schedule();
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, max_attempts = self.config.max_attempts(), "executing");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= self.config.max_retries {
                warn!(attempts = attempt + 1, error = %error, "retry attempts exhausted");
                return Err(RetryError::Exhausted { attempts: attempt + 1, last: error });
            }

            let decision = self.policy.should_retry(&error, attempt);
            if decision == RetryDecision::Stop {
                debug!(error = %error, "retry policy declined to retry");
                return Err(RetryError::NonRetryable { attempts: attempt + 1, error });
            }

            if let Some(gate) = &self.connectivity {
                if !gate.is_connected() {
                    let waited = self.config.connectivity_wait;
                    if !gate.wait_for_connection(waited).await {
                        warn!(waited_ms = waited.as_millis() as u64, "still offline, giving up");
                        return Err(RetryError::Offline { waited, last: error });
                    }
                }
            }

            let backoff = schedule.next().unwrap_or(self.config.max_delay);
            let delay = match decision {
                RetryDecision::RetryAfter(custom) => custom,
                _ if self.config.use_jitter => apply_jitter(backoff),
                _ => backoff,
            };

            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{ErrorClassification, RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries whatever the error itself reports as retryable
    #[derive(Debug, Clone)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if error.is_retryable() {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
