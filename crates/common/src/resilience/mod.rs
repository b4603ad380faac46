//! Resilience patterns for flaky networks
//!
//! - **Retry**: exponential backoff with jitter, policy-driven retry
//!   decisions, and an optional connectivity gate that parks retries while the
//!   device is offline.
//! - **Timeout**: race an operation against a deadline, either cancelling the
//!   loser or letting detached work finish in the background.
//!
//! Both are generic over the error type; domain crates plug in their own
//! errors through [`RetryPolicy`] or
//! [`ErrorClassification`](crate::error::ErrorClassification).

pub mod retry;
pub mod timeout;

// Re-export retry types
pub use retry::{
    policies, BackoffSchedule, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
// Re-export timeout types
pub use timeout::{with_deadline_detached, with_timeout, TimeoutError};
