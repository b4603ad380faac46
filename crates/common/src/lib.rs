//! Runtime primitives shared across creditsync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and classification
//! - `runtime`: async infrastructure (resilience, network reachability)
//! - `platform`: platform integrations (keychain)
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod network;
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use network::{ConnectionType, ConnectivityGate, ConnectivityMonitor, NetworkPath};
#[cfg(feature = "runtime")]
pub use resilience::{
    policies, with_deadline_detached, with_timeout, BackoffSchedule, RetryConfig,
    RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult,
    TimeoutError,
};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider};
