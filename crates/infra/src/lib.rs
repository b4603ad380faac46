//! # CreditSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP ledger client (PostgREST wire format)
//! - Keychain-backed secure store and the legacy preferences file
//! - TCP reachability probe feeding the connectivity monitor
//! - Transaction listener worker
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `creditsync-core`
//! - Depends on `creditsync-common` and `creditsync-domain`
//! - Contains all "impure" code (I/O, platform APIs)

pub mod config;
pub mod errors;
pub mod ledger;
pub mod network;
pub mod storage;
pub mod sync;

// Re-export commonly used items
pub use errors::{InfraError, WorkerError};
pub use ledger::HttpLedgerClient;
pub use network::ReachabilityProbe;
pub use storage::{JsonPreferencesStore, KeychainSecureStore};
pub use sync::{EventOutcome, TransactionListener};
