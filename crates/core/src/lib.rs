//! # CreditSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the ledger, purchase authority, session and
//!   secure storage
//! - The local cache built on the secure store port
//! - Account exception resolution
//! - The credit reconciliation engine
//!
//! ## Architecture Principles
//! - Only depends on `creditsync-common` and `creditsync-domain`
//! - No HTTP, keychain, or platform code
//! - All external dependencies via traits

pub mod cache;
pub mod credits;
pub mod exceptions;
mod ledger_calls;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

/// Every port the engine talks through, in one place.
pub mod ports {
    pub use crate::cache::ports::{LegacyStore, LegacyValue, SecureStore};
    pub use crate::credits::ports::{LedgerClient, PurchaseAuthority, SessionProvider};
}

// Re-export specific items to avoid ambiguity
pub use cache::LocalCache;
pub use credits::{CreditReconciler, CreditReconcilerBuilder};
pub use exceptions::AccountExceptionResolver;
pub use ports::{LedgerClient, LegacyStore, PurchaseAuthority, SecureStore, SessionProvider};
