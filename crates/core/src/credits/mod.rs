//! Credit reconciliation
//!
//! The reconciler owns the in-memory balance and keeps it converged with the
//! remote ledger and the local cache.

pub mod ports;
mod reconciler;

pub use reconciler::{CreditReconciler, CreditReconcilerBuilder};
