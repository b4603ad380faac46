//! # CreditSync App
//!
//! Composition root for the credit reconciliation engine.
//!
//! This crate contains:
//! - Application context (dependency injection, worker lifecycle)
//! - Logging initialisation
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires host-provided ports (purchase authority, session) to the
//!   infrastructure adapters

pub mod context;
pub mod utils;

// Re-export for convenience
pub use context::{AppContext, HostServices};
pub use utils::logging::init_logging;
