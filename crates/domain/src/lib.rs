//! # CreditSync Domain
//!
//! Business domain types for the credit reconciliation engine.
//!
//! This crate contains:
//! - Credit, ledger, purchase and account-exception types
//! - The static product catalog
//! - Domain error types and Result definitions
//! - Configuration structures and constants
//!
//! ## Architecture
//! - Depends only on the foundation tier of `creditsync-common`
//! - No I/O, no async

pub mod catalog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use catalog::{Product, ProductCatalog};
pub use config::*;
pub use errors::*;
pub use types::*;
