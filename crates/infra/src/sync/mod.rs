//! Background purchase synchronization
//!
//! - TransactionListener: applies authority deliveries to the ledger
//!
//! Workers track their join handles and cancel explicitly on stop or drop.

pub mod transaction_listener;

pub use transaction_listener::{process_event, EventOutcome, TransactionListener};
