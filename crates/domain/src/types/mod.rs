//! Domain types and models

pub mod credits;
pub mod exception;
pub mod ledger;
pub mod purchase;

pub use credits::{BalanceSnapshot, BalanceSource, CreditBalance, Identity, LoadReport};
pub use exception::{AccountException, ExceptionResolution};
pub use ledger::{AppendOutcome, LedgerEntry, LedgerEntryType};
pub use purchase::{PurchaseOutcome, PurchaseTransaction, VerificationResult};
