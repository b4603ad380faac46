use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    Purchase,
    Use,
    Bonus,
    Refund,
    Initial,
    /// Written by a newer backend; shown generically.
    #[serde(other)]
    Unknown,
}

impl_domain_status_conversions!(LedgerEntryType {
    Purchase => "purchase",
    Use => "use",
    Bonus => "bonus",
    Refund => "refund",
    Initial => "initial",
    Unknown => "unknown",
});

impl LedgerEntryType {
    pub fn display_title(self) -> &'static str {
        match self {
            Self::Purchase => "Credit Purchase",
            Self::Use => "Authentication",
            Self::Bonus => "Bonus Credits",
            Self::Refund => "Refund",
            Self::Initial => "Welcome Credits",
            Self::Unknown => "Transaction",
        }
    }
}

/// Immutable, append-only ledger row.
///
/// `id` and `created_at` are assigned by the ledger on insert.
/// `credits_after` is the balance the writer believed current at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    #[serde(rename = "transaction_type")]
    pub entry_type: LedgerEntryType,
    #[serde(default)]
    pub product_id: Option<String>,
    pub credits_change: i64,
    pub credits_after: i64,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    #[serde(rename = "original_transaction_id", default)]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Credit pack purchase keyed by the authority's transaction id.
    pub fn purchase(
        user_id: Uuid,
        product_id: impl Into<String>,
        credits: u32,
        credits_after: u32,
        amount_usd: Option<f64>,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            entry_type: LedgerEntryType::Purchase,
            product_id: Some(product_id.into()),
            credits_change: i64::from(credits),
            credits_after: i64::from(credits_after),
            amount_usd,
            idempotency_key: Some(transaction_id.into()),
            created_at: None,
        }
    }

    /// Single credit consumed by an analysis.
    pub fn usage(user_id: Uuid, credits_after: u32, idempotency_key: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id,
            entry_type: LedgerEntryType::Use,
            product_id: None,
            credits_change: -1,
            credits_after: i64::from(credits_after),
            amount_usd: None,
            idempotency_key: Some(idempotency_key.into()),
            created_at: None,
        }
    }

    pub fn display_title(&self) -> &'static str {
        self.entry_type.display_title()
    }
}

/// What the ledger did with an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendOutcome {
    /// New entry written and balance moved
    Created,
    /// Idempotency key already recorded; nothing changed
    Duplicate,
}

impl AppendOutcome {
    pub fn from_created(created: bool) -> Self {
        if created {
            Self::Created
        } else {
            Self::Duplicate
        }
    }
}
