use serde::{Deserialize, Serialize};

/// A store transaction as delivered by the purchase authority.
///
/// `id` doubles as the ledger idempotency key. The same transaction may be
/// delivered more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseTransaction {
    pub id: String,
    pub product_id: String,
    /// Price charged, when the authority reports it
    #[serde(default)]
    pub amount_usd: Option<f64>,
}

impl PurchaseTransaction {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self { id: id.into(), product_id: product_id.into(), amount_usd: None }
    }

    #[must_use]
    pub fn with_amount(mut self, amount_usd: f64) -> Self {
        self.amount_usd = Some(amount_usd);
        self
    }
}

/// Receipt verification verdict attached to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationResult {
    Verified { transaction: PurchaseTransaction },
    Unverified { transaction: PurchaseTransaction, reason: String },
}

impl VerificationResult {
    pub fn verified(transaction: PurchaseTransaction) -> Self {
        Self::Verified { transaction }
    }

    pub fn unverified(transaction: PurchaseTransaction, reason: impl Into<String>) -> Self {
        Self::Unverified { transaction, reason: reason.into() }
    }

    pub fn transaction(&self) -> &PurchaseTransaction {
        match self {
            Self::Verified { transaction } | Self::Unverified { transaction, .. } => transaction,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Result of initiating a purchase with the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PurchaseOutcome {
    Success { result: VerificationResult },
    Cancelled,
    /// Awaiting approval (e.g. parental consent); arrives later as an update
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_accessor_covers_both_verdicts() {
        let tx = PurchaseTransaction::new("tx-9", "com.checkkicks.credits.basic");
        let ok = VerificationResult::verified(tx.clone());
        let bad = VerificationResult::unverified(tx.clone(), "signature mismatch");

        assert!(ok.is_verified());
        assert!(!bad.is_verified());
        assert_eq!(bad.transaction(), &tx);
    }

    #[test]
    fn amount_is_optional() {
        let tx = PurchaseTransaction::new("tx-1", "p").with_amount(6.99);
        assert_eq!(tx.amount_usd, Some(6.99));
        let parsed: PurchaseTransaction =
            serde_json::from_str(r#"{"id":"tx-2","product_id":"p"}"#).unwrap();
        assert!(parsed.amount_usd.is_none());
    }
}
