//! Port interfaces for credit operations

use async_trait::async_trait;
use creditsync_domain::{
    AccountException, AppendOutcome, Identity, LedgerEntry, LedgerError, PurchaseOutcome, Result,
    VerificationResult,
};
use futures::stream::BoxStream;

/// Remote ledger: the durable source of truth for balances
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current balance recorded for the identity
    async fn read_balance(&self, identity: &Identity) -> std::result::Result<i64, LedgerError>;

    /// Append an entry and move the balance in one step.
    ///
    /// A replayed `idempotency_key` must come back as
    /// [`AppendOutcome::Duplicate`] without writing anything.
    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        idempotency_key: Option<&str>,
    ) -> std::result::Result<AppendOutcome, LedgerError>;

    /// Active exception rows for the identity's email
    async fn read_exceptions(
        &self,
        identity: &Identity,
    ) -> std::result::Result<Vec<AccountException>, LedgerError>;

    /// Most recent entries first
    async fn read_history(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> std::result::Result<Vec<LedgerEntry>, LedgerError>;
}

/// External store that sells credit packs
#[async_trait]
pub trait PurchaseAuthority: Send + Sync {
    /// Continuous stream of transaction deliveries, replays included
    fn transaction_updates(&self) -> BoxStream<'static, VerificationResult>;

    /// Start the purchase flow for a product
    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome>;

    /// Tell the authority the transaction has been fully handled
    async fn finalize(&self, transaction_id: &str) -> Result<()>;

    /// Ask the authority to redeliver past transactions
    async fn restore_purchases(&self) -> Result<()>;
}

/// Signed-in user lookup
pub trait SessionProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}
