//! Credit reconciliation engine
//!
//! Keeps the in-memory balance, the remote ledger and the local cache
//! converged. Consumption is optimistic (debit first, roll back if the ledger
//! write fails); additions are confirmed first (the balance only grows once
//! the ledger has recorded the purchase).

use std::sync::Arc;
use std::time::Duration;

use creditsync_common::resilience::policies::ClassifiedRetry;
use creditsync_common::resilience::{RetryConfig, RetryExecutor};
use creditsync_common::ConnectivityGate;
use creditsync_domain::constants::{
    CACHE_KEY_ACCOUNT_EXCEPTION, CACHE_KEY_CREDITS, DEFAULT_HISTORY_LIMIT,
    DEFAULT_LEDGER_TIMEOUT_SECS,
};
use creditsync_domain::{
    AppendOutcome, BalanceSnapshot, BalanceSource, CreditBalance, CreditError, Identity,
    LedgerEntry, LedgerError, LoadReport, ProductCatalog, PurchaseOutcome, PurchaseTransaction,
    Result, VerificationResult,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ports::{LedgerClient, PurchaseAuthority, SessionProvider};
use crate::cache::{LegacyStore, LocalCache};
use crate::exceptions::AccountExceptionResolver;
use crate::ledger_calls::{bounded, detached_append, executor, into_ledger_error};

/// Builder for [`CreditReconciler`]
pub struct CreditReconcilerBuilder {
    ledger: Arc<dyn LedgerClient>,
    authority: Arc<dyn PurchaseAuthority>,
    session: Arc<dyn SessionProvider>,
    cache: Arc<LocalCache>,
    catalog: ProductCatalog,
    connectivity: Option<Arc<dyn ConnectivityGate>>,
    legacy: Option<Arc<dyn LegacyStore>>,
    attempt_timeout: Duration,
    read_retry: RetryConfig,
    usage_retry: RetryConfig,
    purchase_retry: RetryConfig,
}

impl CreditReconcilerBuilder {
    /// Replace the standard product catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: ProductCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Park retries while this gate reports the device offline.
    #[must_use]
    pub fn connectivity(mut self, gate: Arc<dyn ConnectivityGate>) -> Self {
        self.connectivity = Some(gate);
        self
    }

    /// Migrate cached scalars out of this store when the reconciler is built.
    #[must_use]
    pub fn legacy_store(mut self, legacy: Arc<dyn LegacyStore>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Deadline for a single ledger attempt.
    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Policy for balance and history reads (default: standard).
    #[must_use]
    pub fn read_retry(mut self, config: RetryConfig) -> Self {
        self.read_retry = config;
        self
    }

    /// Policy for credit usage writes (default: standard).
    #[must_use]
    pub fn usage_retry(mut self, config: RetryConfig) -> Self {
        self.usage_retry = config;
        self
    }

    /// Policy for purchase writes (default: patient).
    #[must_use]
    pub fn purchase_retry(mut self, config: RetryConfig) -> Self {
        self.purchase_retry = config;
        self
    }

    /// Run legacy migration and assemble the reconciler.
    pub fn build(self) -> CreditReconciler {
        if let Some(legacy) = &self.legacy {
            for key in [CACHE_KEY_CREDITS, CACHE_KEY_ACCOUNT_EXCEPTION] {
                match self.cache.migrate_from_legacy(legacy.as_ref(), key) {
                    Ok(true) => {}
                    Ok(false) => debug!(key, "nothing to migrate"),
                    Err(err) => warn!(key, error = %err, "legacy migration failed"),
                }
            }
        }

        let mut exceptions = AccountExceptionResolver::new(self.ledger.clone(), self.cache.clone())
            .with_attempt_timeout(self.attempt_timeout);
        if let Some(gate) = &self.connectivity {
            exceptions = exceptions.with_connectivity(gate.clone());
        }

        let (snapshots, _) = watch::channel(BalanceSnapshot::default());

        CreditReconciler {
            inner: Arc::new(Inner {
                ledger: self.ledger,
                authority: self.authority,
                session: self.session,
                cache: self.cache,
                exceptions,
                catalog: self.catalog,
                connectivity: self.connectivity,
                attempt_timeout: self.attempt_timeout,
                read_retry: self.read_retry,
                usage_retry: self.usage_retry,
                purchase_retry: self.purchase_retry,
                state: Mutex::new(BalanceState::default()),
                snapshots,
            }),
        }
    }
}

struct Inner {
    ledger: Arc<dyn LedgerClient>,
    authority: Arc<dyn PurchaseAuthority>,
    session: Arc<dyn SessionProvider>,
    cache: Arc<LocalCache>,
    exceptions: AccountExceptionResolver,
    catalog: ProductCatalog,
    connectivity: Option<Arc<dyn ConnectivityGate>>,
    attempt_timeout: Duration,
    read_retry: RetryConfig,
    usage_retry: RetryConfig,
    purchase_retry: RetryConfig,
    /// Single writer for the balance. Never held across an await.
    state: Mutex<BalanceState>,
    snapshots: watch::Sender<BalanceSnapshot>,
}

#[derive(Debug, Default)]
struct BalanceState {
    snapshot: BalanceSnapshot,
    /// Local debits whose ledger write has not settled. A ledger or cache
    /// read does not include them yet, so they are subtracted on rebase.
    in_flight: u32,
    /// Bumped on sign-out. Debits taken in an older generation are dropped
    /// instead of settled.
    generation: u64,
}

impl BalanceState {
    /// Replace the balance with a value read from the ledger or the cache.
    fn rebase(&mut self, read: CreditBalance, has_exception: bool) -> CreditBalance {
        let credits = CreditBalance::new(read.get().saturating_sub(self.in_flight));
        self.snapshot = BalanceSnapshot { credits, has_account_exception: has_exception };
        credits
    }

    /// Retire one in-flight debit. `false` when it belongs to an older
    /// generation and must not touch the balance.
    fn settle(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        true
    }
}

enum Debit {
    Bypassed,
    Insufficient,
    Taken { after: CreditBalance, generation: u64 },
}

/// Owner of the session's credit balance.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CreditReconciler {
    inner: Arc<Inner>,
}

impl CreditReconciler {
    pub fn builder(
        ledger: Arc<dyn LedgerClient>,
        authority: Arc<dyn PurchaseAuthority>,
        session: Arc<dyn SessionProvider>,
        cache: Arc<LocalCache>,
    ) -> CreditReconcilerBuilder {
        CreditReconcilerBuilder {
            ledger,
            authority,
            session,
            cache,
            catalog: ProductCatalog::standard(),
            connectivity: None,
            legacy: None,
            attempt_timeout: Duration::from_secs(DEFAULT_LEDGER_TIMEOUT_SECS),
            read_retry: RetryConfig::standard(),
            usage_retry: RetryConfig::standard(),
            purchase_retry: RetryConfig::patient(),
        }
    }

    /// Refresh the balance from the ledger, falling back to the cache.
    ///
    /// Without an identity the cached values are used.
    #[instrument(skip_all)]
    pub async fn load_credits(&self, identity: Option<&Identity>) -> LoadReport {
        match self.load_remote(identity).await {
            Ok(report) => report,
            Err(err) => {
                let cached = self.inner.cache.cached_credits();
                let has_exception = self.inner.cache.cached_exception();
                let balance = self.mutate(|state| state.rebase(cached, has_exception));
                warn!(error = %err, credits = balance.get(), "using cached credits");
                LoadReport { balance, has_exception, source: BalanceSource::Cache }
            }
        }
    }

    async fn load_remote(&self, identity: Option<&Identity>) -> Result<LoadReport> {
        let identity = identity.ok_or(CreditError::NoSession)?;

        let ledger = &self.inner.ledger;
        let timeout = self.inner.attempt_timeout;
        let remote = self
            .executor(&self.inner.read_retry)
            .execute(move || bounded(timeout, ledger.read_balance(identity)))
            .await
            .map_err(|err| CreditError::Unavailable(into_ledger_error(err)))?;
        let remote = CreditBalance::try_from(remote).map_err(|_| {
            CreditError::Unavailable(LedgerError::Malformed(format!("negative balance {remote}")))
        })?;

        let has_exception = self.inner.exceptions.resolve(identity).await.is_active();

        let (balance, in_flight) =
            self.mutate(|state| (state.rebase(remote, has_exception), state.in_flight));
        self.inner.cache.store_credits(balance);
        info!(credits = balance.get(), in_flight, has_exception, "credits loaded");

        Ok(LoadReport { balance, has_exception, source: BalanceSource::Remote })
    }

    /// Buy a credit pack. Returns the number of credits added.
    ///
    /// The transaction is finalized only after the ledger has recorded it.
    #[instrument(skip(self))]
    pub async fn purchase(&self, product_id: &str) -> Result<u32> {
        match self.inner.authority.purchase(product_id).await? {
            PurchaseOutcome::Cancelled => {
                info!("purchase cancelled");
                Err(CreditError::Cancelled)
            }
            PurchaseOutcome::Pending => {
                info!("purchase pending approval");
                Err(CreditError::Pending)
            }
            PurchaseOutcome::Success { result: VerificationResult::Unverified { transaction, reason } } => {
                warn!(transaction_id = %transaction.id, %reason, "purchase failed verification");
                Err(CreditError::VerificationFailed(reason))
            }
            PurchaseOutcome::Success { result: VerificationResult::Verified { transaction } } => {
                let credits = self.inner.catalog.credits_for(&transaction.product_id);
                if credits == 0 {
                    warn!(product_id = %transaction.product_id, "product grants no credits");
                    self.inner.authority.finalize(&transaction.id).await?;
                    return Ok(0);
                }

                self.apply_purchase(&transaction).await?;
                match self.inner.authority.finalize(&transaction.id).await {
                    Ok(()) => info!(transaction_id = %transaction.id, credits, "purchase finalized"),
                    // redelivered by the authority and deduplicated by the ledger
                    Err(err) => warn!(
                        transaction_id = %transaction.id,
                        error = %err,
                        "credits applied but finalize failed"
                    ),
                }
                Ok(credits)
            }
        }
    }

    /// Record a verified transaction in the ledger, then credit it locally.
    ///
    /// Replaying a transaction id is safe: the ledger reports it as a
    /// duplicate and the balance is left alone.
    #[instrument(skip_all, fields(transaction_id = %transaction.id))]
    pub async fn apply_purchase(&self, transaction: &PurchaseTransaction) -> Result<AppendOutcome> {
        let identity = self.inner.session.current_identity().ok_or(CreditError::NoSession)?;

        let credits = self.inner.catalog.credits_for(&transaction.product_id);
        if credits == 0 {
            return Err(CreditError::Internal(format!(
                "product {} grants no credits",
                transaction.product_id
            )));
        }

        let believed_after = self.credits().saturating_add(credits);
        let entry = LedgerEntry::purchase(
            identity.user_id,
            transaction.product_id.as_str(),
            credits,
            believed_after.get(),
            transaction.amount_usd,
            transaction.id.as_str(),
        );

        let outcome = self
            .append(&entry, &self.inner.purchase_retry)
            .await
            .map_err(CreditError::SyncFailed)?;

        match outcome {
            AppendOutcome::Created => {
                let balance = self.mutate(|state| {
                    state.snapshot.credits = state.snapshot.credits.saturating_add(credits);
                    state.snapshot.credits
                });
                self.inner.cache.store_credits(balance);
                info!(credits, total = balance.get(), "purchase applied");
            }
            AppendOutcome::Duplicate => {
                info!("transaction already recorded, balance unchanged");
            }
        }
        Ok(outcome)
    }

    /// Spend one credit.
    ///
    /// The debit is applied immediately and rolled back if the ledger write
    /// fails. The write and rollback run on a spawned task, so dropping this
    /// future does not leave the balance debited without a ledger entry.
    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    pub async fn use_credit(&self, identity: &Identity) -> Result<()> {
        let debit = self.mutate(|state| {
            if state.snapshot.has_account_exception {
                return Debit::Bypassed;
            }
            match state.snapshot.credits.checked_decrement() {
                Some(after) => {
                    state.snapshot.credits = after;
                    state.in_flight += 1;
                    Debit::Taken { after, generation: state.generation }
                }
                None => Debit::Insufficient,
            }
        });

        let (after, generation) = match debit {
            Debit::Bypassed => {
                info!("account exception, no credit deducted");
                return Ok(());
            }
            Debit::Insufficient => {
                warn!("insufficient credits");
                return Err(CreditError::InsufficientCredits);
            }
            Debit::Taken { after, generation } => (after, generation),
        };

        let reconciler = self.clone();
        let user_id = identity.user_id;
        tokio::spawn(async move { reconciler.sync_usage(user_id, after, generation).await })
            .await
            .map_err(|err| CreditError::Internal(format!("usage sync task failed: {err}")))?
    }

    async fn sync_usage(&self, user_id: Uuid, after: CreditBalance, generation: u64) -> Result<()> {
        let key = Uuid::new_v4().to_string();
        let entry = LedgerEntry::usage(user_id, after.get(), key.as_str());

        match self.append(&entry, &self.inner.usage_retry).await {
            Ok(_) => {
                let (current, balance) =
                    self.mutate(|state| (state.settle(generation), state.snapshot.credits));
                if current {
                    self.inner.cache.store_credits(balance);
                }
                info!(remaining = balance.get(), "credit used");
                Ok(())
            }
            Err(err) => {
                let (current, balance) = self.mutate(|state| {
                    let current = state.settle(generation);
                    if current {
                        state.snapshot.credits = state.snapshot.credits.saturating_add(1);
                    }
                    (current, state.snapshot.credits)
                });
                if current {
                    self.inner.cache.store_credits(balance);
                    error!(error = %err, credits = balance.get(), "usage sync failed, debit rolled back");
                } else {
                    error!(error = %err, "usage sync failed after sign-out, nothing to roll back");
                }
                Err(CreditError::SyncFailed(err))
            }
        }
    }

    /// Ask the authority to redeliver past transactions.
    #[instrument(skip(self))]
    pub async fn restore_purchases(&self) -> Result<()> {
        self.inner.authority.restore_purchases().await?;
        info!("purchases restored");
        Ok(())
    }

    /// Newest-first ledger history for the signed-in user.
    #[instrument(skip(self))]
    pub async fn transaction_history(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let identity = self.inner.session.current_identity().ok_or(CreditError::NoSession)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

        let ledger = &self.inner.ledger;
        let timeout = self.inner.attempt_timeout;
        let identity = &identity;
        let entries = self
            .executor(&self.inner.read_retry)
            .execute(move || bounded(timeout, ledger.read_history(identity, limit)))
            .await
            .map_err(|err| CreditError::Unavailable(into_ledger_error(err)))?;

        debug!(count = entries.len(), "history fetched");
        Ok(entries)
    }

    /// Sign-out teardown.
    ///
    /// Usage writes still in flight finish against the ledger but no longer
    /// touch the local balance.
    pub fn reset(&self) {
        self.mutate(|state| {
            let generation = state.generation.wrapping_add(1);
            *state = BalanceState { generation, ..BalanceState::default() };
        });
        info!("credit state reset");
    }

    /// Current spendable balance.
    pub fn credits(&self) -> CreditBalance {
        self.inner.state.lock().snapshot.credits
    }

    /// Whether an active account exception waives credit usage.
    pub fn has_account_exception(&self) -> bool {
        self.inner.state.lock().snapshot.has_account_exception
    }

    /// True with an exception or a non-zero balance.
    pub fn has_credits(&self) -> bool {
        self.snapshot().has_credits()
    }

    /// Balance and exception flag in one read.
    pub fn snapshot(&self) -> BalanceSnapshot {
        self.inner.state.lock().snapshot
    }

    /// Observe every balance change.
    pub fn subscribe(&self) -> watch::Receiver<BalanceSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Product to credit mapping in use.
    pub fn catalog(&self) -> &ProductCatalog {
        &self.inner.catalog
    }

    /// Cache shared with the listener for pending-sync markers.
    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.inner.cache
    }

    fn executor(&self, config: &RetryConfig) -> RetryExecutor<ClassifiedRetry> {
        executor(config.clone(), self.inner.connectivity.as_ref())
    }

    async fn append(
        &self,
        entry: &LedgerEntry,
        config: &RetryConfig,
    ) -> std::result::Result<AppendOutcome, LedgerError> {
        let timeout = self.inner.attempt_timeout;
        self.executor(config)
            .execute(|| detached_append(Arc::clone(&self.inner.ledger), entry.clone(), timeout))
            .await
            .map_err(into_ledger_error)
    }

    /// Apply `change` under the lock and publish the snapshot if it differs.
    fn mutate<R>(&self, change: impl FnOnce(&mut BalanceState) -> R) -> R {
        let mut state = self.inner.state.lock();
        let before = state.snapshot;
        let result = change(&mut state);
        if state.snapshot != before {
            self.inner.snapshots.send_replace(state.snapshot);
        }
        result
    }
}
