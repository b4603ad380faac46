//! Background consumer of the purchase authority's transaction stream.
//!
//! Deliveries arrive for purchases completed outside the in-app flow:
//! interrupted purchases, renewals, restores, and purchases made on another
//! device. Each verified delivery is applied to the ledger through
//! [`CreditReconciler::apply_purchase`] and finalized only once the ledger
//! has it. Events are handled one at a time in delivery order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use creditsync_core::{CreditReconciler, PurchaseAuthority};
//! use creditsync_domain::ListenerConfig;
//! use creditsync_infra::sync::TransactionListener;
//!
//! # async fn example(authority: Arc<dyn PurchaseAuthority>, reconciler: CreditReconciler) {
//! let mut listener = TransactionListener::new(authority, reconciler, ListenerConfig::default());
//! listener.start().expect("first start");
//! // ... application runs ...
//! listener.stop().await.ok();
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use creditsync_core::{CreditReconciler, PurchaseAuthority};
use creditsync_domain::{AppendOutcome, ListenerConfig, VerificationResult};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::WorkerError;

const WORKER: &str = "transaction listener";

/// What the listener did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Written to the ledger and finalized
    Applied,
    /// Ledger already had it; finalized
    Duplicate,
    /// Product grants no credits; finalized without a ledger write
    NonCreditFinalized,
    /// Failed verification; left unfinalized
    Discarded,
    /// Ledger write failed; left unfinalized with a pending marker
    Deferred,
}

/// Supervised listener task with start-once semantics.
pub struct TransactionListener {
    authority: Arc<dyn PurchaseAuthority>,
    reconciler: CreditReconciler,
    config: ListenerConfig,
    started: AtomicBool,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl TransactionListener {
    pub fn new(
        authority: Arc<dyn PurchaseAuthority>,
        reconciler: CreditReconciler,
        config: ListenerConfig,
    ) -> Self {
        Self {
            authority,
            reconciler,
            config,
            started: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Take the authority's update stream and spawn the consumer.
    ///
    /// A listener starts at most once; later calls fail even after `stop`.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyStarted(WORKER));
        }

        info!("Starting transaction listener");
        self.log_pending_markers();

        let updates = self.authority.transaction_updates();
        let authority = Arc::clone(&self.authority);
        let reconciler = self.reconciler.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::listen_loop(updates, authority, reconciler, cancel).await;
        }));

        info!("Transaction listener started");
        Ok(())
    }

    /// Cancel the consumer and wait for the current event to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.task_handle.take() else {
            return Err(WorkerError::NotRunning(WORKER));
        };

        info!("Stopping transaction listener");
        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout();
        match tokio::time::timeout(join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Listener task panicked: {}", e);
                return Err(WorkerError::Panicked { worker: WORKER, message: e.to_string() });
            }
            Err(_) => {
                warn!("Listener task did not complete within timeout");
                return Err(WorkerError::JoinTimeout { worker: WORKER, timeout: join_timeout });
            }
        }

        info!("Transaction listener stopped");
        Ok(())
    }

    /// True while the consumer task is owned by this listener. The task
    /// may already have exited if the authority closed its stream.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    fn log_pending_markers(&self) {
        match self.reconciler.cache().pending_sync_ids() {
            Ok(ids) if ids.is_empty() => debug!("No pending purchase syncs"),
            Ok(ids) => warn!(
                count = ids.len(),
                transaction_ids = ?ids,
                "Purchases awaiting ledger sync; they apply when the authority redelivers them"
            ),
            Err(e) => warn!(error = %e, "Failed to read pending sync markers"),
        }
    }

    async fn listen_loop(
        mut updates: BoxStream<'static, VerificationResult>,
        authority: Arc<dyn PurchaseAuthority>,
        reconciler: CreditReconciler,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Listener loop cancelled");
                    break;
                }
                next = updates.next() => {
                    let Some(update) = next else {
                        info!("Transaction update stream ended");
                        break;
                    };
                    let outcome = process_event(&reconciler, authority.as_ref(), update).await;
                    debug!(?outcome, "Transaction update handled");
                }
            }
        }
    }
}

impl Drop for TransactionListener {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("TransactionListener dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}

/// Handle one delivery. Never fails; every problem is logged and reported
/// through the outcome.
#[instrument(skip_all, fields(transaction_id = %update.transaction().id, product_id = %update.transaction().product_id))]
pub async fn process_event(
    reconciler: &CreditReconciler,
    authority: &dyn PurchaseAuthority,
    update: VerificationResult,
) -> EventOutcome {
    let transaction = match update {
        VerificationResult::Verified { transaction } => transaction,
        VerificationResult::Unverified { reason, .. } => {
            error!(reason = %reason, "Transaction failed verification, discarding");
            return EventOutcome::Discarded;
        }
    };

    if reconciler.catalog().credits_for(&transaction.product_id) == 0 {
        debug!("Product grants no credits, finalizing");
        finalize(authority, &transaction.id).await;
        return EventOutcome::NonCreditFinalized;
    }

    match reconciler.apply_purchase(&transaction).await {
        Ok(applied) => {
            finalize(authority, &transaction.id).await;
            if let Err(e) = reconciler.cache().clear_pending_sync(&transaction.id) {
                warn!(error = %e, "Failed to clear pending sync marker");
            }
            match applied {
                AppendOutcome::Created => EventOutcome::Applied,
                AppendOutcome::Duplicate => EventOutcome::Duplicate,
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to sync purchase to ledger, leaving unfinalized");
            if let Err(mark_err) = reconciler.cache().mark_pending_sync(&transaction.id) {
                warn!(error = %mark_err, "Failed to record pending sync marker");
            }
            EventOutcome::Deferred
        }
    }
}

async fn finalize(authority: &dyn PurchaseAuthority, transaction_id: &str) {
    if let Err(e) = authority.finalize(transaction_id).await {
        // the authority redelivers unfinalized transactions; the ledger dedups them
        warn!(transaction_id, error = %e, "Failed to finalize transaction");
    }
}
