//! In-memory port doubles for tests
//!
//! Enabled for this crate's unit tests and, through the `test-utils` feature,
//! for downstream crates.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creditsync_common::error::{CommonError, CommonResult};
use creditsync_domain::{
    AccountException, AppendOutcome, CreditError, Identity, LedgerEntry, LedgerError,
    PurchaseOutcome, Result, VerificationResult,
};
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::cache::ports::{LegacyStore, LegacyValue, SecureStore};
use crate::credits::ports::{LedgerClient, PurchaseAuthority, SessionProvider};

/// `SecureStore` over a `HashMap`.
#[derive(Default)]
pub struct InMemorySecureStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }

    /// Make every read fail until switched off again.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl SecureStore for InMemorySecureStore {
    fn save(&self, key: &str, value: &[u8]) -> CommonResult<()> {
        self.values.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CommonError::persistence("read", "secure store locked"));
        }
        Ok(self.values.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> CommonResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// `LegacyStore` seeded with fixed values.
#[derive(Default)]
pub struct InMemoryLegacyStore {
    values: Mutex<HashMap<String, LegacyValue>>,
}

impl InMemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: LegacyValue) -> Self {
        self.values.lock().insert(key.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl LegacyStore for InMemoryLegacyStore {
    fn read(&self, key: &str) -> CommonResult<Option<LegacyValue>> {
        Ok(self.values.lock().get(key).copied())
    }

    fn remove(&self, key: &str) -> CommonResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    balance: i64,
    entries: Vec<LedgerEntry>,
    keys: HashSet<String>,
    exceptions: Vec<AccountException>,
    read_failure: Option<LedgerError>,
    append_failure: Option<LedgerError>,
    /// Failures left before appends start succeeding again
    append_failures_left: usize,
    append_delay: Option<Duration>,
}

/// Ledger that remembers every appended entry and idempotency key.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    append_calls: AtomicUsize,
    exception_reads: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, balance: i64) -> Self {
        self.state.lock().balance = balance;
        self
    }

    pub fn add_exception(&self, exception: AccountException) {
        self.state.lock().exceptions.push(exception);
    }

    /// Every read fails with `error` until [`FakeLedger::recover`].
    pub fn fail_reads(&self, error: LedgerError) {
        self.state.lock().read_failure = Some(error);
    }

    /// Every append fails with `error` until [`FakeLedger::recover`].
    pub fn fail_appends(&self, error: LedgerError) {
        let mut state = self.state.lock();
        state.append_failure = Some(error);
        state.append_failures_left = usize::MAX;
    }

    /// The next `times` appends fail with `error`.
    pub fn fail_next_appends(&self, times: usize, error: LedgerError) {
        let mut state = self.state.lock();
        state.append_failure = Some(error);
        state.append_failures_left = times;
    }

    /// Appends take this long before answering.
    pub fn delay_appends(&self, delay: Duration) {
        self.state.lock().append_delay = Some(delay);
    }

    pub fn recover(&self) {
        let mut state = self.state.lock();
        state.read_failure = None;
        state.append_failure = None;
        state.append_failures_left = 0;
    }

    pub fn balance(&self) -> i64 {
        self.state.lock().balance
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().entries.clone()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn exception_reads(&self) -> usize {
        self.exception_reads.load(Ordering::SeqCst)
    }

    fn read_failure(&self) -> Option<LedgerError> {
        self.state.lock().read_failure.clone()
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn read_balance(&self, _identity: &Identity) -> std::result::Result<i64, LedgerError> {
        match self.read_failure() {
            Some(err) => Err(err),
            None => Ok(self.state.lock().balance),
        }
    }

    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        idempotency_key: Option<&str>,
    ) -> std::result::Result<AppendOutcome, LedgerError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.lock().append_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.append_failures_left > 0 {
            if let Some(err) = state.append_failure.clone() {
                state.append_failures_left -= 1;
                return Err(err);
            }
        }

        if let Some(key) = idempotency_key {
            if !state.keys.insert(key.to_string()) {
                return Ok(AppendOutcome::Duplicate);
            }
        }

        let mut stored = entry.clone();
        stored.id = Some(Uuid::new_v4());
        stored.created_at = Some(Utc::now());
        state.balance = (state.balance + entry.credits_change).max(0);
        state.entries.push(stored);
        Ok(AppendOutcome::Created)
    }

    async fn read_exceptions(
        &self,
        identity: &Identity,
    ) -> std::result::Result<Vec<AccountException>, LedgerError> {
        self.exception_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.read_failure() {
            return Err(err);
        }
        let email = identity.email.as_deref().unwrap_or_default();
        Ok(self
            .state
            .lock()
            .exceptions
            .iter()
            .filter(|row| row.user_email == email && row.is_active)
            .cloned()
            .collect())
    }

    async fn read_history(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> std::result::Result<Vec<LedgerEntry>, LedgerError> {
        if let Some(err) = self.read_failure() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == identity.user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Purchase authority driven by a channel and a queue of scripted outcomes.
pub struct FakeAuthority {
    sender: mpsc::UnboundedSender<VerificationResult>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<VerificationResult>>>,
    outcomes: Mutex<VecDeque<PurchaseOutcome>>,
    finalized: Mutex<Vec<String>>,
    fail_finalize: AtomicBool,
    restore_calls: AtomicUsize,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAuthority {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            outcomes: Mutex::new(VecDeque::new()),
            finalized: Mutex::new(Vec::new()),
            fail_finalize: AtomicBool::new(false),
            restore_calls: AtomicUsize::new(0),
        }
    }

    /// Push a delivery onto the update stream.
    pub fn deliver(&self, update: VerificationResult) {
        // Receiver dropped means the listener is gone; nothing to deliver to.
        let _ = self.sender.unbounded_send(update);
    }

    /// End the update stream.
    pub fn close(&self) {
        self.sender.close_channel();
    }

    /// Queue the result of the next `purchase` call.
    pub fn will_return(&self, outcome: PurchaseOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Make `finalize` fail without recording the transaction.
    pub fn fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    pub fn finalized(&self) -> Vec<String> {
        self.finalized.lock().clone()
    }

    pub fn restore_calls(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurchaseAuthority for FakeAuthority {
    fn transaction_updates(&self) -> BoxStream<'static, VerificationResult> {
        match self.receiver.lock().take() {
            Some(receiver) => receiver.boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome> {
        self.outcomes
            .lock()
            .pop_front()
            .ok_or_else(|| CreditError::Internal(format!("no scripted outcome for {product_id}")))
    }

    async fn finalize(&self, transaction_id: &str) -> Result<()> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(CreditError::Internal(format!("store refused to finish {transaction_id}")));
        }
        self.finalized.lock().push(transaction_id.to_string());
        Ok(())
    }

    async fn restore_purchases(&self) -> Result<()> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session that returns whatever identity it was last given.
#[derive(Default)]
pub struct StaticSession {
    identity: Mutex<Option<Identity>>,
}

impl StaticSession {
    pub fn signed_in(identity: Identity) -> Self {
        Self { identity: Mutex::new(Some(identity)) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set(&self, identity: Option<Identity>) {
        *self.identity.lock() = identity;
    }
}

impl SessionProvider for StaticSession {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }
}

/// Exception row for `email`, created a month ago.
pub fn exception_row(
    email: &str,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
) -> AccountException {
    AccountException {
        id: Uuid::new_v4(),
        user_email: email.to_string(),
        exception_type: "unlimited".to_string(),
        reason: None,
        created_at: Utc::now() - chrono::Duration::days(30),
        expires_at,
        is_active,
    }
}
