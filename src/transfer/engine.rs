//! Transfer Engine
//!
//! Executes the transfer protocol against two accounts fetched from the
//! ledger. Every attempt gets a transaction id, records exactly one outcome
//! in the statistics, and releases both locks before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::account::{Account, BalanceGuard};
use crate::balance::Balance;
use crate::core_types::{AccountId, Amount, TransactionId};
use crate::error::LedgerError;
use crate::ledger::Ledger;

use super::backoff::{BackoffClock, BackoffPolicy, SystemClock};
use super::cancel::CancelToken;
use super::state::{PhaseTracker, TransferPhase};
use super::stats::{StatisticsSnapshot, TransferStatistics};
use super::{LockStrategy, TransferRequest};

/// Default slice an ordered transfer blocks on a lock before re-checking cancellation
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retry policy for [`LockStrategy::TryLock`]
    pub backoff: BackoffPolicy,
    /// Ordered transfers wait in slices of this length, checking for cancellation in between
    pub lock_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
        }
    }
}

/// Balances right after a committed transfer, read under both locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from_balance: Amount,
    pub to_balance: Amount,
    /// Lock acquisition rounds (always 1 for ordered transfers)
    pub lock_attempts: u32,
}

/// Outcome of one `transfer` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub transaction_id: TransactionId,
    pub request: TransferRequest,
    pub outcome: Result<TransferReceipt, LedgerError>,
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Failure reason, `None` on success
    pub fn reason(&self) -> Option<&LedgerError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> Result<TransferReceipt, LedgerError> {
        self.outcome
    }
}

pub struct TransferEngine {
    ledger: Arc<Ledger>,
    stats: TransferStatistics,
    last_transaction_id: AtomicU64,
    config: EngineConfig,
    clock: Arc<dyn BackoffClock>,
}

impl TransferEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self::with_config(ledger, EngineConfig::default())
    }

    pub fn with_config(ledger: Arc<Ledger>, config: EngineConfig) -> Self {
        Self {
            ledger,
            stats: TransferStatistics::new(),
            last_transaction_id: AtomicU64::new(0),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the backoff clock (tests drive retries on virtual time)
    pub fn with_clock(mut self, clock: Arc<dyn BackoffClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn get_balance(&self, id: AccountId) -> Result<Amount, LedgerError> {
        self.ledger.get_balance(id)
    }

    /// Move `amount` from `from` to `to` using `strategy`. Cannot be cancelled.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        strategy: LockStrategy,
    ) -> TransferResult {
        let never = CancelToken::new();
        self.transfer_with_cancel(TransferRequest::new(from, to, amount, strategy), &never)
    }

    /// Execute `request`, giving up with `Cancelled` if `cancel` fires while
    /// waiting for a lock or sleeping in backoff.
    pub fn transfer_with_cancel(
        &self,
        request: TransferRequest,
        cancel: &CancelToken,
    ) -> TransferResult {
        let transaction_id = self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.record_attempt();

        let mut phase = PhaseTracker::new();
        let outcome = self.execute(&request, cancel, &mut phase);

        match &outcome {
            Ok(receipt) => {
                phase.advance(TransferPhase::Success);
                self.stats.record_strategy_success(request.strategy);
                self.stats.record_success();
                tracing::debug!(
                    target: "TRANSFER",
                    transaction_id,
                    from = request.from,
                    to = request.to,
                    amount = request.amount,
                    strategy = %request.strategy,
                    from_balance = receipt.from_balance,
                    to_balance = receipt.to_balance,
                    lock_attempts = receipt.lock_attempts,
                    "Transfer committed"
                );
            }
            Err(err) => {
                let failed_in = phase.current();
                phase.advance(TransferPhase::Failed);
                match err {
                    LedgerError::InsufficientFunds { .. } => self.stats.incr_insufficient_funds(),
                    LedgerError::Cancelled => self.stats.incr_cancelled(),
                    LedgerError::LockAcquisitionExhausted { .. } => self.stats.incr_exhausted(),
                    _ => {}
                }
                self.stats.record_failure();
                if err.is_retryable() {
                    tracing::warn!(
                        target: "TRANSFER",
                        transaction_id,
                        from = request.from,
                        to = request.to,
                        amount = request.amount,
                        strategy = %request.strategy,
                        code = err.code(),
                        phase = %failed_in,
                        "Transfer abandoned: {}", err
                    );
                } else {
                    tracing::debug!(
                        target: "TRANSFER",
                        transaction_id,
                        from = request.from,
                        to = request.to,
                        amount = request.amount,
                        strategy = %request.strategy,
                        code = err.code(),
                        phase = %failed_in,
                        "Transfer rejected: {}", err
                    );
                }
            }
        }

        TransferResult {
            transaction_id,
            request,
            outcome,
        }
    }

    fn execute(
        &self,
        request: &TransferRequest,
        cancel: &CancelToken,
        phase: &mut PhaseTracker,
    ) -> Result<TransferReceipt, LedgerError> {
        if request.amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if request.from == request.to {
            return Err(LedgerError::SameAccount);
        }
        let from = self.ledger.get_account(request.from)?;
        let to = self.ledger.get_account(request.to)?;

        phase.advance(TransferPhase::LocksAcquiring);
        match request.strategy {
            LockStrategy::Ordered => {
                self.transfer_ordered(&from, &to, request.amount, cancel, phase)
            }
            LockStrategy::TryLock => {
                self.transfer_try_lock(&from, &to, request.amount, cancel, phase)
            }
        }
    }

    // ============================================================
    // STRATEGY A: ORDERED TWO-PHASE LOCKING
    // ============================================================

    fn transfer_ordered(
        &self,
        from: &Account,
        to: &Account,
        amount: Amount,
        cancel: &CancelToken,
        phase: &mut PhaseTracker,
    ) -> Result<TransferReceipt, LedgerError> {
        let source_first = from.id() < to.id();
        let (first, second) = if source_first { (from, to) } else { (to, from) };

        let mut first_guard = self.lock_cancellable(first, cancel)?;
        // On cancellation first_guard drops here, releasing the lower lock
        let mut second_guard = self.lock_cancellable(second, cancel)?;
        phase.advance(TransferPhase::LocksHeld);

        let (from_balance, to_balance) = if source_first {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };
        let result = settle(to.id(), from_balance, to_balance, amount, 1, phase);

        drop(second_guard);
        drop(first_guard);
        phase.advance(TransferPhase::Released);
        result
    }

    /// Block on `account`'s lock in bounded slices, bailing out on cancellation.
    fn lock_cancellable<'a>(
        &self,
        account: &'a Account,
        cancel: &CancelToken,
    ) -> Result<BalanceGuard<'a>, LedgerError> {
        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            if let Some(guard) = account.try_lock_for(self.config.lock_poll_interval) {
                return Ok(guard);
            }
        }
    }

    // ============================================================
    // STRATEGY B: TRY-LOCK WITH BOUNDED BACKOFF
    // ============================================================

    fn transfer_try_lock(
        &self,
        from: &Account,
        to: &Account,
        amount: Amount,
        cancel: &CancelToken,
        phase: &mut PhaseTracker,
    ) -> Result<TransferReceipt, LedgerError> {
        let policy = &self.config.backoff;
        let started = self.clock.now();
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            attempts = attempts.saturating_add(1);

            if let Some(mut from_guard) = from.try_lock() {
                if let Some(mut to_guard) = to.try_lock() {
                    phase.advance(TransferPhase::LocksHeld);
                    let result =
                        settle(to.id(), &mut from_guard, &mut to_guard, amount, attempts, phase);
                    drop(to_guard);
                    drop(from_guard);
                    phase.advance(TransferPhase::Released);
                    return result;
                }
                // Never wait while holding the source
                drop(from_guard);
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            if policy.is_exhausted(attempts - 1, elapsed) {
                return Err(LedgerError::LockAcquisitionExhausted { attempts });
            }
            self.stats.incr_lock_retry();

            phase.advance(TransferPhase::LocksAcquiring);
            if !self.clock.sleep(policy.delay_for(attempts), cancel) {
                return Err(LedgerError::Cancelled);
            }
        }
    }
}

/// Validate and apply with both locks held. Leaves both balances untouched on error.
fn settle(
    to_id: AccountId,
    from_balance: &mut Balance,
    to_balance: &mut Balance,
    amount: Amount,
    lock_attempts: u32,
    phase: &mut PhaseTracker,
) -> Result<TransferReceipt, LedgerError> {
    phase.advance(TransferPhase::Validating);
    if !from_balance.can_debit(amount) {
        phase.advance(TransferPhase::InsufficientFunds);
        return Err(LedgerError::InsufficientFunds {
            available: from_balance.amount(),
            requested: amount,
        });
    }
    if !to_balance.can_credit(amount) {
        return Err(LedgerError::BalanceOverflow(to_id));
    }

    // Both sides were checked under the same locks
    phase.advance(TransferPhase::Apply);
    let debited = from_balance.debit(amount);
    debug_assert!(debited);
    let credited = to_balance.credit(amount);
    debug_assert!(credited.is_ok());

    Ok(TransferReceipt {
        from_balance: from_balance.amount(),
        to_balance: to_balance.amount(),
        lock_attempts,
    })
}
