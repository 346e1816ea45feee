//! Two-Account Transfers
//!
//! Moves value between two accounts while other threads do the same, using
//! one of two interchangeable deadlock-free locking strategies.
//!
//! # Strategies
//!
//! ```text
//! ORDERED:  lock(min(from, to)) → lock(max(from, to)) → validate → apply
//!
//! TRYLOCK:  try_lock(from) ──fail──▶ backoff ─┐
//!              │ ok                           │
//!           try_lock(to) ──fail──▶ unlock(from), backoff ─┤
//!              │ ok                           │
//!           validate → apply        ◀── retry ┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Global lock order**: ordered transfers always lock the lower id first,
//!    so the wait-for graph cannot contain a cycle
//! 2. **No hold-and-wait**: try-lock transfers never block while holding a lock
//! 3. **Validate under lock**: funds are re-checked with both locks held
//! 4. **All or nothing**: a failed transfer mutates no balance

pub mod backoff;
pub mod cancel;
pub mod engine;
pub mod state;
pub mod stats;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount};

// Re-exports for convenience
pub use backoff::{BackoffClock, BackoffKind, BackoffPolicy, SystemClock};
pub use cancel::CancelToken;
pub use engine::{EngineConfig, TransferEngine, TransferReceipt, TransferResult};
pub use state::TransferPhase;
pub use stats::{StatisticsSnapshot, TransferStatistics};

/// Deadlock-avoidance strategy for acquiring the two account locks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Block on both locks in ascending account id order
    Ordered,
    /// Non-blocking attempts with backoff and retry from a clean state
    TryLock,
}

impl LockStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStrategy::Ordered => "ORDERED",
            LockStrategy::TryLock => "TRYLOCK",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single request to move `amount` from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
    pub strategy: LockStrategy,
}

impl TransferRequest {
    pub fn new(from: AccountId, to: AccountId, amount: Amount, strategy: LockStrategy) -> Self {
        Self {
            from,
            to,
            amount,
            strategy,
        }
    }

    /// Same request, different strategy
    pub fn with_strategy(self, strategy: LockStrategy) -> Self {
        Self { strategy, ..self }
    }
}
