//! Transfer statistics - lock-free counters shared by all workers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::LockStrategy;

/// Counters updated concurrently by every transfer.
///
/// Each attempt increments `attempted` first and exactly one of
/// `succeeded` / `failed` last.
#[derive(Debug, Default)]
pub struct TransferStatistics {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,

    // Breakdown
    ordered_succeeded: AtomicU64,
    try_lock_succeeded: AtomicU64,
    insufficient_funds: AtomicU64,
    cancelled: AtomicU64,
    exhausted: AtomicU64,
    /// Failed try-lock rounds that backed off; the round that exhausts the budget is not one
    lock_retries: AtomicU64,
}

impl TransferStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_strategy_success(&self, strategy: LockStrategy) {
        match strategy {
            LockStrategy::Ordered => self.ordered_succeeded.fetch_add(1, Ordering::Relaxed),
            LockStrategy::TryLock => self.try_lock_succeeded.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn incr_insufficient_funds(&self) {
        self.insufficient_funds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_lock_retry(&self) {
        let count = self.lock_retries.fetch_add(1, Ordering::Relaxed);
        if count % 10000 == 0 {
            tracing::warn!(
                target: "TRANSFER",
                total_lock_retries = count + 1,
                "Lock contention detected (1/10000)"
            );
        }
    }

    /// Point-in-time copy of the counters.
    ///
    /// Outcomes are loaded before `attempted`; since every outcome increment
    /// is preceded by its attempt increment, `succeeded + failed <= attempted`
    /// holds in every snapshot even with transfers in flight.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let attempted = self.attempted.load(Ordering::SeqCst);
        StatisticsSnapshot {
            attempted,
            succeeded,
            failed,
            ordered_succeeded: self.ordered_succeeded.load(Ordering::Relaxed),
            try_lock_succeeded: self.try_lock_succeeded.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            lock_retries: self.lock_retries.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of stats (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub ordered_succeeded: u64,
    pub try_lock_succeeded: u64,
    pub insufficient_funds: u64,
    pub cancelled: u64,
    pub exhausted: u64,
    pub lock_retries: u64,
}

impl StatisticsSnapshot {
    /// Attempts that have not recorded an outcome yet
    pub fn in_flight(&self) -> u64 {
        self.attempted
            .saturating_sub(self.succeeded + self.failed)
    }

    /// Counters accumulated after `earlier` was taken
    pub fn since(&self, earlier: &StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            attempted: self.attempted.saturating_sub(earlier.attempted),
            succeeded: self.succeeded.saturating_sub(earlier.succeeded),
            failed: self.failed.saturating_sub(earlier.failed),
            ordered_succeeded: self
                .ordered_succeeded
                .saturating_sub(earlier.ordered_succeeded),
            try_lock_succeeded: self
                .try_lock_succeeded
                .saturating_sub(earlier.try_lock_succeeded),
            insufficient_funds: self
                .insufficient_funds
                .saturating_sub(earlier.insufficient_funds),
            cancelled: self.cancelled.saturating_sub(earlier.cancelled),
            exhausted: self.exhausted.saturating_sub(earlier.exhausted),
            lock_retries: self.lock_retries.saturating_sub(earlier.lock_retries),
        }
    }

    /// Succeeded / attempted as a percentage, 0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 * 100.0 / self.attempted as f64
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer Stats: attempted={}, succeeded={} (ordered={}, trylock={}), failed={} (insufficient={}, cancelled={}, exhausted={}), lock_retries={}, success_rate={:.2}%",
            self.attempted,
            self.succeeded,
            self.ordered_succeeded,
            self.try_lock_succeeded,
            self.failed,
            self.insufficient_funds,
            self.cancelled,
            self.exhausted,
            self.lock_retries,
            self.success_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn test_counters() {
        let stats = TransferStatistics::new();

        stats.record_attempt();
        stats.record_attempt();
        stats.record_attempt();
        stats.record_success();
        stats.record_strategy_success(LockStrategy::TryLock);
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.attempted, 3);
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.try_lock_succeeded, 1);
        assert_eq!(snap.ordered_succeeded, 0);
        assert_eq!(snap.in_flight(), 1);
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(StatisticsSnapshot::default().success_rate(), 0.0);

        let snap = StatisticsSnapshot {
            attempted: 4,
            succeeded: 3,
            failed: 1,
            ..Default::default()
        };
        assert!((snap.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_never_overcounts_outcomes() {
        let stats = Arc::new(TransferStatistics::new());
        let done = Arc::new(AtomicBool::new(false));

        let mut writers = vec![];
        for i in 0..4 {
            let stats = Arc::clone(&stats);
            writers.push(thread::spawn(move || {
                for n in 0..10_000 {
                    stats.record_attempt();
                    if (n + i) % 3 == 0 {
                        stats.record_failure();
                    } else {
                        stats.record_success();
                    }
                }
            }));
        }

        let reader = {
            let stats = Arc::clone(&stats);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let snap = stats.snapshot();
                    assert!(snap.succeeded + snap.failed <= snap.attempted);
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.attempted, 40_000);
        assert_eq!(snap.succeeded + snap.failed, snap.attempted);
    }

    #[test]
    fn test_display() {
        let snap = StatisticsSnapshot {
            attempted: 2,
            succeeded: 1,
            failed: 1,
            ..Default::default()
        };
        let text = snap.to_string();
        assert!(text.starts_with("Transfer Stats: attempted=2, succeeded=1"));
        assert!(text.ends_with("success_rate=50.00%"));
    }
}
