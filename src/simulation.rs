//! Simulation driver
//!
//! Feeds transfer requests to a pool of worker threads through a bounded
//! [`WorkQueue`] and reports what happened to the ledger.
//!
//! ```text
//! producer ──push──▶ WorkQueue ──pop──▶ worker 1..N ──▶ TransferEngine
//!                                            │
//!                                            └──▶ failure codes ──▶ SimulationReport
//! ```
//!
//! Two workloads are provided: a deterministic ring (every account pays the
//! next one, round after round) and seeded random transfers.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount};
use crate::ledger::LedgerSnapshot;
use crate::transfer::{LockStrategy, StatisticsSnapshot, TransferEngine, TransferRequest};
use crate::work_queue::WorkQueue;

/// Amounts paid along the ring, cycled when there are more than four hops
pub const RING_AMOUNTS: [Amount; 4] = [100, 50, 80, 30];

// ============================================================
// CONFIGURATION
// ============================================================

/// Which lock strategy each generated transfer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMix {
    Ordered,
    TryLock,
    /// Coin flip per transfer
    Mixed,
}

impl StrategyMix {
    fn pick(&self, rng: &mut impl Rng) -> LockStrategy {
        match self {
            StrategyMix::Ordered => LockStrategy::Ordered,
            StrategyMix::TryLock => LockStrategy::TryLock,
            StrategyMix::Mixed => {
                if rng.gen_bool(0.5) {
                    LockStrategy::Ordered
                } else {
                    LockStrategy::TryLock
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMix::Ordered => "ORDERED",
            StrategyMix::TryLock => "TRYLOCK",
            StrategyMix::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for StrategyMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub workers: usize,
    pub transfers_per_worker: usize,
    /// Inclusive amount range for random transfers
    pub min_amount: Amount,
    pub max_amount: Amount,
    pub strategy: StrategyMix,
    pub seed: u64,
    pub queue_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            transfers_per_worker: 5,
            min_amount: 10,
            max_amount: 109,
            strategy: StrategyMix::Mixed,
            seed: 42,
            queue_capacity: 64,
        }
    }
}

impl SimulationConfig {
    pub fn total_transfers(&self) -> usize {
        self.workers.saturating_mul(self.transfers_per_worker)
    }
}

// ============================================================
// WORKLOADS
// ============================================================

/// Seeded stream of random transfers between distinct accounts.
///
/// Yields nothing when fewer than two accounts are given.
pub struct RandomTransfers {
    rng: StdRng,
    accounts: Vec<AccountId>,
    min_amount: Amount,
    max_amount: Amount,
    strategy: StrategyMix,
    remaining: usize,
}

impl RandomTransfers {
    pub fn new(accounts: &[AccountId], config: &SimulationConfig) -> Self {
        let (min_amount, max_amount) = if config.min_amount <= config.max_amount {
            (config.min_amount, config.max_amount)
        } else {
            (config.max_amount, config.min_amount)
        };
        let remaining = if accounts.len() < 2 {
            0
        } else {
            config.total_transfers()
        };
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            accounts: accounts.to_vec(),
            min_amount,
            max_amount,
            strategy: config.strategy,
            remaining,
        }
    }
}

impl Iterator for RandomTransfers {
    type Item = TransferRequest;

    fn next(&mut self) -> Option<TransferRequest> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let n = self.accounts.len();
        let from_idx = self.rng.gen_range(0..n);
        // Skip over `from_idx` so the destination is always distinct
        let mut to_idx = self.rng.gen_range(0..n - 1);
        if to_idx >= from_idx {
            to_idx += 1;
        }
        let amount = self.rng.gen_range(self.min_amount..=self.max_amount);
        let strategy = self.strategy.pick(&mut self.rng);

        Some(TransferRequest::new(
            self.accounts[from_idx],
            self.accounts[to_idx],
            amount,
            strategy,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// `rounds` passes of `a[0] → a[1] → ... → a[n-1] → a[0]`, amounts from [`RING_AMOUNTS`].
pub fn ring_workload(
    accounts: &[AccountId],
    rounds: usize,
    strategy: LockStrategy,
) -> Vec<TransferRequest> {
    if accounts.len() < 2 {
        return Vec::new();
    }
    let hops = accounts.len();
    (0..rounds)
        .flat_map(|_| 0..hops)
        .map(|hop| {
            TransferRequest::new(
                accounts[hop],
                accounts[(hop + 1) % hops],
                RING_AMOUNTS[hop % RING_AMOUNTS.len()],
                strategy,
            )
        })
        .collect()
}

// ============================================================
// DRIVER
// ============================================================

/// Run `config.workers * config.transfers_per_worker` random transfers
/// between `accounts`.
pub fn run_simulation(
    engine: &TransferEngine,
    accounts: &[AccountId],
    config: &SimulationConfig,
) -> SimulationReport {
    let label = format!("random/{}", config.strategy);
    run_workload(
        engine,
        &label,
        RandomTransfers::new(accounts, config),
        config.workers,
        config.queue_capacity,
    )
}

/// Push every request through a [`WorkQueue`] of `queue_capacity` and
/// execute them on `workers` threads.
pub fn run_workload<I>(
    engine: &TransferEngine,
    label: &str,
    requests: I,
    workers: usize,
    queue_capacity: usize,
) -> SimulationReport
where
    I: IntoIterator<Item = TransferRequest>,
    I::IntoIter: Send,
{
    let workers = workers.max(1);
    let queue = WorkQueue::new(queue_capacity);
    let requests = requests.into_iter();

    let before = engine.ledger().snapshot();
    let stats_before = engine.statistics();
    tracing::info!(label, workers, queue_capacity = queue.capacity(), "Simulation started");
    let start = Instant::now();

    let (submitted, failures) = thread::scope(|s| {
        let queue = &queue;
        let producer = s.spawn(move || {
            let mut submitted = 0u64;
            for request in requests {
                if queue.push(request).is_err() {
                    break;
                }
                submitted += 1;
            }
            queue.close();
            submitted
        });

        let consumers: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut failures: FxHashMap<&'static str, u64> = FxHashMap::default();
                    while let Some(request) = queue.pop() {
                        let result = engine.transfer(
                            request.from,
                            request.to,
                            request.amount,
                            request.strategy,
                        );
                        if let Some(err) = result.reason() {
                            *failures.entry(err.code()).or_default() += 1;
                        }
                    }
                    failures
                })
            })
            .collect();

        let submitted = producer
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let mut failures: BTreeMap<&'static str, u64> = BTreeMap::new();
        for consumer in consumers {
            let local = consumer
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            for (code, count) in local {
                *failures.entry(code).or_default() += count;
            }
        }
        (submitted, failures)
    });

    let elapsed = start.elapsed();
    let after = engine.ledger().snapshot();
    let report = SimulationReport {
        label: label.to_string(),
        workers,
        submitted,
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        total_before: before.total(),
        total_after: after.total(),
        statistics: engine.statistics().since(&stats_before),
        failures,
        ledger: after,
    };

    if report.is_conserved() {
        tracing::info!(
            label,
            submitted,
            succeeded = report.statistics.succeeded,
            failed = report.statistics.failed,
            elapsed_ms = report.elapsed_ms,
            "Simulation finished"
        );
    } else {
        tracing::error!(
            label,
            total_before = report.total_before,
            total_after = report.total_after,
            "Simulation finished with total balance drift"
        );
    }
    report
}

// ============================================================
// REPORT
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub label: String,
    pub workers: usize,
    /// Requests handed to the queue
    pub submitted: u64,
    pub elapsed_ms: f64,
    /// Sums are u128 so ledgers whose total exceeds u64 still report exactly
    pub total_before: u128,
    pub total_after: u128,
    /// Statistics accumulated by this run only
    pub statistics: StatisticsSnapshot,
    /// Failure count per error code
    pub failures: BTreeMap<&'static str, u64>,
    pub ledger: LedgerSnapshot,
}

impl SimulationReport {
    pub fn is_conserved(&self) -> bool {
        self.total_before == self.total_after
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.label)?;
        writeln!(
            f,
            "workers={} submitted={} elapsed={:.2}ms",
            self.workers, self.submitted, self.elapsed_ms
        )?;
        writeln!(f, "{}", self.statistics)?;
        if !self.failures.is_empty() {
            let codes: Vec<String> = self
                .failures
                .iter()
                .map(|(code, count)| format!("{}={}", code, count))
                .collect();
            writeln!(f, "failures: {}", codes.join(", "))?;
        }
        writeln!(
            f,
            "total before={} after={} conserved={}",
            self.total_before,
            self.total_after,
            self.is_conserved()
        )?;
        write!(f, "{}", self.ledger)
    }
}
