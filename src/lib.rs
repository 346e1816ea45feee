//! Transfer Ledger - concurrent account transfers without deadlock
//!
//! An in-memory ledger of accounts where many threads move value between
//! pairs of accounts at once. Total value is conserved, no balance goes
//! negative, and no transfer is observed half-applied.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, Amount, etc.)
//! - [`balance`] - Versioned balance with checked debit/credit
//! - [`account`] - Account with its own balance lock
//! - [`error`] - Ledger error codes
//! - [`ledger`] - Concurrent account registry and snapshots
//! - [`transfer`] - Transfer engine, lock strategies, backoff, statistics
//! - [`work_queue`] - Bounded blocking producer/consumer queue
//! - [`simulation`] - Multi-threaded workload driver and reports
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing setup

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod balance;
pub mod error;
pub mod ledger;
pub mod transfer;

// Driver
pub mod simulation;
pub mod work_queue;

// Ambient
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use account::Account;
pub use balance::Balance;
pub use core_types::{AccountId, Amount, TransactionId};
pub use error::LedgerError;
pub use ledger::{AccountSnapshot, Ledger, LedgerSnapshot};
pub use simulation::{SimulationConfig, SimulationReport, StrategyMix};
pub use transfer::{
    BackoffClock, BackoffKind, BackoffPolicy, CancelToken, EngineConfig, LockStrategy,
    StatisticsSnapshot, SystemClock, TransferEngine, TransferPhase, TransferReceipt,
    TransferRequest, TransferResult,
};
pub use work_queue::WorkQueue;
