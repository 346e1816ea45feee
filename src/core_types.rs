//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.

/// Account ID - globally unique, immutable after assignment.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Totally ordered**: natural integer order is the global lock order
pub type AccountId = u64;

/// Transaction ID - assigned atomically at the start of every transfer attempt
pub type TransactionId = u64;

/// Amount in integer minor units (no fractional arithmetic anywhere)
pub type Amount = u64;
