/// ENFORCED BALANCE CELL - guarded by its account's lock
///
/// This is the SINGLE source of truth for an account's value.
/// ALL balance mutations MUST go through these methods, and the only way
/// to obtain `&mut Balance` is through the owning account's lock guard.
///
/// # Enforcement Strategy:
/// 1. Fields are PRIVATE - no direct access
/// 2. debit/credit never leave a partial mutation behind
/// 3. Version auto-increments - per-account linear history
/// 4. checked_add/sub - overflow protection
use serde::{Deserialize, Serialize};

use crate::core_types::Amount;

/// Balance of a single account
///
/// # Invariants (ENFORCED by private fields):
/// - amount is never negative (unsigned + checked debit)
/// - version increments exactly once per successful mutation
/// - failed operations leave both fields untouched
///
/// # Usage:
/// ```ignore
/// let mut balance = Balance::new(1000);
/// assert!(balance.debit(300));        // amount = 700, version = 1
/// balance.credit(50)?;                // amount = 750, version = 2
/// assert!(!balance.debit(10_000));    // unchanged
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    amount: Amount, // PRIVATE - ONLY modified through debit/credit
    version: u64,   // PRIVATE - incremented on every applied debit/credit
}

impl Balance {
    /// Opening balance. Version starts at 0: bootstrapping is not a mutation.
    pub const fn new(amount: Amount) -> Self {
        Self { amount, version: 0 }
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    #[inline(always)]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// Number of mutations applied since the account was opened
    #[inline(always)]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[inline(always)]
    pub const fn can_debit(&self, amount: Amount) -> bool {
        self.amount >= amount
    }

    #[inline(always)]
    pub const fn can_credit(&self, amount: Amount) -> bool {
        self.amount.checked_add(amount).is_some()
    }

    // ============================================================
    // VALIDATED MUTATIONS
    // ============================================================

    /// Decrease the balance by `amount`.
    ///
    /// Returns `false` and leaves the balance untouched when funds are insufficient.
    pub fn debit(&mut self, amount: Amount) -> bool {
        match self.amount.checked_sub(amount) {
            Some(rest) => {
                self.amount = rest;
                self.version = self.version.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    /// Increase the balance by `amount`.
    ///
    /// # Errors
    /// - "Credit overflow" if the result does not fit; the balance is untouched
    pub fn credit(&mut self, amount: Amount) -> Result<(), &'static str> {
        self.amount = self.amount.checked_add(amount).ok_or("Credit overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}

// ============================================================
// TESTS - Prove enforcement works
// ============================================================
