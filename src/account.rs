//! Account - immutable identity plus an explicitly locked balance cell
//!
//! The account does NOT serialize its own operations. Callers acquire the
//! lock handle themselves, because a transfer must hold two accounts' locks
//! at once and the critical section is the transfer, not the single account.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::balance::Balance;
use crate::core_types::{AccountId, Amount};

/// Lock guard over an account's balance. Dropping it releases the lock.
pub type BalanceGuard<'a> = MutexGuard<'a, Balance>;

/// Account owned by the [`Ledger`](crate::ledger::Ledger).
///
/// # Invariants:
/// 1. `id` and `owner` never change after creation
/// 2. the balance is only reachable through the lock handle
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner: String,
    balance: Mutex<Balance>,
}

impl Account {
    pub fn new(id: AccountId, owner: impl Into<String>, initial_balance: Amount) -> Self {
        Self {
            id,
            owner: owner.into(),
            balance: Mutex::new(Balance::new(initial_balance)),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[inline(always)]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Diagnostic read of the current balance.
    ///
    /// Takes the lock for the duration of the load, so the value is never torn,
    /// but it may already be stale when the caller looks at it.
    pub fn balance(&self) -> Amount {
        self.balance.lock().amount()
    }

    /// Block until the lock is held.
    pub fn lock(&self) -> BalanceGuard<'_> {
        self.balance.lock()
    }

    /// Non-blocking attempt; `None` if another thread holds the lock.
    pub fn try_lock(&self) -> Option<BalanceGuard<'_>> {
        self.balance.try_lock()
    }

    /// Block for at most `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<BalanceGuard<'_>> {
        self.balance.try_lock_for(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_immutable() {
        let account = Account::new(7, "Alice", 1000);
        assert_eq!(account.id(), 7);
        assert_eq!(account.owner(), "Alice");
        assert_eq!(account.balance(), 1000);
    }

    #[test]
    fn test_mutation_through_guard() {
        let account = Account::new(1, "Bob", 100);
        {
            let mut guard = account.lock();
            assert!(guard.debit(40));
            guard.credit(5).unwrap();
        }
        assert_eq!(account.balance(), 65);
        assert_eq!(account.lock().version(), 2);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let account = Account::new(1, "Carol", 10);
        let guard = account.lock();
        assert!(account.try_lock().is_none());
        assert!(account.try_lock_for(Duration::from_millis(5)).is_none());
        drop(guard);
        assert!(account.try_lock().is_some());
    }
}
