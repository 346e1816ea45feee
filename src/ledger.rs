//! Ledger - id-keyed collection of accounts
//!
//! Owns account lifecycle. The map is append-only: accounts are created
//! during setup and never removed.
//!
//! # Locking
//!
//! The account map (`DashMap`) is guarded independently of the account
//! balances. Lookups clone the `Arc<Account>` out of the map, so no shard
//! guard is ever held while a transfer holds an account lock.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use crate::account::{Account, BalanceGuard};
use crate::core_types::{AccountId, Amount};
use crate::error::LedgerError;

#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<AccountId, Arc<Account>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Open a new account.
    ///
    /// # Errors
    /// - `DuplicateAccount` if `id` is already present (checked atomically with the insert)
    pub fn create_account(
        &self,
        id: AccountId,
        owner: impl Into<String>,
        initial_balance: Amount,
    ) -> Result<Arc<Account>, LedgerError> {
        match self.accounts.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateAccount(id)),
            Entry::Vacant(slot) => {
                let account = Arc::new(Account::new(id, owner, initial_balance));
                slot.insert(Arc::clone(&account));
                tracing::debug!(
                    account_id = id,
                    owner = account.owner(),
                    initial_balance,
                    "Account created"
                );
                Ok(account)
            }
        }
    }

    pub fn get_account(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn get_balance(&self, id: AccountId) -> Result<Amount, LedgerError> {
        Ok(self.get_account(id)?.balance())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// All account ids in lock order (ascending)
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Sum of all balances, read under every account lock at once.
    ///
    /// Returns `None` on overflow (indicates corruption).
    pub fn total_balance(&self) -> Option<Amount> {
        self.with_all_locked(|locked| {
            locked
                .iter()
                .try_fold(0u64, |sum, (_, guard)| sum.checked_add(guard.amount()))
        })
    }

    /// Consistent point-in-time view of every account.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let accounts = self.with_all_locked(|locked| {
            locked
                .iter()
                .map(|(account, guard)| AccountSnapshot {
                    id: account.id(),
                    owner: account.owner().to_string(),
                    balance: guard.amount(),
                    version: guard.version(),
                })
                .collect()
        });
        LedgerSnapshot { accounts }
    }

    /// Lock every account in ascending id order, the same global order
    /// ordered transfers use, and run `f` while all locks are held.
    fn with_all_locked<R>(&self, f: impl FnOnce(&[(Arc<Account>, BalanceGuard<'_>)]) -> R) -> R {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_unstable_by_key(|account| account.id());

        let locked: Vec<(Arc<Account>, BalanceGuard<'_>)> = accounts
            .iter()
            .map(|account| (Arc::clone(account), account.lock()))
            .collect();
        f(&locked)
    }
}

/// One account's state inside a [`LedgerSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub owner: String,
    pub balance: Amount,
    pub version: u64,
}

/// Point-in-time view of the whole ledger, sorted by account id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub accounts: Vec<AccountSnapshot>,
}

impl LedgerSnapshot {
    /// Exact sum of all balances; widened so any set of u64 balances fits
    pub fn total(&self) -> u128 {
        self.accounts.iter().map(|a| u128::from(a.balance)).sum()
    }

    pub fn balance_of(&self, id: AccountId) -> Option<Amount> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.balance)
    }
}

impl fmt::Display for LedgerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "accounts={}", self.accounts.len())?;
        for account in &self.accounts {
            writeln!(
                f,
                "  account {} ({}): balance={} version={}",
                account.id, account.owner, account.balance, account.version
            )?;
        }
        write!(f, "total={}", self.total())
    }
}
