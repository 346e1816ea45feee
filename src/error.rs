//! Ledger Error Types
//!
//! Every failure a ledger or transfer operation can surface. None of them
//! leaves an account locked or partially mutated.

use thiserror::Error;

use crate::core_types::{AccountId, Amount};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    DuplicateAccount(AccountId),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: Amount, requested: Amount },

    #[error("Credit would overflow balance of account {0}")]
    BalanceOverflow(AccountId),

    // === Concurrency Errors ===
    #[error("Transfer cancelled while waiting")]
    Cancelled,

    #[error("Could not acquire both account locks after {attempts} attempts")]
    LockAcquisitionExhausted { attempts: u32 },
}

impl LedgerError {
    /// Stable error code for reports and logs
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            LedgerError::Cancelled => "CANCELLED",
            LedgerError::LockAcquisitionExhausted { .. } => "LOCK_ACQUISITION_EXHAUSTED",
        }
    }

    /// Whether re-issuing the same request may succeed without any other
    /// change to the ledger.
    ///
    /// Insufficient funds is a business outcome: it may succeed later, but only
    /// once balances change, so it is not counted as retryable here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Cancelled | LedgerError::LockAcquisitionExhausted { .. }
        )
    }
}
