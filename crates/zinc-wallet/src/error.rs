//! Wallet error types.

use thiserror::Error;
use zinc_core::error::{
    AddressError, AmountError, BroadcastError, CryptoError, StoreError, TransactionError,
};

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed or unchecksummed address.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Insufficient funds to cover the amount plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Available value in zatoshis.
        have: u64,
        /// Required value in zatoshis.
        need: u64,
    },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Every provider failed for an operation.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A provider explicitly refused the transaction.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Signing could not complete. Nothing was broadcast.
    #[error("signing failure: {0}")]
    SigningFailure(#[from] CryptoError),

    /// Structurally invalid transaction.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<AmountError> for WalletError {
    fn from(e: AmountError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

impl From<BroadcastError> for WalletError {
    fn from(e: BroadcastError) -> Self {
        match e {
            BroadcastError::Rejected { .. } => WalletError::BroadcastRejected(e.to_string()),
            BroadcastError::Unavailable { .. } | BroadcastError::NoProviders => {
                WalletError::ProviderUnavailable(e.to_string())
            }
        }
    }
}
