//! # zinc-wallet: keys, coin selection, and transaction building.
//!
//! Turns an account seed into signing keys and addresses, picks UTXOs to
//! cover a payment plus fee, and assembles and signs transparent v4
//! transactions.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`keys`]: seed-to-key derivation, WIF export
//! - [`fee`]: size-based fee estimation
//! - [`coin_selection`]: greedy in-order UTXO selection with a dust policy
//! - [`builder`]: transaction assembly and signing

pub mod builder;
pub mod coin_selection;
pub mod error;
pub mod fee;
pub mod keys;

// Re-exports for convenient access
pub use builder::{Recipient, SignedTransaction, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use error::WalletError;
pub use fee::FeeEstimator;
pub use keys::{KeyDerivation, WalletAddresses};
