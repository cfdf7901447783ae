//! # zinc-service: wallet orchestration, storage, and confirmation tracking.
//!
//! - [`service::WalletService`]: address generation, balances, sends, and
//!   signed-transaction submission over the provider sources
//! - [`storage`]: [`storage::RocksTxStore`] and [`storage::MemoryTxStore`]
//!   implementations of `TransactionStore`
//! - [`reconciler::ConfirmationReconciler`]: periodic pending → confirmed /
//!   failed transitions
//! - [`config::ServiceConfig`]: service configuration

pub mod config;
pub mod reconciler;
pub mod service;
pub mod storage;

pub use config::{ReconcileConfig, ServiceConfig};
pub use reconciler::{ConfirmationReconciler, ReconcileReport};
pub use service::{
    AmountInput, Balance, ExportedKey, EXPORT_CONFIRMATION, SendReceipt, SendRequest,
    SpendableOutput, SubmitReceipt, SubmitRequest, WalletService,
};
pub use storage::{MemoryTxStore, RocksTxStore};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
