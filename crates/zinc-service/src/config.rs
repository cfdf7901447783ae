//! Service configuration.
//!
//! [`ServiceConfig`] carries defaults for the data directory, network, fee
//! rate, provider list and timeout, reconciler cadence, and key-derivation
//! mode. Binaries fill it from their own sources (environment, flags).

use std::path::PathBuf;
use std::time::Duration;

use zinc_core::address::Network;
use zinc_core::constants::{DEFAULT_BRANCH_ID, DEFAULT_FEE_RATE};
use zinc_providers::{DEFAULT_PROVIDER_TIMEOUT, ProviderSpec};
use zinc_wallet::KeyDerivation;

/// Confirmation reconciler cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Records younger than this are left alone.
    pub grace: Duration,
    /// Pending records older than this with no successful lookup are failed.
    pub stale_after: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            grace: Duration::from_secs(60),
            stale_after: Duration::from_secs(3_600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory for persistent data.
    pub data_dir: PathBuf,
    pub network: Network,
    /// Zatoshis per estimated byte.
    pub fee_rate: u64,
    /// Consensus branch id committed to by signatures.
    pub branch_id: u32,
    /// Ordered provider list; order is fallback order.
    pub providers: Vec<ProviderSpec>,
    /// Bound on every individual provider call.
    pub provider_timeout: Duration,
    pub reconcile: ReconcileConfig,
    pub key_derivation: KeyDerivation,
    /// Attempts to persist a record after a successful broadcast.
    pub persist_attempts: u32,
    /// Base delay between persistence attempts; grows linearly.
    pub persist_backoff: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zinc");

        Self {
            data_dir,
            network: Network::Mainnet,
            fee_rate: DEFAULT_FEE_RATE,
            branch_id: DEFAULT_BRANCH_ID,
            providers: Vec::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            reconcile: ReconcileConfig::default(),
            key_derivation: KeyDerivation::legacy(),
            persist_attempts: 3,
            persist_backoff: Duration::from_millis(500),
        }
    }
}

impl ServiceConfig {
    /// Path to the RocksDB transaction database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(self.network.to_string()).join("txdb")
    }
}
