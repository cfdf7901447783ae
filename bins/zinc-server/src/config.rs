//! Server configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use zinc_core::address::Network;
use zinc_core::constants::{DEFAULT_BRANCH_ID, DEFAULT_FEE_RATE, parse_branch_id};
use zinc_providers::{DEFAULT_PROVIDER_TIMEOUT, ProviderSpec};
use zinc_service::{ReconcileConfig, ServiceConfig};
use zinc_wallet::KeyDerivation;

#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP server.
    pub bind_addr: String,
    /// Root directory for the transaction database.
    pub data_dir: PathBuf,
    pub network: Network,
    /// Ordered provider list.
    pub providers: Vec<ProviderSpec>,
    /// Zatoshis per estimated byte.
    pub fee_rate: u64,
    /// Consensus branch id signatures commit to.
    pub branch_id: u32,
    pub provider_timeout: Duration,
    pub reconcile_interval: Duration,
    /// Server secret for hardened key derivation.
    pub key_salt: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// `text` or `json`.
    pub log_format: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = var("ZINC_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let data_dir = var("ZINC_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("zinc")
        });

        let network: Network = match var("ZINC_NETWORK") {
            Some(s) => s
                .parse()
                .map_err(anyhow::Error::msg)
                .context("ZINC_NETWORK must be mainnet or testnet")?,
            None => Network::Mainnet,
        };

        let providers = ProviderSpec::parse_list(&var("ZINC_PROVIDERS").unwrap_or_default())
            .context("ZINC_PROVIDERS must be a comma-separated list of kind=url")?;

        let fee_rate: u64 = match var("ZINC_FEE_RATE") {
            Some(s) => s
                .parse()
                .context("ZINC_FEE_RATE must be a non-negative integer")?,
            None => DEFAULT_FEE_RATE,
        };

        let branch_id = match var("ZINC_BRANCH_ID") {
            Some(s) => parse_branch_id(&s)
                .context("ZINC_BRANCH_ID must be a 32-bit hex value such as 0x4dec4df0")?,
            None => DEFAULT_BRANCH_ID,
        };

        let provider_timeout = match var("ZINC_PROVIDER_TIMEOUT_SECS") {
            Some(s) => {
                let secs: u64 = s
                    .parse()
                    .context("ZINC_PROVIDER_TIMEOUT_SECS must be a positive integer")?;
                anyhow::ensure!(secs > 0, "ZINC_PROVIDER_TIMEOUT_SECS must be a positive integer");
                Duration::from_secs(secs)
            }
            None => DEFAULT_PROVIDER_TIMEOUT,
        };

        let reconcile_interval = match var("ZINC_RECONCILE_INTERVAL_SECS") {
            Some(s) => {
                let secs: u64 = s
                    .parse()
                    .context("ZINC_RECONCILE_INTERVAL_SECS must be a positive integer")?;
                anyhow::ensure!(secs > 0, "ZINC_RECONCILE_INTERVAL_SECS must be a positive integer");
                Duration::from_secs(secs)
            }
            None => ReconcileConfig::default().interval,
        };

        let key_salt = var("ZINC_KEY_SALT").filter(|s| !s.is_empty());
        let log_level = var("ZINC_LOG").unwrap_or_else(|| "info".to_string());
        let log_format = var("ZINC_LOG_FORMAT").unwrap_or_else(|| "text".to_string());

        Ok(Config {
            bind_addr,
            data_dir,
            network,
            providers,
            fee_rate,
            branch_id,
            provider_timeout,
            reconcile_interval,
            key_salt,
            log_level,
            log_format,
        })
    }

    pub fn service_config(&self) -> ServiceConfig {
        let key_derivation = match &self.key_salt {
            Some(salt) => KeyDerivation::salted(salt.as_bytes().to_vec()),
            None => KeyDerivation::legacy(),
        };
        ServiceConfig {
            data_dir: self.data_dir.clone(),
            network: self.network,
            fee_rate: self.fee_rate,
            branch_id: self.branch_id,
            providers: self.providers.clone(),
            provider_timeout: self.provider_timeout,
            reconcile: ReconcileConfig {
                interval: self.reconcile_interval,
                ..ReconcileConfig::default()
            },
            key_derivation,
            ..ServiceConfig::default()
        }
    }
}
