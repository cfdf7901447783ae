//! Ordered provider fallback.
//!
//! Providers are tried strictly in configuration order and every call is
//! bounded by a fixed timeout. A timeout is treated like any other provider
//! failure and moves on to the next provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use zinc_core::address::Address;
use zinc_core::error::{BroadcastError, ProviderError};
use zinc_core::traits::{ChainProvider, TxLookup, UtxoProvider};
use zinc_core::types::{Hash256, Utxo};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout.as_secs())),
    }
}

/// UTXO listing and broadcast across an ordered list of providers.
#[derive(Clone)]
pub struct UtxoSource {
    providers: Vec<Arc<dyn UtxoProvider>>,
    timeout: Duration,
}

impl UtxoSource {
    pub fn new(providers: Vec<Arc<dyn UtxoProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Unspent outputs for `address`.
    ///
    /// The first provider returning a non-empty, well-formed list wins. Errors,
    /// timeouts and empty lists move on to the next provider. When every
    /// provider is exhausted the result is an empty list, never an error.
    pub async fn fetch_utxos(&self, address: &Address) -> Vec<Utxo> {
        for provider in &self.providers {
            match bounded(self.timeout, provider.fetch_utxos(address)).await {
                Ok(utxos) if !utxos.is_empty() => {
                    debug!(provider = provider.name(), %address, count = utxos.len(), "utxo source hit");
                    return utxos;
                }
                Ok(_) => {
                    debug!(provider = provider.name(), %address, "no utxos, trying next provider");
                }
                Err(e) => {
                    warn!(provider = provider.name(), %address, error = %e, "utxo fetch failed, trying next provider");
                }
            }
        }
        Vec::new()
    }

    /// Total value and count of the unspent outputs for `address`.
    pub async fn balance(&self, address: &Address) -> (u64, usize) {
        let utxos = self.fetch_utxos(address).await;
        let total = utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.value));
        (total, utxos.len())
    }

    /// Relay a signed transaction. The first provider reporting a txid wins.
    ///
    /// On total failure the error carries the last provider's message and is
    /// `Rejected` only when that provider explicitly refused the transaction.
    pub async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, BroadcastError> {
        let mut last: Option<(String, ProviderError)> = None;

        for provider in &self.providers {
            match bounded(self.timeout, provider.broadcast(raw_tx)).await {
                Ok(txid) => {
                    info!(provider = provider.name(), %txid, "transaction broadcast");
                    return Ok(txid);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "broadcast failed, trying next provider");
                    last = Some((provider.name().to_string(), e));
                }
            }
        }

        match last {
            None => Err(BroadcastError::NoProviders),
            Some((provider, ProviderError::Rejected(message))) => {
                Err(BroadcastError::Rejected { provider, message })
            }
            Some((provider, e)) => Err(BroadcastError::Unavailable {
                provider,
                message: e.to_string(),
            }),
        }
    }
}

/// Chain height and transaction lookups across an ordered list of providers.
#[derive(Clone)]
pub struct ChainSource {
    providers: Vec<Arc<dyn ChainProvider>>,
    timeout: Duration,
}

impl ChainSource {
    pub fn new(providers: Vec<Arc<dyn ChainProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Best block height from the first provider that answers.
    pub async fn chain_height(&self) -> Result<u64, ProviderError> {
        let mut last = ProviderError::Unsupported("no chain providers configured");
        for provider in &self.providers {
            match bounded(self.timeout, provider.chain_height()).await {
                Ok(height) => return Ok(height),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "chain height query failed");
                    last = e;
                }
            }
        }
        Err(last)
    }

    /// Locate a transaction.
    ///
    /// `Mined` from any provider wins at once. Otherwise all providers are
    /// asked: `Mempool` beats `NotFound`, and an error is returned only if no
    /// provider answered at all.
    pub async fn lookup(&self, txid: &Hash256) -> Result<TxLookup, ProviderError> {
        let mut best: Option<TxLookup> = None;
        let mut last = ProviderError::Unsupported("no chain providers configured");

        for provider in &self.providers {
            match bounded(self.timeout, provider.lookup_transaction(txid)).await {
                Ok(found @ TxLookup::Mined { .. }) => return Ok(found),
                Ok(TxLookup::Mempool) => best = Some(TxLookup::Mempool),
                Ok(TxLookup::NotFound) => {
                    best.get_or_insert(TxLookup::NotFound);
                }
                Err(e) => {
                    debug!(provider = provider.name(), %txid, error = %e, "transaction lookup failed");
                    last = e;
                }
            }
        }

        best.ok_or(last)
    }
}
