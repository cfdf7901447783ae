//! Shared helpers for the scenario tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use zinc_core::address::{Address, AddressKind, Network};
use zinc_core::error::ProviderError;
use zinc_core::traits::{ChainProvider, TransactionStore, TxLookup, UtxoProvider};
use zinc_core::types::{Hash256, Transaction, Utxo};
use zinc_providers::{ChainSource, UtxoSource};
use zinc_service::{ServiceConfig, WalletService};

/// How a scripted provider answers one kind of request.
#[derive(Clone, Debug)]
pub enum Reply<T> {
    Ok(T),
    Fail(ProviderError),
    /// Never completes; only a timeout ends the call.
    Hang,
}

/// Provider whose answers are fixed by the test.
///
/// UTXO values are served as distinct outpoints (`txid = [i + 1; 32]`,
/// `vout = i`) owned by whichever address is queried. Broadcasts are decoded
/// and answered with their real txid unless scripted otherwise.
pub struct ScriptedProvider {
    name: String,
    utxos: Mutex<Reply<Vec<u64>>>,
    broadcast: Mutex<Reply<()>>,
    height: Mutex<Reply<u64>>,
    lookups: Mutex<HashMap<Hash256, Reply<TxLookup>>>,
    broadcast_delay: Mutex<Duration>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    utxo_calls: AtomicUsize,
    utxo_call_times: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            utxos: Mutex::new(Reply::Ok(Vec::new())),
            broadcast: Mutex::new(Reply::Ok(())),
            height: Mutex::new(Reply::Ok(1)),
            lookups: Mutex::new(HashMap::new()),
            broadcast_delay: Mutex::new(Duration::ZERO),
            broadcasts: Mutex::new(Vec::new()),
            utxo_calls: AtomicUsize::new(0),
            utxo_call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn with_utxos(self, values: &[u64]) -> Self {
        *self.utxos.lock() = Reply::Ok(values.to_vec());
        self
    }

    pub fn failing_utxos(self, err: ProviderError) -> Self {
        *self.utxos.lock() = Reply::Fail(err);
        self
    }

    pub fn hanging_utxos(self) -> Self {
        *self.utxos.lock() = Reply::Hang;
        self
    }

    pub fn with_broadcast(self, reply: Reply<()>) -> Self {
        *self.broadcast.lock() = reply;
        self
    }

    /// Accept broadcasts only after `delay`.
    pub fn with_broadcast_delay(self, delay: Duration) -> Self {
        *self.broadcast_delay.lock() = delay;
        self
    }

    pub fn with_height(self, reply: Reply<u64>) -> Self {
        *self.height.lock() = reply;
        self
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock() = Reply::Ok(height);
    }

    pub fn set_lookup(&self, txid: Hash256, reply: Reply<TxLookup>) {
        self.lookups.lock().insert(txid, reply);
    }

    /// Raw transactions this provider accepted, in order.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().clone()
    }

    pub fn utxo_calls(&self) -> usize {
        self.utxo_calls.load(Ordering::SeqCst)
    }

    /// When each UTXO query arrived.
    pub fn utxo_call_times(&self) -> Vec<Instant> {
        self.utxo_call_times.lock().clone()
    }
}

async fn answer<T: Clone>(reply: Reply<T>) -> Result<T, ProviderError> {
    match reply {
        Reply::Ok(v) => Ok(v),
        Reply::Fail(e) => Err(e),
        Reply::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl UtxoProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        self.utxo_call_times.lock().push(Instant::now());
        let reply = self.utxos.lock().clone();
        let values = answer(reply).await?;
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, value)| Utxo {
                txid: Hash256([i as u8 + 1; 32]),
                output_index: i as u32,
                value: *value,
                address: *address,
            })
            .collect())
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError> {
        let delay = *self.broadcast_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = self.broadcast.lock().clone();
        answer(reply).await?;
        let tx = Transaction::decode(raw_tx).map_err(|e| ProviderError::Rejected(e.to_string()))?;
        self.broadcasts.lock().push(raw_tx.to_vec());
        Ok(tx.txid())
    }
}

#[async_trait]
impl ChainProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_height(&self) -> Result<u64, ProviderError> {
        let reply = self.height.lock().clone();
        answer(reply).await
    }

    async fn lookup_transaction(&self, txid: &Hash256) -> Result<TxLookup, ProviderError> {
        let reply = self
            .lookups
            .lock()
            .get(txid)
            .cloned()
            .unwrap_or(Reply::Ok(TxLookup::NotFound));
        answer(reply).await
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(15);

/// UTXO and chain sources over the same providers, in order.
pub fn sources(providers: &[Arc<ScriptedProvider>]) -> (UtxoSource, ChainSource) {
    let utxo = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn UtxoProvider>)
        .collect();
    let chain = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn ChainProvider>)
        .collect();
    (UtxoSource::new(utxo, TIMEOUT), ChainSource::new(chain, TIMEOUT))
}

/// Mainnet service with a short persistence backoff.
pub fn service(
    providers: &[Arc<ScriptedProvider>],
    store: Arc<dyn TransactionStore>,
    fee_rate: u64,
) -> WalletService {
    let config = ServiceConfig {
        fee_rate,
        persist_backoff: Duration::from_millis(1),
        ..ServiceConfig::default()
    };
    let (utxos, chain) = sources(providers);
    WalletService::new(&config, utxos, chain, store)
}

/// A mainnet P2PKH address no test key owns.
pub fn recipient() -> Address {
    Address::new(AddressKind::P2pkh, Network::Mainnet, [0x77; 20])
}
