//! Wallet operations exposed to the HTTP and CLI front ends.
//!
//! A send runs strictly in sequence: validate, derive, fetch UTXOs, select,
//! build and sign, broadcast, record. Any failure before broadcast leaves no
//! external side effect. Once the network has accepted a transaction the
//! caller always gets the txid back; persistence problems after that point
//! are logged and retried, never surfaced.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use zinc_core::address::{Address, Network};
use zinc_core::amount::parse_coins;
use zinc_core::constants::{MAX_MONEY, MIN_SEND_AMOUNT};
use zinc_core::error::{AddressError, StoreError, TransactionError};
use zinc_core::traits::{TransactionStore, TxLookup};
use zinc_core::types::{
    Direction, Hash256, NewTransactionRecord, Transaction, TransactionRecord, TxStatus, Utxo,
};
use zinc_providers::{ChainSource, UtxoSource};
use zinc_wallet::keys::{address_for, addresses_for, export_wif};
use zinc_wallet::{CoinSelector, KeyDerivation, TransactionBuilder, WalletAddresses, WalletError};

use crate::config::ServiceConfig;
use crate::unix_now;

/// Phrase a caller must echo back before a private key is exported.
pub const EXPORT_CONFIRMATION: &str = "I_UNDERSTAND_THIS_IS_MY_PRIVATE_KEY";

/// An amount given either in zatoshis or as a decimal coin string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Zatoshis(u64),
    Coins(String),
}

impl AmountInput {
    /// Decimal strings are truncated to 8 places.
    pub fn to_zatoshis(&self) -> Result<u64, WalletError> {
        match self {
            Self::Zatoshis(z) => Ok(*z),
            Self::Coins(s) => Ok(parse_coins(s)?),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub user: String,
    /// Account identifier the spending key is derived from.
    pub seed: String,
    pub to_address: String,
    pub amount: AmountInput,
    #[serde(default)]
    pub memo: Option<String>,
}

/// A caller-supplied output to spend. Ownership is attributed to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendableOutput {
    pub txid: Hash256,
    pub vout: u32,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub txid: Hash256,
    pub fee: u64,
    pub change: Option<u64>,
    /// Absent when the record could not be persisted.
    pub record_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user: String,
    pub raw_tx_hex: String,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub txid: Hash256,
    pub record_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub address: String,
    pub balance: u64,
    pub utxo_count: usize,
}

pub struct ExportedKey {
    pub wif: Zeroizing<String>,
    pub address: String,
}

type SendLocks = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive use of one sender address for the duration of a send.
///
/// The map entry is removed when the last holder or waiter lets go, so the
/// map only ever holds addresses with a send in flight.
struct SendSlot<'a> {
    locks: &'a SendLocks,
    address: String,
    lock: Option<Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> SendSlot<'a> {
    async fn acquire(locks: &'a SendLocks, address: String) -> SendSlot<'a> {
        let lock = locks.entry(address.clone()).or_default().clone();
        let mut slot = SendSlot {
            locks,
            address,
            lock: Some(lock.clone()),
            guard: None,
        };
        slot.guard = Some(lock.lock_owned().await);
        slot
    }
}

impl Drop for SendSlot<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.lock.take();
        self.locks
            .remove_if(&self.address, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct WalletService {
    network: Network,
    fee_rate: u64,
    derivation: KeyDerivation,
    builder: TransactionBuilder,
    utxos: UtxoSource,
    chain: ChainSource,
    store: Arc<dyn TransactionStore>,
    /// One lock per sender address around fetch → select → sign → broadcast.
    send_locks: SendLocks,
    persist_attempts: u32,
    persist_backoff: Duration,
}

impl WalletService {
    pub fn new(
        config: &ServiceConfig,
        utxos: UtxoSource,
        chain: ChainSource,
        store: Arc<dyn TransactionStore>,
    ) -> Self {
        if !config.key_derivation.is_hardened() {
            warn!(
                "keys are derived from account identifiers alone; \
                 set a key salt to stop identifiers from revealing spending keys"
            );
        }
        if utxos.is_empty() {
            warn!("no UTXO providers configured; balances will read as zero and sends will fail");
        }

        let mut builder = TransactionBuilder::new();
        builder.set_branch_id(config.branch_id);

        Self {
            network: config.network,
            fee_rate: config.fee_rate,
            derivation: config.key_derivation.clone(),
            builder,
            utxos,
            chain,
            store,
            send_locks: DashMap::new(),
            persist_attempts: config.persist_attempts.max(1),
            persist_backoff: config.persist_backoff,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Decode an address and require it to belong to this service's network.
    pub fn parse_address(&self, s: &str) -> Result<Address, WalletError> {
        let address = Address::decode(s.trim())?;
        if address.network() != self.network {
            return Err(AddressError::WrongNetwork.into());
        }
        Ok(address)
    }

    /// P2PKH and TEX addresses for the key derived from `seed`.
    pub fn generate_addresses(&self, seed: &str) -> WalletAddresses {
        let key = self.derivation.derive(seed);
        addresses_for(&key, self.network)
    }

    /// Sum of unspent outputs. A TEX address is queried in its P2PKH form.
    pub async fn balance(&self, address: &str) -> Result<Balance, WalletError> {
        let parsed = self.parse_address(address)?;
        let query = parsed.to_p2pkh().unwrap_or(parsed);
        let (balance, utxo_count) = self.utxos.balance(&query).await;
        Ok(Balance {
            address: address.trim().to_string(),
            balance,
            utxo_count,
        })
    }

    pub async fn chain_height(&self) -> Result<u64, WalletError> {
        self.chain
            .chain_height()
            .await
            .map_err(|e| WalletError::ProviderUnavailable(e.to_string()))
    }

    /// Relay a transaction signed elsewhere and record it as pending.
    pub async fn submit_signed(&self, req: SubmitRequest) -> Result<SubmitReceipt, WalletError> {
        let raw = hex::decode(req.raw_tx_hex.trim())
            .map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        let tx = Transaction::decode(&raw)?;
        let txid = tx.txid();

        let amount = match &req.amount {
            Some(a) => a.to_zatoshis()?,
            None => tx.total_output_value().ok_or(TransactionError::ValueOverflow)?,
        };
        if let Some(to) = &req.to_address {
            self.parse_address(to)?;
        }

        let reported = self.utxos.broadcast(&raw).await?;
        if reported != txid {
            warn!(%txid, %reported, "provider reported a different txid");
        }

        let record = self
            .persist(NewTransactionRecord {
                user: req.user,
                txid,
                direction: Direction::Outgoing,
                amount,
                to_address: req.to_address,
                memo: req.memo,
                status: TxStatus::Pending,
                submitted_at: unix_now(),
            })
            .await;

        Ok(SubmitReceipt {
            txid,
            record_id: record.map(|r| r.id),
        })
    }

    /// Send using UTXOs fetched from the providers.
    pub async fn send(&self, req: SendRequest) -> Result<SendReceipt, WalletError> {
        self.send_inner(req, None).await
    }

    /// Send using caller-supplied outputs, attributed to the sender's address.
    pub async fn send_with_utxos(
        &self,
        req: SendRequest,
        outputs: Vec<SpendableOutput>,
    ) -> Result<SendReceipt, WalletError> {
        self.send_inner(req, Some(outputs)).await
    }

    async fn send_inner(
        &self,
        req: SendRequest,
        outputs: Option<Vec<SpendableOutput>>,
    ) -> Result<SendReceipt, WalletError> {
        let amount = req.amount.to_zatoshis()?;
        if amount < MIN_SEND_AMOUNT {
            return Err(WalletError::InvalidAmount(format!(
                "{amount} is below the minimum of {MIN_SEND_AMOUNT} zatoshis"
            )));
        }
        if amount > MAX_MONEY {
            return Err(WalletError::InvalidAmount(format!("{amount} exceeds the maximum money supply")));
        }
        let to = self.parse_address(&req.to_address)?;

        let key = self.derivation.derive(&req.seed);
        let from = address_for(&key, self.network);

        let _slot = SendSlot::acquire(&self.send_locks, from.encode()).await;

        let utxos: Vec<Utxo> = match outputs {
            Some(outputs) => outputs
                .into_iter()
                .map(|o| Utxo {
                    txid: o.txid,
                    output_index: o.vout,
                    value: o.value,
                    address: from,
                })
                .collect(),
            None => self.utxos.fetch_utxos(&from).await,
        };

        let selection = CoinSelector::select(&utxos, amount, self.fee_rate)?;
        let change = if selection.has_change_output() {
            selection.change
        } else {
            0
        };
        let signed = self
            .builder
            .build_and_sign(&key, &selection.selected, &to, amount, None, change)?;

        let reported = self.utxos.broadcast(&signed.raw).await?;
        if reported != signed.txid {
            warn!(txid = %signed.txid, %reported, "provider reported a different txid");
        }
        info!(
            txid = %signed.txid,
            from = %from,
            to = %to,
            amount,
            fee = signed.fee,
            inputs = selection.selected.len(),
            "send broadcast"
        );

        let record = self
            .persist(NewTransactionRecord {
                user: req.user,
                txid: signed.txid,
                direction: Direction::Outgoing,
                amount,
                to_address: Some(to.encode()),
                memo: req.memo,
                status: TxStatus::Pending,
                submitted_at: unix_now(),
            })
            .await;

        Ok(SendReceipt {
            txid: signed.txid,
            fee: signed.fee,
            change: signed.change,
            record_id: record.map(|r| r.id),
        })
    }

    /// Record a broadcast transaction, retrying on storage failure.
    ///
    /// Between attempts the chain is asked about the txid so the eventual
    /// record reflects a confirmation that happened in the meantime. The
    /// transaction is never rebroadcast.
    async fn persist(&self, new: NewTransactionRecord) -> Option<TransactionRecord> {
        let txid = new.txid;
        let mut mined_at: Option<u64> = None;

        for attempt in 1..=self.persist_attempts {
            match self.store.insert(new.clone()) {
                Ok(record) => return Some(self.apply_mined(record, mined_at).await),
                Err(StoreError::DuplicateTxid(_)) => {
                    return self.store.get_by_txid(&txid).ok().flatten();
                }
                Err(e) => {
                    error!(%txid, attempt, error = %e, "failed to persist broadcast transaction");
                    if attempt == self.persist_attempts {
                        break;
                    }
                    tokio::time::sleep(self.persist_backoff * attempt).await;
                    if let Ok(TxLookup::Mined { height }) = self.chain.lookup(&txid).await {
                        mined_at = Some(height);
                    }
                }
            }
        }

        error!(%txid, "giving up on persisting broadcast transaction");
        None
    }

    async fn apply_mined(&self, record: TransactionRecord, mined_at: Option<u64>) -> TransactionRecord {
        let Some(height) = mined_at else {
            return record;
        };
        let confirmations = match self.chain.chain_height().await {
            Ok(current) => current.saturating_sub(height) + 1,
            Err(_) => 1,
        };
        match self.store.update_status(
            record.id,
            TxStatus::Confirmed,
            Some(height),
            Some(confirmations),
            unix_now(),
        ) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(txid = %record.txid, error = %e, "failed to mark confirmed after persist retry");
                record
            }
        }
    }

    /// WIF of the key derived from `seed`, with its P2PKH address.
    pub fn export_key(&self, seed: &str) -> ExportedKey {
        let key = self.derivation.derive(seed);
        let address = address_for(&key, self.network).encode();
        warn!(%address, "private key exported");
        ExportedKey {
            wif: export_wif(&key, self.network),
            address,
        }
    }

    pub fn record(&self, txid: &Hash256) -> Result<Option<TransactionRecord>, WalletError> {
        Ok(self.store.get_by_txid(txid)?)
    }

    pub fn history(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        Ok(self.store.list_by_user(user, limit, offset)?)
    }

    pub fn health(&self) -> Result<(), WalletError> {
        Ok(self.store.health_check()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zinc_core::address::AddressKind;
    use zinc_core::crypto::verify_transaction_input;
    use zinc_core::error::ProviderError;
    use zinc_core::traits::{ChainProvider, UtxoProvider};
    use zinc_wallet::FeeEstimator;

    use crate::storage::MemoryTxStore;

    /// Serves fixed UTXOs for one address and accepts every broadcast.
    #[derive(Default)]
    struct Node {
        utxos: SyncMutex<Vec<(u64, u32)>>,
        broadcasts: SyncMutex<Vec<Vec<u8>>>,
        reject: Option<String>,
        lookup: Option<TxLookup>,
    }

    #[async_trait]
    impl UtxoProvider for Node {
        fn name(&self) -> &str {
            "node"
        }

        async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
            Ok(self
                .utxos
                .lock()
                .iter()
                .map(|(value, vout)| Utxo {
                    txid: Hash256([0x5A; 32]),
                    output_index: *vout,
                    value: *value,
                    address: *address,
                })
                .collect())
        }

        async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError> {
            if let Some(msg) = &self.reject {
                return Err(ProviderError::Rejected(msg.clone()));
            }
            self.broadcasts.lock().push(raw_tx.to_vec());
            Ok(Transaction::decode(raw_tx).unwrap().txid())
        }
    }

    #[async_trait]
    impl ChainProvider for Node {
        fn name(&self) -> &str {
            "node"
        }

        async fn chain_height(&self) -> Result<u64, ProviderError> {
            Ok(2_000)
        }

        async fn lookup_transaction(&self, _txid: &Hash256) -> Result<TxLookup, ProviderError> {
            Ok(self.lookup.unwrap_or(TxLookup::NotFound))
        }
    }

    /// Fails the first `failures` inserts, then delegates.
    struct FlakyStore {
        inner: MemoryTxStore,
        failures: AtomicUsize,
    }

    impl TransactionStore for FlakyStore {
        fn insert(&self, record: NewTransactionRecord) -> Result<TransactionRecord, StoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.insert(record)
        }

        fn update_status(
            &self,
            id: u64,
            status: TxStatus,
            height: Option<u64>,
            confirmations: Option<u64>,
            now: u64,
        ) -> Result<TransactionRecord, StoreError> {
            self.inner.update_status(id, status, height, confirmations, now)
        }

        fn find_pending_older_than(&self, cutoff: u64) -> Result<Vec<TransactionRecord>, StoreError> {
            self.inner.find_pending_older_than(cutoff)
        }

        fn get(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError> {
            self.inner.get(id)
        }

        fn get_by_txid(&self, txid: &Hash256) -> Result<Option<TransactionRecord>, StoreError> {
            self.inner.get_by_txid(txid)
        }

        fn list_by_user(
            &self,
            user: &str,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            self.inner.list_by_user(user, limit, offset)
        }
    }

    fn recipient() -> String {
        Address::new(AddressKind::P2pkh, Network::Mainnet, [0x77; 20]).encode()
    }

    fn service_with(node: Arc<Node>, store: Arc<dyn TransactionStore>) -> WalletService {
        let config = ServiceConfig {
            persist_backoff: Duration::from_millis(1),
            ..ServiceConfig::default()
        };
        let timeout = Duration::from_secs(15);
        WalletService::new(
            &config,
            UtxoSource::new(vec![node.clone() as Arc<dyn UtxoProvider>], timeout),
            ChainSource::new(vec![node as Arc<dyn ChainProvider>], timeout),
            store,
        )
    }

    fn send_request(amount: AmountInput) -> SendRequest {
        SendRequest {
            user: "user-42".into(),
            seed: "user-42".into(),
            to_address: recipient(),
            amount,
            memo: Some("rent".into()),
        }
    }

    #[tokio::test]
    async fn send_builds_two_outputs_and_records() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((1_200_000, 0));
        let store = Arc::new(MemoryTxStore::new());
        let service = service_with(node.clone(), store.clone());

        let receipt = service
            .send(send_request(AmountInput::Zatoshis(1_000_000)))
            .await
            .unwrap();

        assert_eq!(receipt.fee, FeeEstimator::estimate(1, 2, 10));
        assert_eq!(receipt.change, Some(1_200_000 - 1_000_000 - 2_450));

        let raw = node.broadcasts.lock()[0].clone();
        let tx = Transaction::decode(&raw).unwrap();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 1_000_000);
        let key = KeyDerivation::legacy().derive("user-42");
        verify_transaction_input(&tx, 0, &key.pubkey_hash(), 1_200_000, zinc_core::constants::DEFAULT_BRANCH_ID)
            .unwrap();

        let record = service.record(&receipt.txid).unwrap().unwrap();
        assert_eq!(Some(record.id), receipt.record_id);
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.amount, 1_000_000);
        assert_eq!(record.memo.as_deref(), Some("rent"));
        assert_eq!(record.to_address, Some(recipient()));
    }

    #[tokio::test]
    async fn send_locks_are_released_after_each_send() {
        let node = Arc::new(Node::default());
        let service = service_with(node, Arc::new(MemoryTxStore::new()));

        for i in 0..200 {
            let req = SendRequest {
                seed: format!("seed-{i}"),
                ..send_request(AmountInput::Zatoshis(10_000))
            };
            let err = service.send(req).await.unwrap_err();
            assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }), "{err:?}");
        }
        assert!(service.send_locks.is_empty());
    }

    #[tokio::test]
    async fn send_lock_entry_removed_after_success() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((1_200_000, 0));
        let service = service_with(node, Arc::new(MemoryTxStore::new()));

        service
            .send(send_request(AmountInput::Zatoshis(1_000_000)))
            .await
            .unwrap();
        assert!(service.send_locks.is_empty());
    }

    #[tokio::test]
    async fn send_slot_kept_while_another_send_waits() {
        let locks = SendLocks::new();
        let first = SendSlot::acquire(&locks, "t1sender".into()).await;
        let waiter = {
            let lock = Arc::clone(locks.get("t1sender").unwrap().value());
            tokio::spawn(async move {
                let _held = lock.lock_owned().await;
            })
        };
        drop(first);
        // The waiter still holds a handle, so the entry survives.
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(SendSlot::acquire(&locks, "t1sender".into()).await.guard.is_some());
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn decimal_amount_is_truncated() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((5_000_000, 0));
        let service = service_with(node, Arc::new(MemoryTxStore::new()));
        let receipt = service
            .send(send_request(AmountInput::Coins("0.012345678".into())))
            .await
            .unwrap();
        let record = service.record(&receipt.txid).unwrap().unwrap();
        assert_eq!(record.amount, 1_234_567);
    }

    #[tokio::test]
    async fn amount_below_minimum_rejected() {
        let service = service_with(Arc::new(Node::default()), Arc::new(MemoryTxStore::new()));
        let err = service
            .send(send_request(AmountInput::Zatoshis(999)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn bad_destination_fails_before_network() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((1_200_000, 0));
        let service = service_with(node.clone(), Arc::new(MemoryTxStore::new()));
        let mut req = send_request(AmountInput::Zatoshis(10_000));
        req.to_address = "t1notanaddress".into();
        assert!(matches!(
            service.send(req).await,
            Err(WalletError::InvalidAddress(_))
        ));

        let mut req = send_request(AmountInput::Zatoshis(10_000));
        req.to_address = Address::new(AddressKind::P2pkh, Network::Testnet, [1; 20]).encode();
        assert_eq!(
            service.send(req).await.unwrap_err(),
            WalletError::InvalidAddress(AddressError::WrongNetwork)
        );
        assert!(node.broadcasts.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_utxo_set_is_insufficient() {
        let service = service_with(Arc::new(Node::default()), Arc::new(MemoryTxStore::new()));
        let err = service
            .send(send_request(AmountInput::Zatoshis(10_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }));
    }

    #[tokio::test]
    async fn rejection_leaves_no_record() {
        let node = Arc::new(Node {
            reject: Some("bad-txns-inputs-spent".into()),
            ..Node::default()
        });
        node.utxos.lock().push((1_200_000, 0));
        let store = Arc::new(MemoryTxStore::new());
        let service = service_with(node, store.clone());
        let err = service
            .send(send_request(AmountInput::Zatoshis(100_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::BroadcastRejected(m) if m.contains("inputs-spent")));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn manual_utxos_are_spent_as_sender() {
        let node = Arc::new(Node::default());
        let service = service_with(node.clone(), Arc::new(MemoryTxStore::new()));
        let outputs = vec![SpendableOutput {
            txid: Hash256([0x99; 32]),
            vout: 3,
            value: 600_000,
        }];
        let receipt = service
            .send_with_utxos(send_request(AmountInput::Zatoshis(500_000)), outputs)
            .await
            .unwrap();
        let tx = Transaction::decode(&node.broadcasts.lock()[0]).unwrap();
        assert_eq!(tx.inputs[0].prevout.index, 3);
        assert_eq!(tx.txid(), receipt.txid);
    }

    #[tokio::test]
    async fn persistence_retry_recovers_and_sees_confirmation() {
        let node = Arc::new(Node {
            lookup: Some(TxLookup::Mined { height: 1_995 }),
            ..Node::default()
        });
        node.utxos.lock().push((1_200_000, 0));
        let store = Arc::new(FlakyStore {
            inner: MemoryTxStore::new(),
            failures: AtomicUsize::new(2),
        });
        let service = service_with(node.clone(), store.clone());

        let receipt = service
            .send(send_request(AmountInput::Zatoshis(1_000_000)))
            .await
            .unwrap();
        assert!(receipt.record_id.is_some());
        assert_eq!(node.broadcasts.lock().len(), 1);

        let record = service.record(&receipt.txid).unwrap().unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.confirmations, Some(6));
    }

    #[tokio::test]
    async fn persistence_exhaustion_still_returns_txid() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((1_200_000, 0));
        let store = Arc::new(FlakyStore {
            inner: MemoryTxStore::new(),
            failures: AtomicUsize::new(100),
        });
        let service = service_with(node.clone(), store);
        let receipt = service
            .send(send_request(AmountInput::Zatoshis(1_000_000)))
            .await
            .unwrap();
        assert!(receipt.record_id.is_none());
        assert_eq!(node.broadcasts.lock().len(), 1);
    }

    #[tokio::test]
    async fn submit_signed_records_decoded_txid() {
        let node = Arc::new(Node::default());
        node.utxos.lock().push((1_200_000, 0));
        let store = Arc::new(MemoryTxStore::new());
        let service = service_with(node.clone(), store.clone());

        let key = KeyDerivation::legacy().derive("someone-else");
        let from = address_for(&key, Network::Mainnet);
        let utxo = Utxo {
            txid: Hash256([0x42; 32]),
            output_index: 0,
            value: 300_000,
            address: from,
        };
        let to = Address::decode(&recipient()).unwrap();
        let signed = TransactionBuilder::new()
            .build_and_sign(&key, &[utxo], &to, 250_000, None, 0)
            .unwrap();

        let receipt = service
            .submit_signed(SubmitRequest {
                user: "user-7".into(),
                raw_tx_hex: signed.raw_hex(),
                amount: None,
                to_address: Some(recipient()),
                memo: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.txid, signed.txid);
        let record = store.get_by_txid(&signed.txid).unwrap().unwrap();
        assert_eq!(record.amount, 250_000);
        assert_eq!(record.user, "user-7");
    }

    #[tokio::test]
    async fn submit_rejects_garbage() {
        let service = service_with(Arc::new(Node::default()), Arc::new(MemoryTxStore::new()));
        let req = |hex: &str| SubmitRequest {
            user: "u".into(),
            raw_tx_hex: hex.into(),
            amount: None,
            to_address: None,
            memo: None,
        };
        assert!(matches!(
            service.submit_signed(req("zz")).await,
            Err(WalletError::InvalidTransaction(TransactionError::InvalidHex(_)))
        ));
        assert!(matches!(
            service.submit_signed(req("0400008085")).await,
            Err(WalletError::InvalidTransaction(_))
        ));
    }

    #[tokio::test]
    async fn balance_accepts_tex() {
        let node = Arc::new(Node::default());
        node.utxos.lock().extend([(100, 0), (250, 1)]);
        let service = service_with(node, Arc::new(MemoryTxStore::new()));
        let addrs = service.generate_addresses("user-42");
        let b = service.balance(&addrs.tex.encode()).await.unwrap();
        assert_eq!((b.balance, b.utxo_count), (350, 2));
        assert!(service.balance("garbage").await.is_err());
    }

    #[test]
    fn generate_is_deterministic() {
        let service = service_with(Arc::new(Node::default()), Arc::new(MemoryTxStore::new()));
        assert_eq!(service.generate_addresses("user-42"), service.generate_addresses("user-42"));
        assert_ne!(service.generate_addresses("user-42"), service.generate_addresses("user-43"));
    }

    #[test]
    fn export_matches_generated_address() {
        let service = service_with(Arc::new(Node::default()), Arc::new(MemoryTxStore::new()));
        let exported = service.export_key("user-42");
        assert_eq!(
            exported.address,
            service.generate_addresses("user-42").transparent.encode()
        );
        let (key, network) = zinc_wallet::keys::import_wif(&exported.wif).unwrap();
        assert_eq!(network, Network::Mainnet);
        assert_eq!(key, KeyDerivation::legacy().derive("user-42"));
    }

    #[test]
    fn amount_input_deserializes_both_forms() {
        let a: AmountInput = serde_json::from_str("150000").unwrap();
        assert_eq!(a.to_zatoshis().unwrap(), 150_000);
        let b: AmountInput = serde_json::from_str(r#""1.5""#).unwrap();
        assert_eq!(b.to_zatoshis().unwrap(), 150_000_000);
    }
}
