//! Trait interfaces between crates.
//!
//! - [`UtxoProvider`]: one external data source for UTXOs and broadcast
//!   (zinc-providers implements)
//! - [`ChainProvider`]: chain height and transaction lookups for the
//!   confirmation reconciler (zinc-providers implements)
//! - [`TransactionStore`]: persistence of broadcast transaction records
//!   (zinc-service implements)

use async_trait::async_trait;

use crate::address::Address;
use crate::error::{ProviderError, StoreError};
use crate::types::{Hash256, NewTransactionRecord, TransactionRecord, TxStatus, Utxo};

/// A single block explorer, bridge, or node that can list unspent outputs and
/// relay raw transactions.
///
/// Implementations perform one attempt per call. Retrying, fallback and
/// timeouts are the caller's concern.
#[async_trait]
pub trait UtxoProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Unspent outputs currently owned by `address`.
    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError>;

    /// Relay a serialized transaction, returning the txid the provider reports.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError>;
}

/// Where a transaction currently stands from a provider's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxLookup {
    /// Included in the block at `height`.
    Mined { height: u64 },
    /// Known but not yet mined.
    Mempool,
    /// The provider has never seen it.
    NotFound,
}

/// Read access to chain state.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Height of the current best block.
    async fn chain_height(&self) -> Result<u64, ProviderError>;

    /// Look up a transaction by id.
    async fn lookup_transaction(&self, txid: &Hash256) -> Result<TxLookup, ProviderError>;
}

/// Persistence for transaction records.
///
/// Records are created at broadcast time and only ever move forward through
/// their status; they are never deleted.
pub trait TransactionStore: Send + Sync {
    /// Persist a new record, assigning its id.
    fn insert(&self, record: NewTransactionRecord) -> Result<TransactionRecord, StoreError>;

    /// Set the status and, for confirmations, the inclusion height and
    /// confirmation count. `now` is recorded as the update time.
    fn update_status(
        &self,
        id: u64,
        status: TxStatus,
        height: Option<u64>,
        confirmations: Option<u64>,
        now: u64,
    ) -> Result<TransactionRecord, StoreError>;

    /// Pending records submitted at or before `cutoff` (unix seconds).
    fn find_pending_older_than(&self, cutoff: u64) -> Result<Vec<TransactionRecord>, StoreError>;

    fn get(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError>;

    fn get_by_txid(&self, txid: &Hash256) -> Result<Option<TransactionRecord>, StoreError>;

    /// A user's records, newest first.
    fn list_by_user(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Cheap liveness probe. Default: succeed.
    fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
