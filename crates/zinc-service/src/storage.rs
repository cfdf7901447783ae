//! Transaction record storage.
//!
//! [`RocksTxStore`] persists records in RocksDB column families:
//!
//! - `records`: id (u64 BE) → bincode [`TransactionRecord`]
//! - `txid_index`: txid bytes → id
//! - `user_index`: len(user) (u32 BE) ‖ user ‖ id (u64 BE) → empty
//! - `pending_index`: id (u64 BE) → submitted_at (u64 BE), pending records only
//! - `metadata`: `next_id` counter, pending index marker
//!
//! Every mutation is a single atomic [`WriteBatch`]. [`MemoryTxStore`] keeps
//! the same semantics in process memory.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use tracing::{debug, info, warn};

use zinc_core::error::StoreError;
use zinc_core::traits::TransactionStore;
use zinc_core::types::{Hash256, NewTransactionRecord, TransactionRecord, TxStatus};

const CF_RECORDS: &str = "records";
const CF_TXID_INDEX: &str = "txid_index";
const CF_USER_INDEX: &str = "user_index";
const CF_PENDING_INDEX: &str = "pending_index";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[
    CF_RECORDS,
    CF_TXID_INDEX,
    CF_USER_INDEX,
    CF_PENDING_INDEX,
    CF_METADATA,
];

const META_NEXT_ID: &[u8] = b"next_id";
/// Present once `pending_index` covers every record.
const META_PENDING_INDEXED: &[u8] = b"pending_indexed";

fn backend(e: rocksdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode_record(record: &TransactionRecord) -> Result<Vec<u8>, StoreError> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_record(bytes: &[u8]) -> Result<TransactionRecord, StoreError> {
    let (record, _): (TransactionRecord, _) =
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(record)
}

fn decode_u64(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("invalid u64 length".into()))?;
    Ok(u64::from_be_bytes(arr))
}

fn user_prefix(user: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + user.len() + 8);
    key.extend_from_slice(&(user.len() as u32).to_be_bytes());
    key.extend_from_slice(user.as_bytes());
    key
}

fn user_key(user: &str, id: u64) -> Vec<u8> {
    let mut key = user_prefix(user);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Apply a status transition. Terminal records are returned unchanged.
fn transition(
    record: &mut TransactionRecord,
    status: TxStatus,
    height: Option<u64>,
    confirmations: Option<u64>,
    now: u64,
) -> bool {
    if record.status.is_terminal() {
        return false;
    }
    record.status = status;
    record.updated_at = now;
    if height.is_some() {
        record.confirmed_height = height;
    }
    if confirmations.is_some() {
        record.confirmations = confirmations;
    }
    true
}

// --- RocksDB ---

/// RocksDB-backed transaction record store.
pub struct RocksTxStore {
    db: DB,
    /// Serializes id allocation and the duplicate-txid check.
    write_lock: Mutex<()>,
}

impl RocksTxStore {
    /// Open or create a database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(backend)?;
        let store = Self {
            db,
            write_lock: Mutex::new(()),
        };
        store.ensure_pending_index()?;
        Ok(store)
    }

    /// Build `pending_index` from `records` for databases written before it
    /// existed. Runs once; later opens only check the marker.
    fn ensure_pending_index(&self) -> Result<(), StoreError> {
        let cf_meta = self.cf_handle(CF_METADATA)?;
        if self.db.get_cf(cf_meta, META_PENDING_INDEXED).map_err(backend)?.is_some() {
            return Ok(());
        }

        let cf_pending = self.cf_handle(CF_PENDING_INDEX)?;
        let mut batch = WriteBatch::default();
        let mut indexed = 0usize;
        for item in self.db.iterator_cf(self.cf_handle(CF_RECORDS)?, IteratorMode::Start) {
            let (_, value) = item.map_err(backend)?;
            let record = decode_record(&value)?;
            if record.status == TxStatus::Pending {
                batch.put_cf(cf_pending, record.id.to_be_bytes(), record.submitted_at.to_be_bytes());
                indexed += 1;
            }
        }
        batch.put_cf(cf_meta, META_PENDING_INDEXED, b"");
        self.db.write(batch).map_err(backend)?;

        if indexed > 0 {
            info!(indexed, "built pending index");
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(backend)
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family: {name}")))
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, META_NEXT_ID).map_err(backend)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(1),
        }
    }

    fn load(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError> {
        let cf = self.cf_handle(CF_RECORDS)?;
        match self.db.get_cf(cf, id.to_be_bytes()).map_err(backend)? {
            Some(bytes) => decode_record(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

impl TransactionStore for RocksTxStore {
    fn insert(&self, new: NewTransactionRecord) -> Result<TransactionRecord, StoreError> {
        let _guard = self.write_lock.lock();

        let cf_txid = self.cf_handle(CF_TXID_INDEX)?;
        if self.db.get_cf(cf_txid, new.txid.as_bytes()).map_err(backend)?.is_some() {
            return Err(StoreError::DuplicateTxid(new.txid.to_string()));
        }

        let id = self.next_id()?;
        let record = TransactionRecord::from_new(id, new);

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf_handle(CF_RECORDS)?, id.to_be_bytes(), encode_record(&record)?);
        batch.put_cf(cf_txid, record.txid.as_bytes(), id.to_be_bytes());
        batch.put_cf(self.cf_handle(CF_USER_INDEX)?, user_key(&record.user, id), b"");
        if record.status == TxStatus::Pending {
            batch.put_cf(
                self.cf_handle(CF_PENDING_INDEX)?,
                id.to_be_bytes(),
                record.submitted_at.to_be_bytes(),
            );
        }
        batch.put_cf(self.cf_handle(CF_METADATA)?, META_NEXT_ID, (id + 1).to_be_bytes());
        self.db.write(batch).map_err(backend)?;

        debug!(id, txid = %record.txid, user = %record.user, "record inserted");
        Ok(record)
    }

    fn update_status(
        &self,
        id: u64,
        status: TxStatus,
        height: Option<u64>,
        confirmations: Option<u64>,
        now: u64,
    ) -> Result<TransactionRecord, StoreError> {
        let _guard = self.write_lock.lock();
        let mut record = self.load(id)?.ok_or(StoreError::NotFound(id))?;
        if transition(&mut record, status, height, confirmations, now) {
            let mut batch = WriteBatch::default();
            batch.put_cf(self.cf_handle(CF_RECORDS)?, id.to_be_bytes(), encode_record(&record)?);
            if record.status != TxStatus::Pending {
                batch.delete_cf(self.cf_handle(CF_PENDING_INDEX)?, id.to_be_bytes());
            }
            self.db.write(batch).map_err(backend)?;
        }
        Ok(record)
    }

    fn find_pending_older_than(&self, cutoff: u64) -> Result<Vec<TransactionRecord>, StoreError> {
        let cf = self.cf_handle(CF_PENDING_INDEX)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(backend)?;
            if decode_u64(&value)? > cutoff {
                continue;
            }
            let id = decode_u64(&key)?;
            match self.load(id)? {
                Some(record) if record.status == TxStatus::Pending => out.push(record),
                _ => warn!(id, "stale pending index entry"),
            }
        }
        Ok(out)
    }

    fn get(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError> {
        self.load(id)
    }

    fn get_by_txid(&self, txid: &Hash256) -> Result<Option<TransactionRecord>, StoreError> {
        let cf = self.cf_handle(CF_TXID_INDEX)?;
        match self.db.get_cf(cf, txid.as_bytes()).map_err(backend)? {
            Some(bytes) => self.load(decode_u64(&bytes)?),
            None => Ok(None),
        }
    }

    fn list_by_user(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let cf = self.cf_handle(CF_USER_INDEX)?;
        let prefix = user_prefix(user);

        let mut ids = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward)) {
            let (key, _) = item.map_err(backend)?;
            if !key.starts_with(&prefix) || key.len() != prefix.len() + 8 {
                break;
            }
            ids.push(decode_u64(&key[prefix.len()..])?);
        }

        // ids ascend; history is newest first
        ids.iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| self.load(*id).transpose())
            .collect()
    }

    fn health_check(&self) -> Result<(), StoreError> {
        self.next_id().map(|_| ())
    }
}

// --- In-memory ---

#[derive(Default)]
struct MemoryInner {
    records: BTreeMap<u64, TransactionRecord>,
    by_txid: HashMap<Hash256, u64>,
    next_id: u64,
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryTxStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryTxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionStore for MemoryTxStore {
    fn insert(&self, new: NewTransactionRecord) -> Result<TransactionRecord, StoreError> {
        let mut inner = self.inner.write();
        if inner.by_txid.contains_key(&new.txid) {
            return Err(StoreError::DuplicateTxid(new.txid.to_string()));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let record = TransactionRecord::from_new(id, new);
        inner.by_txid.insert(record.txid, id);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn update_status(
        &self,
        id: u64,
        status: TxStatus,
        height: Option<u64>,
        confirmations: Option<u64>,
        now: u64,
    ) -> Result<TransactionRecord, StoreError> {
        let mut inner = self.inner.write();
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        transition(record, status, height, confirmations, now);
        Ok(record.clone())
    }

    fn find_pending_older_than(&self, cutoff: u64) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .filter(|r| r.status == TxStatus::Pending && r.submitted_at <= cutoff)
            .cloned()
            .collect())
    }

    fn get(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn get_by_txid(&self, txid: &Hash256) -> Result<Option<TransactionRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .by_txid
            .get(txid)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    fn list_by_user(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .rev()
            .filter(|r| r.user == user)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
