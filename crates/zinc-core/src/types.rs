//! Core types: hashes, UTXOs, the v4 wire transaction, and persisted records.
//!
//! All monetary values are in zatoshis (1 ZEC = 10^8 zatoshis).
//!
//! [`Transaction`] is the transparent-only subset of the Zcash v4 (Sapling)
//! format: header, version group, transparent inputs/outputs, lock time,
//! expiry height, a zero value balance, and empty shielded vectors.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::constants::{MAX_MONEY, SAPLING_VERSION_GROUP_ID, SEQUENCE_FINAL, TX_V4_HEADER};
use crate::crypto::double_sha256;
use crate::error::TransactionError;

/// A 32-byte hash value in internal byte order.
///
/// Displayed and parsed in the byte-reversed order block explorers use for
/// transaction ids.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a display-order (byte-reversed) hex string.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let raw = hex::decode(s.trim()).map_err(|_| TransactionError::InvalidTxid(s.to_string()))?;
        let mut bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| TransactionError::InvalidTxid(s.to_string()))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// Append the 36-byte wire form.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.txid.as_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// An unspent output owned by a transparent address.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Hash256,
    #[serde(rename = "vout")]
    pub output_index: u32,
    /// Value in zatoshis.
    pub value: u64,
    pub address: Address,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            index: self.output_index,
        }
    }
}

/// A transparent input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Empty until signed.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// An unsigned input spending `prevout`.
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// A transparent output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    /// Append the wire form (`i64` value, then the length-prefixed script).
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.value as i64).to_le_bytes());
        write_compact_size(buf, self.script_pubkey.len() as u64);
        buf.extend_from_slice(&self.script_pubkey);
    }
}

/// A transparent-only v4 transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry_height: u32,
}

impl Transaction {
    /// Canonical wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            32 + self.inputs.len() * 150 + self.outputs.len() * 34,
        );
        buf.extend_from_slice(&TX_V4_HEADER.to_le_bytes());
        buf.extend_from_slice(&SAPLING_VERSION_GROUP_ID.to_le_bytes());

        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.prevout.encode_into(&mut buf);
            write_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode_into(&mut buf);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(&self.expiry_height.to_le_bytes());
        // valueBalance, then empty spend/output/joinsplit vectors
        buf.extend_from_slice(&0i64.to_le_bytes());
        write_compact_size(&mut buf, 0);
        write_compact_size(&mut buf, 0);
        write_compact_size(&mut buf, 0);
        buf
    }

    /// Parse a transparent-only v4 transaction.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = Reader::new(bytes);

        let header = r.u32()?;
        if header != TX_V4_HEADER {
            return Err(TransactionError::UnsupportedHeader(header));
        }
        let group = r.u32()?;
        if group != SAPLING_VERSION_GROUP_ID {
            return Err(TransactionError::UnsupportedHeader(group));
        }

        let n_in = r.compact_size()?;
        let mut inputs = Vec::new();
        for _ in 0..n_in {
            let txid = Hash256(r.array::<32>()?);
            let index = r.u32()?;
            let script_len = r.compact_size()?;
            let script_sig = r.bytes(script_len as usize)?.to_vec();
            let sequence = r.u32()?;
            inputs.push(TxIn {
                prevout: OutPoint { txid, index },
                script_sig,
                sequence,
            });
        }

        let n_out = r.compact_size()?;
        let mut outputs = Vec::new();
        for _ in 0..n_out {
            let value = r.i64()?;
            if value < 0 || value as u64 > MAX_MONEY {
                return Err(TransactionError::ValueOutOfRange(value as u64));
            }
            let script_len = r.compact_size()?;
            let script_pubkey = r.bytes(script_len as usize)?.to_vec();
            outputs.push(TxOut {
                value: value as u64,
                script_pubkey,
            });
        }

        let lock_time = r.u32()?;
        let expiry_height = r.u32()?;
        let value_balance = r.i64()?;
        let spends = r.compact_size()?;
        let shielded_outputs = r.compact_size()?;
        let joinsplits = r.compact_size()?;
        if value_balance != 0 || spends != 0 || shielded_outputs != 0 || joinsplits != 0 {
            return Err(TransactionError::ShieldedComponents);
        }
        if r.remaining() != 0 {
            return Err(TransactionError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            inputs,
            outputs,
            lock_time,
            expiry_height,
        })
    }

    /// Double SHA-256 of the canonical encoding.
    pub fn txid(&self) -> Hash256 {
        Hash256(double_sha256(&self.encode()))
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Append a Bitcoin-style CompactSize integer.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => buf.push(n as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        if n > self.remaining() {
            return Err(TransactionError::Truncated(self.pos));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, TransactionError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, TransactionError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn compact_size(&mut self) -> Result<u64, TransactionError> {
        let n = match self.bytes(1)?[0] {
            0xFD => u16::from_le_bytes(self.array()?) as u64,
            0xFE => u32::from_le_bytes(self.array()?) as u64,
            0xFF => u64::from_le_bytes(self.array()?),
            b => b as u64,
        };
        // A count can never exceed the bytes left to describe it.
        if n > self.remaining() as u64 {
            return Err(TransactionError::Truncated(self.pos));
        }
        Ok(n)
    }
}

// --- Persisted records ---

/// Lifecycle of a broadcast transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// Confirmed and failed records are never revisited.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Fields supplied when a broadcast transaction is first recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransactionRecord {
    pub user: String,
    pub txid: Hash256,
    pub direction: Direction,
    pub amount: u64,
    pub to_address: Option<String>,
    pub memo: Option<String>,
    pub status: TxStatus,
    /// Unix seconds.
    pub submitted_at: u64,
}

/// A persisted transaction record.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: u64,
    pub user: String,
    pub txid: Hash256,
    pub direction: Direction,
    pub amount: u64,
    pub to_address: Option<String>,
    pub memo: Option<String>,
    pub status: TxStatus,
    pub submitted_at: u64,
    pub updated_at: u64,
    pub confirmed_height: Option<u64>,
    pub confirmations: Option<u64>,
}

impl TransactionRecord {
    pub fn from_new(id: u64, new: NewTransactionRecord) -> Self {
        Self {
            id,
            user: new.user,
            txid: new.txid,
            direction: new.direction,
            amount: new.amount,
            to_address: new.to_address,
            memo: new.memo,
            status: new.status,
            submitted_at: new.submitted_at,
            updated_at: new.submitted_at,
            confirmed_height: None,
            confirmations: None,
        }
    }

    /// Seconds since submission, saturating at zero for clock skew.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.submitted_at)
    }
}
