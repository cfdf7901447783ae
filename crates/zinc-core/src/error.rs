//! Error types for the Zinc engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")] Empty,
    #[error("invalid base58 encoding")] InvalidBase58,
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown prefix: {0:02x}{1:02x}")] UnknownPrefix(u8, u8),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
    #[error("address belongs to a different network")] WrongNetwork,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid secret key")] InvalidSecretKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("prevout amounts length {got} does not match inputs {expected}")] AmountCountMismatch { got: usize, expected: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("value overflow")] ValueOverflow,
    #[error("output value {0} exceeds the maximum money supply")] ValueOutOfRange(u64),
    #[error("truncated transaction at byte {0}")] Truncated(usize),
    #[error("unsupported transaction header: {0:#010x}")] UnsupportedHeader(u32),
    #[error("shielded components are not supported")] ShieldedComponents,
    #[error("trailing bytes after transaction: {0}")] TrailingBytes(usize),
    #[error("invalid txid: {0}")] InvalidTxid(String),
    #[error("invalid hex: {0}")] InvalidHex(String),
}

/// Failure of a single data provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("network: {0}")] Network(String),
    #[error("timed out after {0}s")] Timeout(u64),
    #[error("malformed response: {0}")] Malformed(String),
    #[error("rejected: {0}")] Rejected(String),
    #[error("unsupported operation: {0}")] Unsupported(&'static str),
}

impl ProviderError {
    /// Whether the provider explicitly refused the request, as opposed to
    /// being unreachable or answering with garbage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Outcome of a broadcast attempt that exhausted every provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("broadcast rejected by {provider}: {message}")] Rejected { provider: String, message: String },
    #[error("no provider accepted the broadcast (last: {provider}: {message})")] Unavailable { provider: String, message: String },
    #[error("no providers configured")] NoProviders,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")] NotFound(u64),
    #[error("duplicate txid: {0}")] DuplicateTxid(String),
    #[error("storage: {0}")] Backend(String),
    #[error("serialization: {0}")] Serialization(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")] Empty,
    #[error("invalid amount: {0}")] Invalid(String),
    #[error("amount exceeds maximum money supply")] OutOfRange,
}
