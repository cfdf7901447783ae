//! secp256k1 key handling and transparent input signing.
//!
//! # Signing scheme
//!
//! Inputs are signed over the ZIP-243 signature hash with `SIGHASH_ALL`. The
//! hash is BLAKE2b-256 personalized with `ZcashSigHash` and the consensus
//! branch id, and commits to:
//! - the transaction header, version group, lock time and expiry height
//! - BLAKE2b digests of all prevouts, all sequence numbers and all outputs
//! - the input being signed: prevout, script code, amount and sequence
//!
//! Shielded digests are all-zero because the engine never produces shielded
//! components. Signatures are RFC 6979 deterministic ECDSA with low-S
//! normalization, DER-encoded and followed by the hash-type byte.

use ripemd::Ripemd160;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{SAPLING_VERSION_GROUP_ID, SIGHASH_ALL, TX_V4_HEADER};
use crate::error::CryptoError;
use crate::script::{p2pkh_script, p2pkh_script_sig, parse_pushes};
use crate::types::{Transaction, write_compact_size};

const PERSONAL_PREVOUTS: &[u8; 16] = b"ZcashPrevoutHash";
const PERSONAL_SEQUENCE: &[u8; 16] = b"ZcashSequencHash";
const PERSONAL_OUTPUTS: &[u8; 16] = b"ZcashOutputsHash";
const PERSONAL_SIGHASH_PREFIX: &[u8; 12] = b"ZcashSigHash";

fn secp() -> &'static Secp256k1<All> {
    static CTX: OnceLock<Secp256k1<All>> = OnceLock::new();
    CTX.get_or_init(Secp256k1::new)
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// A secp256k1 secret scalar and its compressed public key.
///
/// The secret is zeroized on drop and never shown by `Debug`. Values are
/// meant to live for one request and be re-derived when needed again.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    secret: [u8; 32],
    #[zeroize(skip)]
    public: [u8; 33],
}

impl KeyMaterial {
    /// Build key material from a 32-byte scalar.
    ///
    /// Fails if the bytes are zero or not below the curve order.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let mut sk = SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(secp(), &sk).serialize();
        sk.non_secure_erase();
        Ok(Self {
            secret: bytes,
            public,
        })
    }

    /// Raw secret scalar. Handle with care.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// 33-byte compressed SEC1 public key.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public
    }

    /// HASH160 of the compressed public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public)
    }

    /// Sign a 32-byte digest, returning the DER-encoded low-S signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let mut sk =
            SecretKey::from_slice(&self.secret).map_err(|_| CryptoError::InvalidSecretKey)?;
        let msg = Message::from_slice(digest).map_err(|_| CryptoError::InvalidSignature)?;
        let sig = secp().sign_ecdsa(&msg, &sk);
        sk.non_secure_erase();
        Ok(sig.serialize_der().to_vec())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.secret == other.secret
    }
}

impl Eq for KeyMaterial {}

/// Verify a DER signature over `digest` against a compressed public key.
pub fn verify_digest(pubkey: &[u8], digest: &[u8; 32], der: &[u8]) -> Result<(), CryptoError> {
    let pk = PublicKey::from_slice(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;
    let msg = Message::from_slice(digest).map_err(|_| CryptoError::InvalidSignature)?;
    secp()
        .verify_ecdsa(&msg, &sig, &pk)
        .map_err(|_| CryptoError::VerificationFailed)
}

fn blake2b_256(personal: &[u8], data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(personal)
        .hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Transaction-wide digests shared by every input's signature hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SighashMidstate {
    hash_prevouts: [u8; 32],
    hash_sequence: [u8; 32],
    hash_outputs: [u8; 32],
}

impl SighashMidstate {
    pub fn new(tx: &Transaction) -> Self {
        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            input.prevout.encode_into(&mut prevouts);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        let mut outputs = Vec::with_capacity(tx.outputs.len() * 34);
        for output in &tx.outputs {
            output.encode_into(&mut outputs);
        }

        // ZIP-243: an empty output list hashes to zero rather than BLAKE2b("")
        let hash_outputs = if tx.outputs.is_empty() {
            [0u8; 32]
        } else {
            blake2b_256(PERSONAL_OUTPUTS, &outputs)
        };

        Self {
            hash_prevouts: blake2b_256(PERSONAL_PREVOUTS, &prevouts),
            hash_sequence: blake2b_256(PERSONAL_SEQUENCE, &sequences),
            hash_outputs,
        }
    }
}

/// Compute the ZIP-243 `SIGHASH_ALL` hash for one transparent input.
///
/// `script_code` is the spent output's script and `amount` its value.
pub fn signing_hash(
    tx: &Transaction,
    midstate: &SighashMidstate,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    branch_id: u32,
) -> Result<[u8; 32], CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;

    let mut data = Vec::with_capacity(4 + 4 + 32 * 6 + 4 + 4 + 8 + 4 + 36 + 26 + 8 + 4);
    data.extend_from_slice(&TX_V4_HEADER.to_le_bytes());
    data.extend_from_slice(&SAPLING_VERSION_GROUP_ID.to_le_bytes());
    data.extend_from_slice(&midstate.hash_prevouts);
    data.extend_from_slice(&midstate.hash_sequence);
    data.extend_from_slice(&midstate.hash_outputs);
    // joinsplits, shielded spends, shielded outputs
    data.extend_from_slice(&[0u8; 96]);
    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&tx.expiry_height.to_le_bytes());
    data.extend_from_slice(&0i64.to_le_bytes());
    data.extend_from_slice(&(SIGHASH_ALL as u32).to_le_bytes());

    input.prevout.encode_into(&mut data);
    write_compact_size(&mut data, script_code.len() as u64);
    data.extend_from_slice(script_code);
    data.extend_from_slice(&(amount as i64).to_le_bytes());
    data.extend_from_slice(&input.sequence.to_le_bytes());

    let mut personal = [0u8; 16];
    personal[..12].copy_from_slice(PERSONAL_SIGHASH_PREFIX);
    personal[12..].copy_from_slice(&branch_id.to_le_bytes());
    Ok(blake2b_256(&personal, &data))
}

/// Sign every input of a transaction whose inputs all spend P2PKH outputs of
/// `key`. `amounts[i]` is the value of the output spent by input `i`.
///
/// All-or-nothing: on error the transaction is left untouched.
pub fn sign_all_inputs(
    tx: &mut Transaction,
    key: &KeyMaterial,
    amounts: &[u64],
    branch_id: u32,
) -> Result<(), CryptoError> {
    if amounts.len() != tx.inputs.len() {
        return Err(CryptoError::AmountCountMismatch {
            got: amounts.len(),
            expected: tx.inputs.len(),
        });
    }

    let midstate = SighashMidstate::new(tx);
    let script_code = p2pkh_script(&key.pubkey_hash());

    let mut script_sigs = Vec::with_capacity(tx.inputs.len());
    for (index, amount) in amounts.iter().enumerate() {
        let sighash = signing_hash(tx, &midstate, index, &script_code, *amount, branch_id)?;
        let mut sig = key.sign_digest(&sighash)?;
        sig.push(SIGHASH_ALL);
        script_sigs.push(p2pkh_script_sig(&sig, key.public_key()));
    }

    for (input, script_sig) in tx.inputs.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    Ok(())
}

/// Verify a signed P2PKH input against the pubkey hash of the output it spends.
///
/// Checks that:
/// 1. The scriptSig is exactly `<sig ‖ SIGHASH_ALL> <pubkey>`
/// 2. HASH160 of the pubkey matches `expected_pubkey_hash`
/// 3. The signature verifies over the input's signature hash
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    expected_pubkey_hash: &[u8; 20],
    amount: u64,
    branch_id: u32,
) -> Result<(), CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;

    let items = parse_pushes(&input.script_sig).ok_or(CryptoError::InvalidSignature)?;
    let [sig_with_type, pubkey] = items.as_slice() else {
        return Err(CryptoError::InvalidSignature);
    };
    let Some((&hash_type, der)) = sig_with_type.split_last() else {
        return Err(CryptoError::InvalidSignature);
    };
    if hash_type != SIGHASH_ALL {
        return Err(CryptoError::InvalidSignature);
    }
    if hash160(pubkey) != *expected_pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let midstate = SighashMidstate::new(tx);
    let script_code = p2pkh_script(expected_pubkey_hash);
    let sighash = signing_hash(tx, &midstate, input_index, &script_code, amount, branch_id)?;
    verify_digest(pubkey, &sighash, der)
}
