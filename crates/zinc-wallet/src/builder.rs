//! Transaction assembly and signing.
//!
//! Provides a builder for single-recipient transparent payments:
//! 1. Configure consensus parameters (branch id, expiry, lock time)
//! 2. Build an unsigned transaction from selected UTXOs
//! 3. Sign every input with the one key that owns them
//!
//! Signing is all-or-nothing: either every input is signed and a complete
//! [`SignedTransaction`] is returned, or nothing is.

use std::collections::HashSet;

use tracing::debug;
use zinc_core::address::{Address, AddressKind};
use zinc_core::constants::{
    DEFAULT_BRANCH_ID, DEFAULT_EXPIRY_HEIGHT, DUST_THRESHOLD, MAX_MONEY,
};
use zinc_core::crypto::{KeyMaterial, sign_all_inputs};
use zinc_core::error::{CryptoError, TransactionError};
use zinc_core::types::{Hash256, Transaction, TxIn, TxOut, Utxo};

use crate::coin_selection::CoinSelection;
use crate::error::WalletError;
use crate::fee::FeeEstimator;
use crate::keys::address_for;

/// A transaction output before script encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    /// Amount in zatoshis.
    pub value: u64,
}

/// An unsigned transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// The transaction with empty scriptSigs.
    pub tx: Transaction,
    /// Spent UTXOs, one per input and in the same order.
    pub inputs: Vec<Utxo>,
    /// Recipient first, optional change last.
    pub outputs: Vec<Recipient>,
}

impl UnsignedTransaction {
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|u| u.value).sum()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|r| r.value).sum()
    }

    /// `inputs - outputs`; never stored in an output.
    pub fn fee(&self) -> u64 {
        self.input_total().saturating_sub(self.output_total())
    }

    /// Value returned to the sender, if a change output was emitted.
    pub fn change(&self) -> Option<u64> {
        self.outputs.get(1).map(|r| r.value)
    }
}

/// A fully signed transaction and its canonical encoding.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub raw: Vec<u8>,
    pub txid: Hash256,
    pub fee: u64,
    pub change: Option<u64>,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Builder for constructing and signing transactions.
///
/// # Example
/// ```ignore
/// let signed = TransactionBuilder::new()
///     .set_expiry_height(height + 40)
///     .build_and_sign(&key, &selection.selected, &to, amount, None, selection.change)?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    branch_id: u32,
    expiry_height: u32,
    lock_time: u32,
}

impl TransactionBuilder {
    /// Create a builder for the default consensus branch.
    pub fn new() -> Self {
        Self {
            branch_id: DEFAULT_BRANCH_ID,
            expiry_height: DEFAULT_EXPIRY_HEIGHT,
            lock_time: 0,
        }
    }

    /// Override the consensus branch id committed to by signatures.
    pub fn set_branch_id(&mut self, branch_id: u32) -> &mut Self {
        self.branch_id = branch_id;
        self
    }

    /// Height after which the transaction can no longer be mined (0 = never).
    pub fn set_expiry_height(&mut self, height: u32) -> &mut Self {
        self.expiry_height = height;
        self
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Assemble an unsigned transaction.
    ///
    /// One input per UTXO in the given order. The recipient output comes
    /// first; a change output to `change_address` follows only when
    /// `change_amount` exceeds the dust threshold.
    pub fn build(
        &self,
        inputs: &[Utxo],
        to: &Address,
        amount: u64,
        change_address: &Address,
        change_amount: u64,
    ) -> Result<UnsignedTransaction, WalletError> {
        if inputs.is_empty() {
            return Err(TransactionError::EmptyInputsOrOutputs.into());
        }
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be non-zero".into()));
        }
        if amount > MAX_MONEY {
            return Err(TransactionError::ValueOutOfRange(amount).into());
        }

        let mut seen = HashSet::with_capacity(inputs.len());
        for utxo in inputs {
            if !seen.insert(utxo.outpoint()) {
                return Err(TransactionError::DuplicateInput(utxo.outpoint().to_string()).into());
            }
        }

        let mut outputs = vec![Recipient {
            address: *to,
            value: amount,
        }];
        if change_amount > DUST_THRESHOLD {
            outputs.push(Recipient {
                address: *change_address,
                value: change_amount,
            });
        }

        let input_total = inputs
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.value))
            .ok_or(TransactionError::ValueOverflow)?;
        let output_total = outputs
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.value))
            .ok_or(TransactionError::ValueOverflow)?;
        if input_total < output_total {
            return Err(WalletError::InsufficientFunds {
                have: input_total,
                need: output_total,
            });
        }

        let tx = Transaction {
            inputs: inputs.iter().map(|u| TxIn::new(u.outpoint())).collect(),
            outputs: outputs
                .iter()
                .map(|r| TxOut {
                    value: r.value,
                    script_pubkey: r.address.script_pubkey(),
                })
                .collect(),
            lock_time: self.lock_time,
            expiry_height: self.expiry_height,
        };

        Ok(UnsignedTransaction {
            tx,
            inputs: inputs.to_vec(),
            outputs,
        })
    }

    /// Sign all inputs of an unsigned transaction with `key`.
    ///
    /// Every spent UTXO must belong to the key's pubkey hash; inputs owned by
    /// anyone else are rejected before any signature is produced.
    pub fn sign(
        &self,
        unsigned: UnsignedTransaction,
        key: &KeyMaterial,
    ) -> Result<SignedTransaction, WalletError> {
        let owner = key.pubkey_hash();
        for utxo in &unsigned.inputs {
            if utxo.address.kind() == AddressKind::P2sh || utxo.address.hash() != &owner {
                return Err(CryptoError::PubkeyHashMismatch.into());
            }
        }

        let fee = unsigned.fee();
        let change = unsigned.change();
        let amounts: Vec<u64> = unsigned.inputs.iter().map(|u| u.value).collect();

        let mut tx = unsigned.tx;
        sign_all_inputs(&mut tx, key, &amounts, self.branch_id)?;

        let raw = tx.encode();
        let txid = tx.txid();
        debug!(
            %txid,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            size = raw.len(),
            estimated = FeeEstimator::estimate_size(tx.inputs.len(), tx.outputs.len()),
            fee,
            "signed transaction"
        );

        Ok(SignedTransaction {
            tx,
            raw,
            txid,
            fee,
            change,
        })
    }

    /// Build and sign in one step.
    ///
    /// `change_address` defaults to the key's own P2PKH address on the
    /// recipient's network.
    pub fn build_and_sign(
        &self,
        key: &KeyMaterial,
        inputs: &[Utxo],
        to: &Address,
        amount: u64,
        change_address: Option<&Address>,
        change_amount: u64,
    ) -> Result<SignedTransaction, WalletError> {
        let own = address_for(key, to.network());
        let change_address = change_address.unwrap_or(&own);
        let unsigned = self.build(inputs, to, amount, change_address, change_amount)?;
        self.sign(unsigned, key)
    }

    /// Build and sign from a coin selection result.
    pub fn build_from_selection(
        &self,
        key: &KeyMaterial,
        selection: &CoinSelection,
        to: &Address,
        change_address: Option<&Address>,
    ) -> Result<SignedTransaction, WalletError> {
        self.build_and_sign(
            key,
            &selection.selected,
            to,
            selection.target,
            change_address,
            selection.change,
        )
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
