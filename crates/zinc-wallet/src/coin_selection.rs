//! Greedy in-order coin selection.
//!
//! UTXOs are taken in exactly the order supplied, never sorted, so the same
//! input always produces the same selection. After each UTXO is added the fee
//! is re-estimated for the new input count, and selection stops as soon as the
//! accumulated value covers the target plus that fee.

use tracing::debug;
use zinc_core::constants::DUST_THRESHOLD;
use zinc_core::types::Utxo;

use crate::error::WalletError;
use crate::fee::FeeEstimator;

/// Outputs assumed while estimating the fee: recipient and change.
pub const SELECTION_OUTPUT_COUNT: usize = 2;

/// Result of coin selection: which UTXOs to spend and the fee/change breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, in the order they were supplied.
    pub selected: Vec<Utxo>,
    /// Total value of the selected UTXOs.
    pub total: u64,
    /// Amount being paid to the recipient.
    pub target: u64,
    /// Estimated fee for the selected input count.
    pub fee: u64,
    /// `total - target - fee`.
    pub change: u64,
}

impl CoinSelection {
    /// Change above the dust threshold gets its own output; anything at or
    /// below it is left to the fee.
    pub fn has_change_output(&self) -> bool {
        self.change > DUST_THRESHOLD
    }

    /// Fee actually paid once dust change is absorbed.
    pub fn effective_fee(&self) -> u64 {
        if self.has_change_output() {
            self.fee
        } else {
            self.fee.saturating_add(self.change)
        }
    }
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select UTXOs covering `target` plus the estimated fee.
    ///
    /// # Arguments
    /// - `utxos`: candidate UTXOs, consumed in the given order
    /// - `target`: amount to pay, in zatoshis, excluding fee
    /// - `fee_rate`: zatoshis per estimated byte
    pub fn select(utxos: &[Utxo], target: u64, fee_rate: u64) -> Result<CoinSelection, WalletError> {
        if target == 0 {
            return Err(WalletError::InvalidAmount("target must be non-zero".into()));
        }

        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for utxo in utxos {
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.value);

            let fee = FeeEstimator::estimate(selected.len(), SELECTION_OUTPUT_COUNT, fee_rate);
            let needed = target.saturating_add(fee);

            if total >= needed {
                let change = total - needed;
                debug!(
                    inputs = selected.len(),
                    total, target, fee, change, "coin selection satisfied"
                );
                return Ok(CoinSelection {
                    selected,
                    total,
                    target,
                    fee,
                    change,
                });
            }
        }

        // Not enough funds
        let fee = FeeEstimator::estimate(utxos.len(), SELECTION_OUTPUT_COUNT, fee_rate);
        Err(WalletError::InsufficientFunds {
            have: total,
            need: target.saturating_add(fee),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinc_core::address::{Address, AddressKind, Network};
    use zinc_core::types::Hash256;

    fn make_utxo(value: u64, index: u32) -> Utxo {
        Utxo {
            txid: Hash256([index as u8 + 1; 32]),
            output_index: index,
            value,
            address: Address::new(AddressKind::P2pkh, Network::Mainnet, [0xAA; 20]),
        }
    }

    fn values(sel: &CoinSelection) -> Vec<u64> {
        sel.selected.iter().map(|u| u.value).collect()
    }

    // --- Basic selection ---

    #[test]
    fn single_utxo_covers_target() {
        let utxos = vec![make_utxo(1_200_000, 0)];
        let sel = CoinSelector::select(&utxos, 1_000_000, 10).unwrap();
        assert_eq!(values(&sel), vec![1_200_000]);
        assert_eq!(sel.fee, 2_450);
        assert_eq!(sel.change, 1_200_000 - 1_000_000 - 2_450);
        assert!(sel.has_change_output());
    }

    #[test]
    fn does_not_stop_after_first_insufficient_utxo() {
        // Two-input fee at rate 1 is 29 + 2*148 + 2*34 = 393 zatoshis.
        let utxos = vec![make_utxo(1_000, 0), make_utxo(2_000, 1), make_utxo(5_000, 2)];
        let sel = CoinSelector::select(&utxos, 2_500, 1).unwrap();
        assert_eq!(values(&sel), vec![1_000, 2_000]);
        assert_eq!(sel.total, 3_000);
        assert_eq!(sel.fee, FeeEstimator::estimate(2, 2, 1));
        assert_eq!(sel.change, 3_000 - 2_500 - sel.fee);
        assert!(!sel.has_change_output());
    }

    #[test]
    fn keeps_supplied_order() {
        // Largest first would need one input; in-order selection takes all three.
        let utxos = vec![make_utxo(30_000, 0), make_utxo(30_000, 1), make_utxo(500_000, 2)];
        let sel = CoinSelector::select(&utxos, 60_000, 1).unwrap();
        assert_eq!(values(&sel), vec![30_000, 30_000, 500_000]);
    }

    #[test]
    fn fee_reestimated_after_each_input() {
        // 1 input: fee 245, needed 10_245 > 10_200.
        // 2 inputs: fee 393, needed 10_393 > 10_300.
        let utxos = vec![make_utxo(10_200, 0), make_utxo(100, 1), make_utxo(1_000, 2)];
        let sel = CoinSelector::select(&utxos, 10_000, 1).unwrap();
        assert_eq!(sel.selected.len(), 3);
        assert_eq!(sel.fee, FeeEstimator::estimate(3, 2, 1));
    }

    #[test]
    fn exact_cover_has_zero_change() {
        let fee = FeeEstimator::estimate(1, 2, 10);
        let utxos = vec![make_utxo(50_000 + fee, 0)];
        let sel = CoinSelector::select(&utxos, 50_000, 10).unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.effective_fee(), fee);
    }

    // --- Failures ---

    #[test]
    fn insufficient_funds_reports_full_sum() {
        let utxos = vec![make_utxo(1_000, 0), make_utxo(2_000, 1), make_utxo(5_000, 2)];
        let err = CoinSelector::select(&utxos, 8_000, 1).unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                have: 8_000,
                need: 8_000 + FeeEstimator::estimate(3, 2, 1),
            }
        );
    }

    #[test]
    fn empty_set_is_insufficient() {
        let err = CoinSelector::select(&[], 5_000, 10).unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                have: 0,
                need: 5_000 + FeeEstimator::estimate(0, 2, 10),
            }
        );
    }

    #[test]
    fn zero_target_rejected() {
        let utxos = vec![make_utxo(1_000, 0)];
        assert!(matches!(
            CoinSelector::select(&utxos, 0, 10),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    // --- Dust policy ---

    #[test]
    fn change_at_threshold_is_dropped() {
        let fee = FeeEstimator::estimate(1, 2, 10);
        let utxos = vec![make_utxo(100_000 + fee + DUST_THRESHOLD, 0)];
        let sel = CoinSelector::select(&utxos, 100_000, 10).unwrap();
        assert_eq!(sel.change, DUST_THRESHOLD);
        assert!(!sel.has_change_output());
        assert_eq!(sel.effective_fee(), fee + DUST_THRESHOLD);
    }

    #[test]
    fn change_above_threshold_is_kept() {
        let fee = FeeEstimator::estimate(1, 2, 10);
        let utxos = vec![make_utxo(100_000 + fee + DUST_THRESHOLD + 1, 0)];
        let sel = CoinSelector::select(&utxos, 100_000, 10).unwrap();
        assert!(sel.has_change_output());
        assert_eq!(sel.effective_fee(), fee);
    }

    #[test]
    fn deterministic() {
        let utxos: Vec<_> = (0..20).map(|i| make_utxo(5_000 + i as u64 * 7, i)).collect();
        let a = CoinSelector::select(&utxos, 40_000, 3).unwrap();
        let b = CoinSelector::select(&utxos, 40_000, 3).unwrap();
        assert_eq!(a, b);
    }
}
