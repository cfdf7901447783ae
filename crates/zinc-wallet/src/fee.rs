//! Size-based fee estimation.
//!
//! Sizes are typical for transparent v4 transactions spending compressed-key
//! P2PKH outputs. The estimate is allowed to differ slightly from the final
//! serialized size; selection is never re-run to reconcile the two.

/// Fixed transaction overhead: header, version group, input/output counts,
/// lock time, expiry height, value balance, and the empty shielded vectors.
pub const BASE_OVERHEAD_BYTES: u64 = 29;

/// Signed P2PKH input: outpoint (36), scriptSig length (1), DER signature
/// with hash type (up to 73) and compressed pubkey (34) pushes, sequence (4).
pub const PER_INPUT_BYTES: u64 = 148;

/// P2PKH output: value (8), script length (1), script (25).
pub const PER_OUTPUT_BYTES: u64 = 34;

pub struct FeeEstimator;

impl FeeEstimator {
    /// Estimated serialized size in bytes.
    pub fn estimate_size(input_count: usize, output_count: usize) -> u64 {
        BASE_OVERHEAD_BYTES
            .saturating_add(PER_INPUT_BYTES.saturating_mul(input_count as u64))
            .saturating_add(PER_OUTPUT_BYTES.saturating_mul(output_count as u64))
    }

    /// Estimated fee in zatoshis at `fee_rate` zatoshis per byte.
    pub fn estimate(input_count: usize, output_count: usize, fee_rate: u64) -> u64 {
        Self::estimate_size(input_count, output_count).saturating_mul(fee_rate)
    }
}
