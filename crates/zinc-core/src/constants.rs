//! Protocol constants. All monetary values in zatoshis (1 ZEC = 10^8 zatoshis).

pub const COIN: u64 = 100_000_000;

/// Upper bound on any single amount (21M ZEC).
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Outputs at or below this value are not worth creating; change this small
/// is folded into the fee.
pub const DUST_THRESHOLD: u64 = 10_000;

/// Smallest amount the wallet service will send.
pub const MIN_SEND_AMOUNT: u64 = 1_000;

/// Default fee rate in zatoshis per estimated byte.
pub const DEFAULT_FEE_RATE: u64 = 10;

// --- Address prefixes ---

/// Mainnet P2PKH prefix (`t1...`).
pub const MAINNET_P2PKH_PREFIX: [u8; 2] = [0x1C, 0xB8];
/// Mainnet P2SH prefix (`t3...`).
pub const MAINNET_P2SH_PREFIX: [u8; 2] = [0x1C, 0xBD];
/// Testnet P2PKH prefix (`tm...`).
pub const TESTNET_P2PKH_PREFIX: [u8; 2] = [0x1D, 0x25];
/// Testnet P2SH prefix (`t2...`).
pub const TESTNET_P2SH_PREFIX: [u8; 2] = [0x1C, 0xBA];

/// ZIP-320 human-readable part for mainnet TEX addresses.
pub const TEX_HRP_MAINNET: &str = "tex";
/// ZIP-320 human-readable part for testnet TEX addresses.
pub const TEX_HRP_TESTNET: &str = "textest";

/// Accepted total length range for TEX address strings.
pub const TEX_MIN_LEN: usize = 40;
pub const TEX_MAX_LEN: usize = 90;

/// WIF version byte on mainnet and testnet.
pub const WIF_MAINNET_PREFIX: u8 = 0x80;
pub const WIF_TESTNET_PREFIX: u8 = 0xEF;

// --- Transaction format (v4, Sapling) ---

/// `fOverwintered | 4`.
pub const TX_V4_HEADER: u32 = 0x8000_0004;
/// Sapling version group id.
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;
/// NU6 consensus branch id.
pub const NU6_BRANCH_ID: u32 = 0xC8E7_1055;
/// NU6.1 consensus branch id.
pub const NU6_1_BRANCH_ID: u32 = 0x4DEC_4DF0;
/// Consensus branch id committed to by the signature hash.
///
/// Signatures are only valid under the branch active at the height the
/// transaction is mined. Deployments override this after a network upgrade.
pub const DEFAULT_BRANCH_ID: u32 = NU6_1_BRANCH_ID;
/// Final sequence number; no relative lock time.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;
/// SIGHASH_ALL.
pub const SIGHASH_ALL: u8 = 0x01;

/// Zero means no expiry.
pub const DEFAULT_EXPIRY_HEIGHT: u32 = 0;

/// Parse a consensus branch id written as hex, with or without `0x`.
pub fn parse_branch_id(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dust_threshold_above_min_send() {
        assert!(DUST_THRESHOLD > MIN_SEND_AMOUNT);
    }

    #[test]
    fn max_money_fits_i64() {
        assert!(MAX_MONEY <= i64::MAX as u64);
    }

    #[test]
    fn branch_id_parses_hex() {
        assert_eq!(parse_branch_id("0x4dec4df0"), Some(NU6_1_BRANCH_ID));
        assert_eq!(parse_branch_id("C8E71055"), Some(NU6_BRANCH_ID));
        assert_eq!(parse_branch_id(" 0X4DEC4DF0 "), Some(NU6_1_BRANCH_ID));
        assert_eq!(parse_branch_id(""), None);
        assert_eq!(parse_branch_id("0x"), None);
        assert_eq!(parse_branch_id("0x1_0000_0000"), None);
        assert_eq!(parse_branch_id("4dec4df0ff"), None);
        assert_eq!(parse_branch_id("nu6"), None);
        assert_eq!(parse_branch_id("+4dec4df"), None);
    }

    #[test]
    fn tex_hrps_fit_length_bounds() {
        // hrp + '1' + 32 data chars + 6 checksum chars
        assert!(TEX_HRP_MAINNET.len() + 39 >= TEX_MIN_LEN);
        assert!(TEX_HRP_TESTNET.len() + 39 <= TEX_MAX_LEN);
    }
}
