//! Conversion between decimal coin strings and integer zatoshis.
//!
//! Amounts are never represented as floating point. Extra fractional digits
//! beyond the eighth are truncated, not rounded.

use crate::constants::{COIN, MAX_MONEY};
use crate::error::AmountError;

const DECIMALS: usize = 8;

/// Parse a decimal coin amount (`"0.01"`, `"12"`, `".5"`) into zatoshis.
pub fn parse_coins(s: &str) -> Result<u64, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Invalid(s.to_string()));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::OutOfRange)?
    };

    let mut frac_digits: String = frac.chars().take(DECIMALS).collect();
    while frac_digits.len() < DECIMALS {
        frac_digits.push('0');
    }
    let frac: u64 = frac_digits
        .parse()
        .map_err(|_| AmountError::Invalid(s.to_string()))?;

    let total = whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac))
        .ok_or(AmountError::OutOfRange)?;
    if total > MAX_MONEY {
        return Err(AmountError::OutOfRange);
    }
    Ok(total)
}

/// Format zatoshis as a fixed 8-decimal coin string.
pub fn format_coins(zatoshis: u64) -> String {
    format!("{}.{:08}", zatoshis / COIN, zatoshis % COIN)
}
