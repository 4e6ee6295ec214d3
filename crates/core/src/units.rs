//! USDC smallest-unit conversion.
//!
//! Amounts are carried as integers in 6-decimal smallest units everywhere;
//! parsing and formatting are exact (no float round-trips).

use thiserror::Error;

use crate::types::Amount;

/// USDC has 6 decimals
pub const USDC_DECIMALS: u32 = 6;

const UNIT: u64 = 10u64.pow(USDC_DECIMALS);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    Invalid(String),

    #[error("Too many decimal places (max 6): {0}")]
    TooManyDecimals(String),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),
}

/// Parse a human-readable USDC amount ("25", "0.50") into smallest units.
pub fn parse_usdc(input: &str) -> Result<Amount, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Invalid(input.to_string()));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || (whole.is_empty() && frac.is_empty())
    {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if frac.len() > USDC_DECIMALS as usize {
        return Err(AmountError::TooManyDecimals(input.to_string()));
    }

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| AmountError::OutOfRange(input.to_string()))?
    };

    let mut frac_units = 0u64;
    if !frac.is_empty() {
        frac_units = frac
            .parse::<u64>()
            .map_err(|_| AmountError::Invalid(input.to_string()))?;
        frac_units *= 10u64.pow(USDC_DECIMALS - frac.len() as u32);
    }

    whole_units
        .checked_mul(UNIT)
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(|| AmountError::OutOfRange(input.to_string()))
}

/// Format smallest units as a human-readable USDC amount with two
/// decimal places ("50.00", "0.12").
pub fn format_usdc(amount: Amount) -> String {
    let whole = amount / UNIT;
    let cents = (amount % UNIT) / (UNIT / 100);
    format!("{whole}.{cents:02}")
}
