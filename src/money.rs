//! Money
//!
//! The engine keeps every amount as integer minor units of a single cart currency. Wire payloads
//! and catalog fixtures speak decimal major units; the helpers here convert between the two.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::iso::{self, Currency};
use thiserror::Error;

/// Errors raised while converting decimal amounts into minor units.
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    /// The currency code is not a known ISO currency.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Prices, fees and caps can never be negative.
    #[error("amount {0} is negative")]
    Negative(Decimal),

    /// The amount does not fit into `i64` minor units.
    #[error("amount {0} cannot be represented in minor units")]
    Unrepresentable(Decimal),
}

/// Look up an ISO currency by its alpha code.
///
/// # Errors
///
/// Returns [`AmountError::UnknownCurrency`] when the code is not recognised.
pub fn currency(code: &str) -> Result<&'static Currency, AmountError> {
    iso::find(code).ok_or_else(|| AmountError::UnknownCurrency(code.to_string()))
}

/// Convert a decimal major-unit amount into minor units, rounding half away from zero.
///
/// # Errors
///
/// Returns an error for negative amounts or amounts that overflow `i64` minor units.
pub fn minor_units(amount: Decimal, currency: &Currency) -> Result<i64, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }

    let scale = scale(currency).ok_or(AmountError::Unrepresentable(amount))?;

    amount
        .checked_mul(Decimal::from(scale))
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_i64())
        .ok_or(AmountError::Unrepresentable(amount))
}

/// Convert minor units back into a decimal major-unit amount.
pub fn major_units(minor: i64, currency: &Currency) -> Decimal {
    Decimal::new(minor, currency.exponent)
}

/// Express a whole number of major units (e.g. `200`) in minor units.
pub fn whole_units(major: i64, currency: &Currency) -> i64 {
    scale(currency).map_or(major, |scale| major.saturating_mul(scale))
}

/// Apply a fractional percentage to a minor-unit amount, rounding half away from zero.
///
/// Returns `None` if the result does not fit into `i64`.
pub fn percent_of_minor(percent: Percentage, minor: i64) -> Option<i64> {
    let applied = percent * Decimal::from(minor);

    applied
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn scale(currency: &Currency) -> Option<i64> {
    10_i64.checked_pow(currency.exponent)
}
