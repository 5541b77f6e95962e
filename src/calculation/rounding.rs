//! Monetary rounding.
//!
//! Intermediate values carry [`INTERNAL_SCALE`] decimal places; only values
//! observed outside the engine are rounded to [`CURRENCY_SCALE`] places.
//! Both use midpoint-away-from-zero so a half cent always rounds up in
//! magnitude.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on intermediate values.
pub const INTERNAL_SCALE: u32 = 4;

/// Decimal places on externally observed amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds an intermediate value to internal precision.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::round_internal;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let value = Decimal::from_str("12.345678").unwrap();
/// assert_eq!(round_internal(value), Decimal::from_str("12.3457").unwrap());
/// ```
pub fn round_internal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(INTERNAL_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a value to cents for output.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::round_currency;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let value = Decimal::from_str("10.125").unwrap();
/// assert_eq!(round_currency(value), Decimal::from_str("10.13").unwrap());
/// ```
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
