//! Earning line model.
//!
//! Earning lines are supplied by the timecard/earnings subsystem. Each line
//! names a pay type and carries either hours (with an optional rate and
//! multiplier override) or a flat amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayTypeDefinition;

/// A single line of earnings for the pay period.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{EarningLine, PayCategory, PayTypeDefinition};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let line = EarningLine::hourly("REG", Decimal::from(40), Decimal::from_str("22.50").unwrap());
/// let pay_type = PayTypeDefinition::new("REG", "Regular", PayCategory::Regular);
/// assert_eq!(line.amount(&pay_type), Some(Decimal::from(900)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningLine {
    /// The pay type code of this line.
    #[serde(rename = "type")]
    pub pay_type: String,
    /// Hours worked.
    #[serde(default)]
    pub hours: Decimal,
    /// Hourly rate; falls back to the pay type's default rate.
    #[serde(default)]
    pub rate: Option<Decimal>,
    /// Flat amount; takes precedence over hours × rate.
    #[serde(default)]
    pub flat_amount: Option<Decimal>,
    /// Multiplier; falls back to the pay type's multiplier.
    #[serde(default)]
    pub multiplier: Option<Decimal>,
}

impl EarningLine {
    /// Creates an hourly line.
    pub fn hourly(pay_type: impl Into<String>, hours: Decimal, rate: Decimal) -> Self {
        Self {
            pay_type: pay_type.into(),
            hours,
            rate: Some(rate),
            flat_amount: None,
            multiplier: None,
        }
    }

    /// Creates a flat-amount line with no hours.
    pub fn flat(pay_type: impl Into<String>, amount: Decimal) -> Self {
        Self {
            pay_type: pay_type.into(),
            hours: Decimal::ZERO,
            rate: None,
            flat_amount: Some(amount),
            multiplier: None,
        }
    }

    /// The rate that applies to this line, if any.
    pub fn effective_rate(&self, pay_type: &PayTypeDefinition) -> Option<Decimal> {
        self.rate.or(pay_type.rate)
    }

    /// The multiplier that applies to this line.
    pub fn effective_multiplier(&self, pay_type: &PayTypeDefinition) -> Decimal {
        self.multiplier.unwrap_or(pay_type.multiplier)
    }

    /// The unrounded amount of this line: the flat amount when present,
    /// otherwise hours × rate × multiplier. `None` when neither a flat amount
    /// nor any rate is available.
    pub fn amount(&self, pay_type: &PayTypeDefinition) -> Option<Decimal> {
        if let Some(flat) = self.flat_amount {
            return Some(flat);
        }
        let rate = self.effective_rate(pay_type)?;
        Some(self.hours * rate * self.effective_multiplier(pay_type))
    }
}
