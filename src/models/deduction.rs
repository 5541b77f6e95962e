//! Deduction definitions and the fixed deduction priority table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The kind of a deduction, which fixes its processing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionType {
    /// Traditional 401(k) contribution.
    Retirement401k,
    /// Traditional 403(b) contribution.
    Retirement403b,
    /// Health savings account.
    Hsa,
    /// Flexible spending account.
    Fsa,
    /// Medical insurance premium.
    HealthInsurance,
    /// Dental insurance premium.
    DentalInsurance,
    /// Vision insurance premium.
    VisionInsurance,
    /// Commuter benefit.
    Commuter,
    /// Wage garnishment.
    Garnishment,
    /// Child support order.
    ChildSupport,
    /// Union dues.
    UnionDues,
    /// Roth 401(k) contribution.
    Roth401k,
    /// Loan repayment.
    LoanRepayment,
    /// Charitable giving.
    Charity,
    /// Anything not in the priority table.
    Other,
}

impl DeductionType {
    /// Processing priority within a deduction's class; lower runs first.
    ///
    /// Pre-tax: 401(k)/403(b) > HSA > FSA > insurance premiums > commuter.
    /// Post-tax: garnishment > child support > union dues > Roth > loan
    /// repayment > charity. Types outside the class table run last.
    pub fn priority(self, is_pre_tax: bool) -> u8 {
        if is_pre_tax {
            match self {
                DeductionType::Retirement401k | DeductionType::Retirement403b => 1,
                DeductionType::Hsa => 2,
                DeductionType::Fsa => 3,
                DeductionType::HealthInsurance
                | DeductionType::DentalInsurance
                | DeductionType::VisionInsurance => 4,
                DeductionType::Commuter => 5,
                _ => 6,
            }
        } else {
            match self {
                DeductionType::Garnishment => 1,
                DeductionType::ChildSupport => 2,
                DeductionType::UnionDues => 3,
                DeductionType::Roth401k => 4,
                DeductionType::LoanRepayment => 5,
                DeductionType::Charity => 6,
                _ => 7,
            }
        }
    }

    /// Returns true for retirement plan contributions, whose percentage is
    /// taken from the 401(k) compensation base.
    pub fn is_retirement(self) -> bool {
        matches!(
            self,
            DeductionType::Retirement401k | DeductionType::Retirement403b | DeductionType::Roth401k
        )
    }
}

/// How a deduction's per-period amount is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DeductionAmount {
    /// A fixed amount per period.
    Flat {
        /// The amount.
        amount: Decimal,
    },
    /// A fraction of the wages remaining when the deduction is processed.
    Percentage {
        /// The fraction (0.10 for 10%).
        rate: Decimal,
    },
}

/// An additional catch-up contribution with its own annual limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpContribution {
    /// Requested catch-up amount for the period.
    pub amount: Decimal,
    /// Annual catch-up limit, if any.
    #[serde(default)]
    pub annual_limit: Option<Decimal>,
    /// Catch-up contributed so far this year.
    #[serde(default)]
    pub current_ytd: Decimal,
}

/// A deduction to apply in the period.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{DeductionAmount, DeductionDefinition, DeductionType};
/// use rust_decimal::Decimal;
///
/// let hsa = DeductionDefinition::new(
///     "HSA",
///     DeductionType::Hsa,
///     DeductionAmount::Flat { amount: Decimal::from(50) },
///     true,
/// );
/// assert_eq!(hsa.priority(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionDefinition {
    /// Deduction code.
    pub code: String,
    /// Deduction type.
    #[serde(rename = "type")]
    pub deduction_type: DeductionType,
    /// Amount calculation.
    pub amount: DeductionAmount,
    /// Whether the deduction is taken before taxes.
    pub is_pre_tax: bool,
    /// Annual limit; when absent, the configured limit for the type applies.
    #[serde(default)]
    pub annual_limit: Option<Decimal>,
    /// Amount deducted so far this year.
    #[serde(default)]
    pub current_ytd: Decimal,
    /// Optional catch-up contribution.
    #[serde(default)]
    pub catch_up: Option<CatchUpContribution>,
    /// Unrecovered amounts from earlier periods.
    #[serde(default)]
    pub arrears_balance: Decimal,
}

impl DeductionDefinition {
    /// Creates a deduction with no limit, no YTD, no catch-up and no arrears.
    pub fn new(
        code: impl Into<String>,
        deduction_type: DeductionType,
        amount: DeductionAmount,
        is_pre_tax: bool,
    ) -> Self {
        Self {
            code: code.into(),
            deduction_type,
            amount,
            is_pre_tax,
            annual_limit: None,
            current_ytd: Decimal::ZERO,
            catch_up: None,
            arrears_balance: Decimal::ZERO,
        }
    }

    /// Returns a copy with the given annual limit and year-to-date amount.
    pub fn with_limit(mut self, annual_limit: Decimal, current_ytd: Decimal) -> Self {
        self.annual_limit = Some(annual_limit);
        self.current_ytd = current_ytd;
        self
    }

    /// Processing priority within this deduction's class.
    pub fn priority(&self) -> u8 {
        self.deduction_type.priority(self.is_pre_tax)
    }
}
