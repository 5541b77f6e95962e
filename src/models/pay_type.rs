//! Pay type definitions and their wage-base flags.
//!
//! A [`PayTypeDefinition`] is externally authored configuration. Every flag
//! has an explicit default (see [`PayTypeFlags::default`]), so a flag that is
//! absent from configuration and a flag set to its default are the same thing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Code of the synthetic pay type used for the overtime premium line.
pub const OVERTIME_PREMIUM_CODE: &str = "OVERTIME_PREMIUM";

/// Broad category of a pay type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayCategory {
    /// Hourly regular time.
    Regular,
    /// Explicit overtime lines.
    Overtime,
    /// Salaried pay.
    Salary,
    /// Bonus pay.
    Bonus,
    /// Sales commission.
    Commission,
    /// Piece-rate pay.
    PieceWork,
    /// Tips reported by tipped employees.
    Tips,
    /// Expense reimbursements.
    Reimbursement,
    /// Payments to 1099 contractors.
    ContractorPayment,
    /// Anything else.
    Other,
}

/// How tips were received, required for tipped-employee pay types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipStatus {
    /// Cash tips reported by the employee.
    Cash,
    /// Tips charged to a card and paid through payroll.
    Charged,
    /// Tips allocated by the employer.
    Allocated,
}

/// The wage-base and behavior flags of a pay type.
///
/// Tax and wage-base inclusion flags default to `true`; opt-in behavioral
/// flags (overtime participation, contractor, tipped, supplemental, net
/// increase) default to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayTypeFlags {
    /// Subject to federal income tax withholding.
    pub federal_taxable: bool,
    /// Subject to state income tax withholding.
    pub state_taxable: bool,
    /// Subject to local income tax withholding.
    pub local_taxable: bool,
    /// Subject to Social Security (FICA OASDI).
    pub fica_taxable: bool,
    /// Subject to Medicare.
    pub medicare_taxable: bool,
    /// Subject to federal unemployment tax.
    pub futa_taxable: bool,
    /// Subject to state unemployment tax.
    pub suta_taxable: bool,
    /// Subject to state disability insurance.
    pub sdi_taxable: bool,
    /// Included in true gross pay.
    pub includable_in_true_gross: bool,
    /// Included in the 401(k) compensation base.
    pub includable_in_401k_base: bool,
    /// Subject to workers' compensation premiums.
    pub workers_comp_subject: bool,
    /// Reported on the W-2.
    pub w2_reportable: bool,
    /// Hours count toward the weekly overtime threshold.
    pub counts_toward_overtime_hours: bool,
    /// May be paid at the overtime rate.
    pub overtime_rate_eligible: bool,
    /// Wages and hours feed the blended regular rate.
    pub includable_in_regular_rate: bool,
    /// Increases the net paycheck.
    pub increases_net_paycheck: bool,
    /// Paid to a 1099 contractor.
    pub contractor_1099: bool,
    /// Paid to a tipped employee.
    pub tipped_employee: bool,
    /// Supplemental wages withheld at the flat supplemental rate.
    pub supplemental: bool,
}

impl Default for PayTypeFlags {
    fn default() -> Self {
        Self {
            federal_taxable: true,
            state_taxable: true,
            local_taxable: true,
            fica_taxable: true,
            medicare_taxable: true,
            futa_taxable: true,
            suta_taxable: true,
            sdi_taxable: true,
            includable_in_true_gross: true,
            includable_in_401k_base: true,
            workers_comp_subject: true,
            w2_reportable: true,
            counts_toward_overtime_hours: false,
            overtime_rate_eligible: false,
            includable_in_regular_rate: false,
            increases_net_paycheck: false,
            contractor_1099: false,
            tipped_employee: false,
            supplemental: false,
        }
    }
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

/// A pay type as configured in the pay type registry.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{PayCategory, PayTypeDefinition};
///
/// let regular = PayTypeDefinition::new("REG", "Regular", PayCategory::Regular);
/// assert!(regular.flags.federal_taxable);
/// assert!(!regular.flags.counts_toward_overtime_hours);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTypeDefinition {
    /// Unique pay type code (e.g., "REG").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Broad category.
    pub category: PayCategory,
    /// Default hourly rate used when an earning line carries none.
    #[serde(default)]
    pub rate: Option<Decimal>,
    /// Default multiplier applied to hours × rate.
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    /// Wage-base and behavior flags.
    #[serde(default)]
    pub flags: PayTypeFlags,
    /// Tip status, required when `flags.tipped_employee` is set.
    #[serde(default)]
    pub tip_status: Option<TipStatus>,
}

impl PayTypeDefinition {
    /// Creates a pay type with default flags, no rate and a multiplier of 1.
    pub fn new(code: impl Into<String>, name: impl Into<String>, category: PayCategory) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category,
            rate: None,
            multiplier: Decimal::ONE,
            flags: PayTypeFlags::default(),
            tip_status: None,
        }
    }

    /// The definition used for an earning line whose pay type is not in the
    /// registry: default flags, so the wages are fully taxable and take no
    /// part in overtime.
    pub fn fallback(code: impl Into<String>) -> Self {
        let code = code.into();
        let name = format!("Unregistered pay type {}", code);
        Self::new(code, name, PayCategory::Other)
    }

    /// The synthetic pay type carrying the overtime premium.
    pub fn overtime_premium() -> Self {
        Self::new(OVERTIME_PREMIUM_CODE, "Overtime premium", PayCategory::Overtime)
    }

    /// Returns a copy with the given flags.
    pub fn with_flags(mut self, flags: PayTypeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns a copy with the given default rate.
    pub fn with_rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_tax_inclusion_true() {
        let flags = PayTypeFlags::default();
        assert!(flags.federal_taxable);
        assert!(flags.state_taxable);
        assert!(flags.fica_taxable);
        assert!(flags.medicare_taxable);
        assert!(flags.includable_in_true_gross);
    }

    #[test]
    fn test_default_flags_behavioral_false() {
        let flags = PayTypeFlags::default();
        assert!(!flags.counts_toward_overtime_hours);
        assert!(!flags.overtime_rate_eligible);
        assert!(!flags.includable_in_regular_rate);
        assert!(!flags.contractor_1099);
        assert!(!flags.tipped_employee);
        assert!(!flags.supplemental);
        assert!(!flags.increases_net_paycheck);
    }

    #[test]
    fn test_absent_flags_deserialize_to_defaults() {
        let json = r#"{
            "code": "REG",
            "name": "Regular",
            "category": "regular",
            "flags": { "counts_toward_overtime_hours": true }
        }"#;

        let pay_type: PayTypeDefinition = serde_json::from_str(json).unwrap();
        assert!(pay_type.flags.counts_toward_overtime_hours);
        assert!(pay_type.flags.federal_taxable);
        assert!(!pay_type.flags.includable_in_regular_rate);
        assert_eq!(pay_type.multiplier, Decimal::ONE);
        assert_eq!(pay_type.rate, None);
    }

    #[test]
    fn test_missing_flags_block_uses_defaults() {
        let json = r#"{ "code": "BONUS", "name": "Bonus", "category": "bonus" }"#;
        let pay_type: PayTypeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(pay_type.flags, PayTypeFlags::default());
    }

    #[test]
    fn test_fallback_is_fully_taxable() {
        let pay_type = PayTypeDefinition::fallback("XYZ");
        assert_eq!(pay_type.code, "XYZ");
        assert_eq!(pay_type.category, PayCategory::Other);
        assert_eq!(pay_type.flags, PayTypeFlags::default());
    }

    #[test]
    fn test_overtime_premium_code() {
        let pay_type = PayTypeDefinition::overtime_premium();
        assert_eq!(pay_type.code, OVERTIME_PREMIUM_CODE);
        assert_eq!(pay_type.category, PayCategory::Overtime);
    }

    #[test]
    fn test_pay_category_serialization() {
        let json = serde_json::to_string(&PayCategory::PieceWork).unwrap();
        assert_eq!(json, "\"piece_work\"");
    }
}
