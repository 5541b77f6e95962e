//! Pay type classification.
//!
//! Maps the boolean flags of a [`PayTypeDefinition`] to inclusion decisions
//! for every downstream calculation, and reports flag combinations that are
//! legally inconsistent.

use serde::{Deserialize, Serialize};

use crate::models::{PayTypeDefinition, PayTypeFlags};

/// A downstream calculation that asks whether a pay type participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionKind {
    /// Hours counted toward the weekly overtime threshold.
    OvertimeHours,
    /// Eligible to be paid at the overtime rate.
    OvertimeRate,
    /// Included in gross pay for deductions.
    GrossPay,
    /// Federal income tax wage base.
    FederalTax,
    /// State income tax wage base.
    StateTax,
    /// Local income tax wage base.
    LocalTax,
    /// Social Security wage base.
    FicaSs,
    /// Medicare wage base.
    Medicare,
    /// FUTA wage base.
    Futa,
    /// SUTA wage base.
    Suta,
    /// SDI wage base.
    Sdi,
    /// 401(k) compensation base.
    Retirement401kBase,
    /// Workers' compensation premium base.
    WorkersComp,
    /// Wages and hours feeding the blended regular rate.
    RegularRate,
    /// Increases the net paycheck.
    NetIncrease,
}

/// The outcome of validating a pay type's flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagValidation {
    /// True when no inconsistency was found.
    pub valid: bool,
    /// One message per inconsistency.
    pub errors: Vec<String>,
}

/// Reports legally inconsistent flag combinations on a pay type.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::validate_pay_type_flags;
/// use payroll_engine::models::{PayCategory, PayTypeDefinition};
///
/// let mut contractor = PayTypeDefinition::new("1099", "Contractor", PayCategory::ContractorPayment);
/// contractor.flags.contractor_1099 = true;
///
/// // Default flags leave FICA, Medicare and W-2 reporting switched on.
/// let validation = validate_pay_type_flags(&contractor);
/// assert!(!validation.valid);
/// assert_eq!(validation.errors.len(), 3);
/// ```
pub fn validate_pay_type_flags(pay_type: &PayTypeDefinition) -> FlagValidation {
    let flags = &pay_type.flags;
    let mut errors = Vec::new();

    if flags.contractor_1099 {
        if flags.fica_taxable {
            errors.push(format!(
                "{}: contractor pay cannot be subject to Social Security",
                pay_type.code
            ));
        }
        if flags.medicare_taxable {
            errors.push(format!(
                "{}: contractor pay cannot be subject to Medicare",
                pay_type.code
            ));
        }
        if flags.w2_reportable {
            errors.push(format!(
                "{}: contractor pay cannot be W-2 reportable",
                pay_type.code
            ));
        }
    }

    if flags.tipped_employee && pay_type.tip_status.is_none() {
        errors.push(format!(
            "{}: tipped employee pay requires a tip status",
            pay_type.code
        ));
    }

    if flags.overtime_rate_eligible && !flags.counts_toward_overtime_hours {
        errors.push(format!(
            "{}: overtime rate eligibility requires hours to count toward overtime",
            pay_type.code
        ));
    }

    if flags.federal_taxable && !flags.includable_in_true_gross {
        errors.push(format!(
            "{}: federally taxable pay must be included in true gross pay",
            pay_type.code
        ));
    }

    FlagValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Returns true if the pay type participates in the given calculation.
///
/// Contractor pay types never take part in overtime or the regular rate,
/// whatever their other flags say.
pub fn should_include_in_calculation(pay_type: &PayTypeDefinition, kind: InclusionKind) -> bool {
    flags_include(&pay_type.flags, kind)
}

/// [`should_include_in_calculation`] for a bare set of flags, as carried by
/// earnings breakdown lines.
pub fn flags_include(flags: &PayTypeFlags, kind: InclusionKind) -> bool {
    match kind {
        InclusionKind::OvertimeHours => {
            !flags.contractor_1099 && flags.counts_toward_overtime_hours
        }
        InclusionKind::OvertimeRate => !flags.contractor_1099 && flags.overtime_rate_eligible,
        InclusionKind::RegularRate => !flags.contractor_1099 && flags.includable_in_regular_rate,
        InclusionKind::GrossPay => flags.includable_in_true_gross,
        InclusionKind::FederalTax => flags.federal_taxable,
        InclusionKind::StateTax => flags.state_taxable,
        InclusionKind::LocalTax => flags.local_taxable,
        InclusionKind::FicaSs => flags.fica_taxable,
        InclusionKind::Medicare => flags.medicare_taxable,
        InclusionKind::Futa => flags.futa_taxable,
        InclusionKind::Suta => flags.suta_taxable,
        InclusionKind::Sdi => flags.sdi_taxable,
        InclusionKind::Retirement401kBase => flags.includable_in_401k_base,
        InclusionKind::WorkersComp => flags.workers_comp_subject,
        InclusionKind::NetIncrease => flags.increases_net_paycheck,
    }
}
