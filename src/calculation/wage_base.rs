//! Taxable wage bases.
//!
//! Each tax type's base is derived independently from the pay type flags of
//! the earnings breakdown, then reduced by total pre-tax deductions and
//! floored at zero. Annual caps and thresholds are applied against the
//! year-to-date figure so a cap crossed mid-period taxes only the part below
//! it.

use rust_decimal::Decimal;

use crate::models::{EarningsLineDetail, TaxableWages, YtdSnapshot};

use super::classifier::{InclusionKind, flags_include};

/// Sums the amounts of the lines that participate in `kind`.
pub fn sum_included(breakdown: &[EarningsLineDetail], kind: InclusionKind) -> Decimal {
    breakdown
        .iter()
        .filter(|line| includes(line, kind))
        .map(|line| line.amount)
        .sum()
}

fn includes(line: &EarningsLineDetail, kind: InclusionKind) -> bool {
    flags_include(&line.flags, kind)
}

/// Derives every taxable wage base for the period.
///
/// The supplemental part of the federal base is the federally taxable
/// supplemental wages, bounded by the reduced federal base so pre-tax
/// deductions come off regular wages first.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::derive_taxable_wages;
/// use payroll_engine::models::{EarningsLineDetail, PayCategory, PayTypeFlags};
/// use rust_decimal::Decimal;
///
/// let breakdown = vec![EarningsLineDetail {
///     pay_type_code: "SAL".to_string(),
///     category: PayCategory::Salary,
///     hours: Decimal::ZERO,
///     rate: None,
///     multiplier: Decimal::ONE,
///     amount: Decimal::from(2000),
///     flags: PayTypeFlags::default(),
/// }];
/// let bases = derive_taxable_wages(&breakdown, Decimal::from(150));
/// assert_eq!(bases.federal, Decimal::from(1850));
/// assert_eq!(bases.social_security, Decimal::from(1850));
/// ```
pub fn derive_taxable_wages(breakdown: &[EarningsLineDetail], pre_tax_total: Decimal) -> TaxableWages {
    let base = |kind| reduce(sum_included(breakdown, kind), pre_tax_total);

    let federal = base(InclusionKind::FederalTax);
    let supplemental_gross: Decimal = breakdown
        .iter()
        .filter(|line| line.flags.supplemental && includes(line, InclusionKind::FederalTax))
        .map(|line| line.amount)
        .sum();

    TaxableWages {
        federal,
        federal_supplemental: supplemental_gross.min(federal),
        state: base(InclusionKind::StateTax),
        local: base(InclusionKind::LocalTax),
        social_security: base(InclusionKind::FicaSs),
        medicare: base(InclusionKind::Medicare),
        futa: base(InclusionKind::Futa),
        suta: base(InclusionKind::Suta),
        sdi: base(InclusionKind::Sdi),
    }
}

fn reduce(gross: Decimal, pre_tax_total: Decimal) -> Decimal {
    (gross - pre_tax_total).max(Decimal::ZERO)
}

/// The part of `current` wages below an annual cap, given `ytd` wages:
/// `min(ytd + current, cap) − min(ytd, cap)`.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::capped_wages;
/// use rust_decimal::Decimal;
///
/// let cap = Some(Decimal::from(168_600));
/// assert_eq!(capped_wages(Decimal::from(168_000), Decimal::from(1000), cap), Decimal::from(600));
/// assert_eq!(capped_wages(Decimal::from(170_000), Decimal::from(1000), cap), Decimal::ZERO);
/// ```
pub fn capped_wages(ytd: Decimal, current: Decimal, cap: Option<Decimal>) -> Decimal {
    match cap {
        None => current,
        Some(cap) => ((ytd + current).min(cap) - ytd.min(cap)).max(Decimal::ZERO),
    }
}

/// The part of `current` wages above a threshold, given `ytd` wages:
/// `max(ytd + current − threshold, 0) − max(ytd − threshold, 0)`.
pub fn threshold_excess(ytd: Decimal, current: Decimal, threshold: Decimal) -> Decimal {
    let total_excess = (ytd + current - threshold).max(Decimal::ZERO);
    let prior_excess = (ytd - threshold).max(Decimal::ZERO);
    (total_excess - prior_excess).max(Decimal::ZERO)
}

/// Year-to-date wages after adding this period's bases, used as the
/// starting point for corrections to the period.
pub fn advance_ytd(ytd: &YtdSnapshot, gross: Decimal, bases: &TaxableWages) -> YtdSnapshot {
    YtdSnapshot {
        gross_wages: ytd.gross_wages + gross,
        federal_taxable_wages: ytd.federal_taxable_wages + bases.federal,
        state_taxable_wages: ytd.state_taxable_wages + bases.state,
        local_taxable_wages: ytd.local_taxable_wages + bases.local,
        social_security_wages: ytd.social_security_wages + bases.social_security,
        medicare_wages: ytd.medicare_wages + bases.medicare,
        futa_wages: ytd.futa_wages + bases.futa,
        suta_wages: ytd.suta_wages + bases.suta,
        sdi_wages: ytd.sdi_wages + bases.sdi,
    }
}
