//! Deduction sequencing with annual limit tracking.
//!
//! Deductions are processed pre-tax before post-tax, then by the fixed
//! priority table of [`DeductionType::priority`], ties by input order. Each
//! one is computed against a running "remaining wages" balance, so a later
//! percentage deduction is based on what earlier deductions left behind.
//!
//! [`DeductionType::priority`]: crate::models::DeductionType::priority

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::models::{
    AuditStep, CatchUpContribution, DeductionAmount, DeductionDefinition, DeductionLineDetail,
    DeductionType, EarningsLineDetail,
};

use super::classifier::InclusionKind;
use super::rounding::round_internal;
use super::wage_base::sum_included;

/// Configured annual limits used when a definition carries none.
#[derive(Debug, Clone, Copy)]
pub struct DeductionLimits<'a> {
    /// Base contribution limits by type.
    pub annual: &'a BTreeMap<DeductionType, Decimal>,
    /// Catch-up limits by type.
    pub catch_up: &'a BTreeMap<DeductionType, Decimal>,
}

/// The result of the deductions calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionsResult {
    /// Total pre-tax deductions.
    pub pre_tax_total: Decimal,
    /// Total post-tax deductions.
    pub post_tax_total: Decimal,
    /// Deductions in processing order.
    pub breakdown: Vec<DeductionLineDetail>,
    /// Gross pay re-derived from the gross-pay inclusion flag.
    pub adjusted_gross_pay: Decimal,
    /// Audit step recording the computation.
    pub audit_step: AuditStep,
}

/// The outcome of clamping an amount to an annual limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitedAmount {
    /// Amount allowed this period.
    pub amount: Decimal,
    /// Limit left after this period, when limited.
    pub remaining: Option<Decimal>,
    /// Whether the request was reduced.
    pub limited: bool,
}

/// Clamps `requested` to `max(0, limit − ytd)`.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::apply_annual_limit;
/// use rust_decimal::Decimal;
///
/// let clamped = apply_annual_limit(Decimal::from(50), Some(Decimal::from(500)), Decimal::from(480));
/// assert_eq!(clamped.amount, Decimal::from(20));
/// assert_eq!(clamped.remaining, Some(Decimal::ZERO));
/// assert!(clamped.limited);
/// ```
pub fn apply_annual_limit(
    requested: Decimal,
    annual_limit: Option<Decimal>,
    current_ytd: Decimal,
) -> LimitedAmount {
    match annual_limit {
        None => LimitedAmount {
            amount: requested,
            remaining: None,
            limited: false,
        },
        Some(limit) => {
            let available = (limit - current_ytd).max(Decimal::ZERO);
            let amount = requested.min(available);
            LimitedAmount {
                amount,
                remaining: Some(available - amount),
                limited: amount < requested,
            }
        }
    }
}

/// Computes the catch-up contribution allowed this period.
///
/// The catch-up has its own annual limit (from the contribution, else
/// `default_limit`); a pre-tax catch-up is also bounded by `capacity`.
pub fn apply_catch_up(
    catch_up: &CatchUpContribution,
    default_limit: Option<Decimal>,
    capacity: Decimal,
    is_pre_tax: bool,
) -> Decimal {
    let limit = catch_up.annual_limit.or(default_limit);
    let mut amount = apply_annual_limit(catch_up.amount, limit, catch_up.current_ytd).amount;
    if is_pre_tax {
        amount = amount.min(capacity.max(Decimal::ZERO));
    }
    amount.max(Decimal::ZERO)
}

/// How a period's capacity was split between the current amount and arrears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrearsRecovery {
    /// Current-period amount taken.
    pub current: Decimal,
    /// Arrears recovered.
    pub recovered: Decimal,
    /// Arrears carried to the next period.
    pub carried_forward: Decimal,
}

/// Splits `capacity` between the current amount (first) and the arrears
/// backlog, carrying whatever is not recovered forward.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::recover_arrears;
/// use rust_decimal::Decimal;
///
/// let recovery = recover_arrears(Decimal::from(100), Decimal::from(80), Decimal::from(150));
/// assert_eq!(recovery.current, Decimal::from(100));
/// assert_eq!(recovery.recovered, Decimal::from(50));
/// assert_eq!(recovery.carried_forward, Decimal::from(30));
/// ```
pub fn recover_arrears(current: Decimal, arrears: Decimal, capacity: Decimal) -> ArrearsRecovery {
    let capacity = capacity.max(Decimal::ZERO);
    let current_taken = current.min(capacity);
    let recovered = arrears.min(capacity - current_taken);
    ArrearsRecovery {
        current: current_taken,
        recovered,
        carried_forward: arrears - recovered,
    }
}

/// Orders deductions pre-tax first, then by priority; the sort is stable so
/// ties keep input order.
pub fn sort_deductions(deductions: &[DeductionDefinition]) -> Vec<&DeductionDefinition> {
    let mut ordered: Vec<&DeductionDefinition> = deductions.iter().collect();
    ordered.sort_by_key(|deduction| (!deduction.is_pre_tax, deduction.priority()));
    ordered
}

/// Calculates pre- and post-tax deductions.
///
/// `adjusted_gross_pay` is re-derived from `breakdown` using the gross-pay
/// inclusion flag, and the running balance starts from it. Percentage
/// retirement contributions are further bounded by the 401(k) compensation
/// base.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{DeductionLimits, calculate_deductions};
/// use payroll_engine::models::{
///     DeductionAmount, DeductionDefinition, DeductionType, EarningsLineDetail, PayCategory,
///     PayTypeFlags,
/// };
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let breakdown = vec![EarningsLineDetail {
///     pay_type_code: "SAL".to_string(),
///     category: PayCategory::Salary,
///     hours: Decimal::ZERO,
///     rate: None,
///     multiplier: Decimal::ONE,
///     amount: Decimal::from(1000),
///     flags: PayTypeFlags::default(),
/// }];
/// let ten_percent = DeductionAmount::Percentage { rate: Decimal::new(10, 2) };
/// let deductions = vec![
///     DeductionDefinition::new("FSA", DeductionType::Fsa, ten_percent, true),
///     DeductionDefinition::new("401K", DeductionType::Retirement401k, ten_percent, true),
/// ];
/// let empty = BTreeMap::new();
/// let limits = DeductionLimits { annual: &empty, catch_up: &empty };
///
/// let result = calculate_deductions(&deductions, Decimal::from(1000), &breakdown, limits, 1);
/// assert_eq!(result.breakdown[0].code, "401K");
/// assert_eq!(result.breakdown[0].amount, Decimal::from(100));
/// assert_eq!(result.breakdown[1].amount, Decimal::from(90));
/// ```
pub fn calculate_deductions(
    deductions: &[DeductionDefinition],
    gross_pay: Decimal,
    breakdown: &[EarningsLineDetail],
    limits: DeductionLimits<'_>,
    step_number: u32,
) -> DeductionsResult {
    let adjusted_gross_pay = sum_included(breakdown, InclusionKind::GrossPay);
    let retirement_base = sum_included(breakdown, InclusionKind::Retirement401kBase);

    let mut remaining = adjusted_gross_pay;
    let mut pre_tax_total = Decimal::ZERO;
    let mut post_tax_total = Decimal::ZERO;
    let mut details = Vec::with_capacity(deductions.len());

    for deduction in sort_deductions(deductions) {
        let available = remaining.max(Decimal::ZERO);

        let requested = match deduction.amount {
            DeductionAmount::Flat { amount } => amount,
            DeductionAmount::Percentage { rate } => {
                let base = if deduction.deduction_type.is_retirement() {
                    available.min(retirement_base)
                } else {
                    available
                };
                round_internal(base * rate)
            }
        };

        let limit = deduction
            .annual_limit
            .or_else(|| limits.annual.get(&deduction.deduction_type).copied());
        let clamped = apply_annual_limit(requested, limit, deduction.current_ytd);
        let mut amount = clamped.amount;
        let mut limited = clamped.limited;

        if deduction.is_pre_tax && amount > available {
            amount = available;
            limited = true;
        }

        // Only pre-tax amounts are held to available wages. A post-tax overdraw
        // is kept and flagged by validation; arrears come from what is left.
        let (amount, arrears_recovered, arrears_carried_forward) =
            if deduction.arrears_balance > Decimal::ZERO {
                let capacity = available.max(amount);
                let recovery = recover_arrears(amount, deduction.arrears_balance, capacity);
                (recovery.current, recovery.recovered, recovery.carried_forward)
            } else {
                (amount, Decimal::ZERO, Decimal::ZERO)
            };

        let catch_up_amount = deduction
            .catch_up
            .as_ref()
            .map(|catch_up| {
                apply_catch_up(
                    catch_up,
                    limits.catch_up.get(&deduction.deduction_type).copied(),
                    available - amount - arrears_recovered,
                    deduction.is_pre_tax,
                )
            })
            .unwrap_or(Decimal::ZERO);

        let remaining_annual_limit =
            limit.map(|limit| (limit - deduction.current_ytd - amount).max(Decimal::ZERO));

        let line = DeductionLineDetail {
            code: deduction.code.clone(),
            deduction_type: deduction.deduction_type,
            is_pre_tax: deduction.is_pre_tax,
            priority: deduction.priority(),
            requested_amount: requested,
            amount,
            catch_up_amount,
            arrears_recovered,
            arrears_carried_forward,
            remaining_annual_limit,
            limited,
        };

        let total = line.total();
        remaining -= total;
        if deduction.is_pre_tax {
            pre_tax_total += total;
        } else {
            post_tax_total += total;
        }
        details.push(line);
    }

    let audit_step = AuditStep {
        step_number,
        rule_id: "deductions".to_string(),
        rule_name: "Deduction Sequencing".to_string(),
        reference: "deduction priority table".to_string(),
        input: json!({
            "gross_pay": gross_pay.normalize().to_string(),
            "adjusted_gross_pay": adjusted_gross_pay.normalize().to_string(),
            "deductions": deductions.len(),
        }),
        output: json!({
            "pre_tax_total": pre_tax_total.normalize().to_string(),
            "post_tax_total": post_tax_total.normalize().to_string(),
            "order": details.iter().map(|line| json!({
                "code": line.code,
                "amount": line.total().normalize().to_string(),
                "limited": line.limited,
            })).collect::<Vec<_>>(),
        }),
        reasoning: format!(
            "Applied {} deduction(s) against adjusted gross ${}: pre-tax ${}, post-tax ${}",
            details.len(),
            adjusted_gross_pay.normalize(),
            pre_tax_total.normalize(),
            post_tax_total.normalize()
        ),
    };

    DeductionsResult {
        pre_tax_total,
        post_tax_total,
        breakdown: details,
        adjusted_gross_pay,
        audit_step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayCategory, PayTypeFlags};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(amount: &str, flags: PayTypeFlags) -> EarningsLineDetail {
        EarningsLineDetail {
            pay_type_code: "REG".to_string(),
            category: PayCategory::Regular,
            hours: Decimal::ZERO,
            rate: None,
            multiplier: Decimal::ONE,
            amount: dec(amount),
            flags,
        }
    }

    fn salary(amount: &str) -> Vec<EarningsLineDetail> {
        vec![line(amount, PayTypeFlags::default())]
    }

    fn percent(rate: &str) -> DeductionAmount {
        DeductionAmount::Percentage { rate: dec(rate) }
    }

    fn flat(amount: &str) -> DeductionAmount {
        DeductionAmount::Flat { amount: dec(amount) }
    }

    fn run(deductions: &[DeductionDefinition], breakdown: &[EarningsLineDetail]) -> DeductionsResult {
        let empty = BTreeMap::new();
        let limits = DeductionLimits {
            annual: &empty,
            catch_up: &empty,
        };
        calculate_deductions(deductions, dec("1000"), breakdown, limits, 1)
    }

    // ==========================================================================
    // Ordering
    // ==========================================================================

    #[test]
    fn test_percentage_applies_to_remaining_wages() {
        let deductions = vec![
            DeductionDefinition::new("401K", DeductionType::Retirement401k, percent("0.10"), true),
            DeductionDefinition::new("FSA", DeductionType::Fsa, percent("0.10"), true),
        ];
        let result = run(&deductions, &salary("1000"));

        assert_eq!(result.breakdown[0].amount, dec("100"));
        assert_eq!(result.breakdown[1].amount, dec("90"));
        assert_eq!(result.pre_tax_total, dec("190"));
    }

    #[test]
    fn test_pre_tax_sorted_before_post_tax() {
        let deductions = vec![
            DeductionDefinition::new("GARN", DeductionType::Garnishment, flat("50"), false),
            DeductionDefinition::new("MED", DeductionType::HealthInsurance, flat("80"), true),
            DeductionDefinition::new("HSA", DeductionType::Hsa, flat("40"), true),
        ];
        let result = run(&deductions, &salary("1000"));
        let codes: Vec<&str> = result.breakdown.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["HSA", "MED", "GARN"]);
        assert_eq!(result.pre_tax_total, dec("120"));
        assert_eq!(result.post_tax_total, dec("50"));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let deductions = vec![
            DeductionDefinition::new("DENTAL", DeductionType::DentalInsurance, flat("10"), true),
            DeductionDefinition::new("VISION", DeductionType::VisionInsurance, flat("5"), true),
            DeductionDefinition::new("MED", DeductionType::HealthInsurance, flat("80"), true),
        ];
        let result = run(&deductions, &salary("1000"));
        let codes: Vec<&str> = result.breakdown.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["DENTAL", "VISION", "MED"]);
    }

    // ==========================================================================
    // Limits
    // ==========================================================================

    #[test]
    fn test_annual_limit_clamps_to_remaining_balance() {
        let deductions = vec![
            DeductionDefinition::new("HSA", DeductionType::Hsa, flat("50"), true)
                .with_limit(dec("500"), dec("480")),
        ];
        let result = run(&deductions, &salary("1000"));
        let hsa = &result.breakdown[0];
        assert_eq!(hsa.amount, dec("20"));
        assert_eq!(hsa.remaining_annual_limit, Some(dec("0")));
        assert!(hsa.limited);
    }

    #[test]
    fn test_limit_already_reached_yields_zero() {
        let deductions = vec![
            DeductionDefinition::new("HSA", DeductionType::Hsa, flat("50"), true)
                .with_limit(dec("500"), dec("600")),
        ];
        let result = run(&deductions, &salary("1000"));
        assert_eq!(result.breakdown[0].amount, Decimal::ZERO);
    }

    #[test]
    fn test_configured_limit_used_when_definition_has_none() {
        let mut annual = BTreeMap::new();
        annual.insert(DeductionType::Fsa, dec("3200"));
        let empty = BTreeMap::new();
        let limits = DeductionLimits {
            annual: &annual,
            catch_up: &empty,
        };
        let mut fsa = DeductionDefinition::new("FSA", DeductionType::Fsa, flat("200"), true);
        fsa.current_ytd = dec("3100");

        let result = calculate_deductions(&[fsa], dec("1000"), &salary("1000"), limits, 1);
        assert_eq!(result.breakdown[0].amount, dec("100"));
        assert_eq!(result.breakdown[0].remaining_annual_limit, Some(dec("0")));
    }

    #[test]
    fn test_pre_tax_cannot_exceed_remaining_wages() {
        let deductions = vec![
            DeductionDefinition::new("401K", DeductionType::Retirement401k, flat("300"), true),
            DeductionDefinition::new("MED", DeductionType::HealthInsurance, flat("300"), true),
        ];
        let result = run(&deductions, &salary("400"));
        assert_eq!(result.breakdown[0].amount, dec("300"));
        assert_eq!(result.breakdown[1].amount, dec("100"));
        assert!(result.breakdown[1].limited);
    }

    #[test]
    fn test_post_tax_not_capped_by_wages() {
        let deductions = vec![DeductionDefinition::new(
            "LOAN",
            DeductionType::LoanRepayment,
            flat("600"),
            false,
        )];
        let result = run(&deductions, &salary("400"));
        assert_eq!(result.post_tax_total, dec("600"));
    }

    #[test]
    fn test_post_tax_with_arrears_keeps_current_amount() {
        let mut with_arrears =
            DeductionDefinition::new("GARN", DeductionType::Garnishment, flat("600"), false);
        with_arrears.arrears_balance = dec("200");
        let without_arrears =
            DeductionDefinition::new("GARN", DeductionType::Garnishment, flat("600"), false);

        let with = run(&[with_arrears], &salary("400"));
        let without = run(&[without_arrears], &salary("400"));

        let line = &with.breakdown[0];
        assert_eq!(line.amount, dec("600"));
        assert_eq!(line.arrears_recovered, Decimal::ZERO);
        assert_eq!(line.arrears_carried_forward, dec("200"));
        assert!(!line.limited);
        assert_eq!(with.post_tax_total, without.post_tax_total);
    }

    #[test]
    fn test_post_tax_arrears_recovered_from_leftover_wages() {
        let mut deduction =
            DeductionDefinition::new("GARN", DeductionType::Garnishment, flat("300"), false);
        deduction.arrears_balance = dec("200");
        let result = run(&[deduction], &salary("400"));
        let line = &result.breakdown[0];
        assert_eq!(line.amount, dec("300"));
        assert_eq!(line.arrears_recovered, dec("100"));
        assert_eq!(line.arrears_carried_forward, dec("100"));
        assert_eq!(result.post_tax_total, dec("400"));
    }

    // ==========================================================================
    // Adjusted gross and retirement base
    // ==========================================================================

    #[test]
    fn test_adjusted_gross_excludes_non_gross_pay_types() {
        let reimbursement = PayTypeFlags {
            includable_in_true_gross: false,
            federal_taxable: false,
            ..PayTypeFlags::default()
        };
        let breakdown = vec![
            line("1000", PayTypeFlags::default()),
            line("200", reimbursement),
        ];
        let deductions = vec![DeductionDefinition::new(
            "FSA",
            DeductionType::Fsa,
            percent("0.10"),
            true,
        )];
        let result = run(&deductions, &breakdown);
        assert_eq!(result.adjusted_gross_pay, dec("1000"));
        assert_eq!(result.breakdown[0].amount, dec("100"));
    }

    #[test]
    fn test_retirement_percentage_uses_401k_base() {
        let bonus = PayTypeFlags {
            includable_in_401k_base: false,
            ..PayTypeFlags::default()
        };
        let breakdown = vec![line("1000", PayTypeFlags::default()), line("500", bonus)];
        let deductions = vec![DeductionDefinition::new(
            "401K",
            DeductionType::Retirement401k,
            percent("0.10"),
            true,
        )];
        let result = run(&deductions, &breakdown);
        assert_eq!(result.breakdown[0].amount, dec("100"));
    }

    // ==========================================================================
    // Catch-up and arrears
    // ==========================================================================

    #[test]
    fn test_catch_up_uses_its_own_limit() {
        let mut deduction =
            DeductionDefinition::new("401K", DeductionType::Retirement401k, flat("500"), true)
                .with_limit(dec("23000"), dec("22800"));
        deduction.catch_up = Some(CatchUpContribution {
            amount: dec("300"),
            annual_limit: Some(dec("7500")),
            current_ytd: dec("7400"),
        });
        let result = run(&[deduction], &salary("2000"));
        let line = &result.breakdown[0];
        assert_eq!(line.amount, dec("200"));
        assert_eq!(line.catch_up_amount, dec("100"));
        assert_eq!(result.pre_tax_total, dec("300"));
    }

    #[test]
    fn test_arrears_recovered_after_current_amount() {
        let mut deduction =
            DeductionDefinition::new("MED", DeductionType::HealthInsurance, flat("100"), true);
        deduction.arrears_balance = dec("80");
        let result = run(&[deduction], &salary("150"));
        let line = &result.breakdown[0];
        assert_eq!(line.amount, dec("100"));
        assert_eq!(line.arrears_recovered, dec("50"));
        assert_eq!(line.arrears_carried_forward, dec("30"));
        assert_eq!(result.pre_tax_total, dec("150"));
    }

    #[test]
    fn test_recover_arrears_with_no_capacity() {
        let recovery = recover_arrears(dec("100"), dec("40"), dec("0"));
        assert_eq!(recovery.current, Decimal::ZERO);
        assert_eq!(recovery.recovered, Decimal::ZERO);
        assert_eq!(recovery.carried_forward, dec("40"));
    }

    #[test]
    fn test_audit_step_records_order() {
        let deductions = vec![DeductionDefinition::new(
            "HSA",
            DeductionType::Hsa,
            flat("25"),
            true,
        )];
        let result = run(&deductions, &salary("1000"));
        assert_eq!(result.audit_step.rule_id, "deductions");
        assert_eq!(result.audit_step.output["order"][0]["code"], "HSA");
    }
}
