//! Retroactive adjustments and off-cycle corrections.
//!
//! A correction never mutates the result it refers to. It produces a new
//! result whose totals are the original's plus the correction's own wages
//! and taxes, with the original id recorded in the metadata.
//!
//! Correction wages are supplemental: federal income tax is withheld at the
//! flat supplemental rate, not through the brackets. Annual caps and
//! thresholds are measured from the YTD figures after the original period,
//! so a correction crossing the Social Security wage base is taxed only up to
//! it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::TaxTable;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AdjustmentKind, AdjustmentRecord, AuditStep, CalculationResult, EarningsLineDetail,
    FilingStatus, IssueKind, PayTypeDefinition, PayTypeFlags, TaxableWages, YtdSnapshot,
};

use super::classifier::{InclusionKind, flags_include};
use super::employer_taxes::calculate_employer_taxes;
use super::net_pay::{calculate_net_pay, validate_calculation};
use super::rounding::{round_currency, round_internal};
use super::tax::{TaxContext, calculate_taxes};
use super::wage_base::advance_ytd;

/// Back pay for hours already paid at a rate that was later raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetroactiveAdjustment {
    /// Pay type the hours were paid under.
    pub pay_type: String,
    /// Hours affected.
    pub hours: Decimal,
    /// Rate originally paid.
    pub old_rate: Decimal,
    /// Rate that should have been paid.
    pub new_rate: Decimal,
    /// Why the adjustment is made.
    pub reason: String,
}

impl RetroactiveAdjustment {
    /// Back pay owed: `hours × (new_rate − old_rate)`.
    pub fn amount(&self) -> Decimal {
        round_internal(self.hours * (self.new_rate - self.old_rate))
    }
}

/// A one-off payment outside the regular run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffCycleCorrection {
    /// Pay type of the payment.
    pub pay_type: String,
    /// Gross amount paid.
    pub amount: Decimal,
    /// Why the payment is made.
    pub reason: String,
}

/// Everything a correction is computed against.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionContext<'a> {
    /// The result being corrected.
    pub original: &'a CalculationResult,
    /// YTD wages before the original period.
    pub prior_ytd: &'a YtdSnapshot,
    /// Tax table effective for the original period.
    pub table: &'a TaxTable,
    /// Filing status (already defaulted).
    pub filing_status: FilingStatus,
    /// Primary work state code.
    pub work_state: Option<&'a str>,
    /// Net pay reconciliation tolerance.
    pub tolerance: Decimal,
}

/// Applies a retroactive rate increase to an original result.
///
/// Fails with [`EngineError::InvalidInput`] when hours are negative or the
/// new rate is below the old one; a rate decrease is a recovery, not back
/// pay.
pub fn process_retroactive_adjustment(
    context: &CorrectionContext<'_>,
    pay_type: &PayTypeDefinition,
    adjustment: &RetroactiveAdjustment,
) -> EngineResult<CalculationResult> {
    if adjustment.hours < Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "adjustment.hours".to_string(),
            message: "hours cannot be negative".to_string(),
        });
    }
    if adjustment.new_rate < adjustment.old_rate {
        return Err(EngineError::InvalidInput {
            field: "adjustment.new_rate".to_string(),
            message: format!(
                "new rate {} is below old rate {}",
                adjustment.new_rate.normalize(),
                adjustment.old_rate.normalize()
            ),
        });
    }

    let amount = adjustment.amount();
    let line = EarningsLineDetail {
        pay_type_code: pay_type.code.clone(),
        category: pay_type.category,
        hours: adjustment.hours,
        rate: Some(adjustment.new_rate - adjustment.old_rate),
        multiplier: Decimal::ONE,
        amount,
        flags: pay_type.flags,
    };
    let request = serde_json::to_value(adjustment).map_err(|e| EngineError::InvalidInput {
        field: "adjustment".to_string(),
        message: e.to_string(),
    })?;

    compose_correction(
        context,
        AdjustmentKind::RetroactivePay,
        &adjustment.reason,
        line,
        request,
    )
}

/// Applies an off-cycle supplemental payment to an original result.
///
/// Fails with [`EngineError::InvalidInput`] unless the amount is positive.
pub fn process_off_cycle_correction(
    context: &CorrectionContext<'_>,
    pay_type: &PayTypeDefinition,
    correction: &OffCycleCorrection,
) -> EngineResult<CalculationResult> {
    if correction.amount <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "correction.amount".to_string(),
            message: "off-cycle amount must be positive".to_string(),
        });
    }

    let line = EarningsLineDetail {
        pay_type_code: pay_type.code.clone(),
        category: pay_type.category,
        hours: Decimal::ZERO,
        rate: None,
        multiplier: Decimal::ONE,
        amount: round_internal(correction.amount),
        flags: pay_type.flags,
    };
    let request = serde_json::to_value(correction).map_err(|e| EngineError::InvalidInput {
        field: "correction".to_string(),
        message: e.to_string(),
    })?;

    compose_correction(
        context,
        AdjustmentKind::OffCycleCorrection,
        &correction.reason,
        line,
        request,
    )
}

/// Wage bases for supplemental correction wages: the whole federal base is
/// supplemental and no pre-tax deductions apply.
fn supplemental_bases(flags: &PayTypeFlags, amount: Decimal) -> TaxableWages {
    let base = |kind| {
        if flags_include(flags, kind) {
            amount
        } else {
            Decimal::ZERO
        }
    };
    let federal = base(InclusionKind::FederalTax);
    TaxableWages {
        federal,
        federal_supplemental: federal,
        state: base(InclusionKind::StateTax),
        local: base(InclusionKind::LocalTax),
        social_security: base(InclusionKind::FicaSs),
        medicare: base(InclusionKind::Medicare),
        futa: base(InclusionKind::Futa),
        suta: base(InclusionKind::Suta),
        sdi: base(InclusionKind::Sdi),
    }
}

fn compose_correction(
    context: &CorrectionContext<'_>,
    kind: AdjustmentKind,
    reason: &str,
    line: EarningsLineDetail,
    request: serde_json::Value,
) -> EngineResult<CalculationResult> {
    let original = context.original;
    let mut step = original.audit_trace.steps.len() as u32 + 1;

    // Gross is the sum of breakdown lines; only the tax bases follow flags.
    let gross = line.amount;
    let bases = supplemental_bases(&line.flags, gross);
    let ytd = advance_ytd(context.prior_ytd, original.gross_pay, &original.taxable_wages);

    let mut steps = vec![AuditStep {
        step_number: step,
        rule_id: "correction_earnings".to_string(),
        rule_name: "Correction Earnings".to_string(),
        reference: format!("{} {}", kind_label(kind), original.calculation_id),
        input: json!({
            "original_calculation_id": original.calculation_id.to_string(),
            "request": request,
        }),
        output: json!({
            "pay_type": line.pay_type_code,
            "gross": gross.normalize().to_string(),
            "ytd_gross_after_original": ytd.gross_wages.normalize().to_string(),
        }),
        reasoning: format!(
            "{} of ${} under {}: {}",
            kind_label(kind),
            gross.normalize(),
            line.pay_type_code,
            reason
        ),
    }];
    step += 1;

    let tax_context = TaxContext {
        table: context.table,
        filing_status: context.filing_status,
        allowances: 0,
        additional_withholding: Decimal::ZERO,
        work_state: context.work_state,
        frequency: original.calculation_details.pay_frequency,
    };
    let taxes = calculate_taxes(&bases, &ytd, &tax_context, step);
    step += taxes.audit_steps.len() as u32;
    let employer = calculate_employer_taxes(&bases, &ytd, context.table, context.work_state, step);
    step += 1;

    let gross_delta = round_currency(gross);
    let taxes_delta = taxes.withheld.map(round_currency);
    let employer_taxes_delta = employer.taxes.map(round_currency);

    let gross_pay = original.gross_pay + gross_delta;
    let taxes_withheld = original.taxes_withheld.combined(&taxes_delta);
    let net = calculate_net_pay(
        gross_pay,
        original.pre_tax_deductions,
        taxes_withheld.total(),
        original.post_tax_deductions,
        step,
    );

    steps.extend(taxes.audit_steps);
    steps.push(employer.audit_step);
    steps.push(net.audit_step);

    let mut seed = original.calculation_id.as_bytes().to_vec();
    seed.extend_from_slice(request.to_string().as_bytes());

    let mut details = original.calculation_details.clone();
    details.earnings_breakdown.push(line);
    details.tax_calculations.extend(taxes.calculations);
    details.tax_calculations.extend(employer.calculations);

    let mut audit_trace = original.audit_trace.clone();
    audit_trace
        .warnings
        .retain(|warning| warning.kind != IssueKind::CalculationIntegrity);
    audit_trace.warnings.extend(taxes.warnings);
    audit_trace.warnings.extend(employer.warnings);
    audit_trace.steps.extend(steps);

    let adjustment = AdjustmentRecord {
        kind,
        reason: reason.to_string(),
        gross_delta,
        taxes_delta,
        employer_taxes_delta: employer_taxes_delta.clone(),
        net_delta: net.net_pay - original.net_pay,
    };

    let mut metadata = original.metadata.clone();
    metadata.original_calculation_id = Some(original.calculation_id);
    metadata.adjustment = Some(adjustment);

    let mut result = CalculationResult {
        calculation_id: CalculationResult::derive_id(&seed),
        employee_id: original.employee_id.clone(),
        pay_period_start: original.pay_period_start,
        pay_period_end: original.pay_period_end,
        gross_pay,
        pre_tax_deductions: original.pre_tax_deductions,
        taxable_wages: original
            .taxable_wages
            .combined(&bases.map(round_currency)),
        taxes_withheld,
        post_tax_deductions: original.post_tax_deductions,
        net_pay: net.net_pay,
        unclamped_net_pay: net.unclamped_net_pay,
        net_pay_clamped: net.clamped,
        employer_taxes: original.employer_taxes.combined(&employer_taxes_delta),
        calculation_details: details,
        metadata,
        audit_trace,
    };

    let issues = validate_calculation(&result, context.tolerance);
    result.audit_trace.warnings.extend(issues);
    Ok(result)
}

fn kind_label(kind: AdjustmentKind) -> &'static str {
    match kind {
        AdjustmentKind::RetroactivePay => "Retroactive pay",
        AdjustmentKind::OffCycleCorrection => "Off-cycle correction",
    }
}
