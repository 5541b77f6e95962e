//! Earnings and overtime calculation.
//!
//! Gross pay is the sum of every earning line. Overtime is derived from two
//! independent, flag-gated passes over the same lines:
//!
//! - hours counted toward the weekly threshold (`counts_toward_overtime_hours`)
//! - wages and hours feeding the blended regular rate
//!   (`includable_in_regular_rate`)
//!
//! The overtime premium is `premium_hours × regular_rate × premium_multiplier`
//! (29 CFR 778.115, weighted average of concurrent rates), where
//! `premium_hours` is the overtime hours capped at the counted hours whose pay
//! type is `overtime_rate_eligible`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::config::OvertimeSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditWarning, EarningLine, EarningsLineDetail, OvertimeSummary, PayTypeDefinition,
};

use super::classifier::{InclusionKind, should_include_in_calculation};
use super::rounding::round_internal;

/// The result of the earnings calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsResult {
    /// Sum of all breakdown lines, including any overtime premium line.
    pub total_gross: Decimal,
    /// Hours beyond the weekly threshold.
    pub overtime_hours: Decimal,
    /// Blended regular rate.
    pub regular_rate: Decimal,
    /// Overtime summary.
    pub overtime: OvertimeSummary,
    /// One detail per earning line, plus the premium line.
    pub breakdown: Vec<EarningsLineDetail>,
    /// Audit steps recording the computation.
    pub audit_steps: Vec<AuditStep>,
    /// Configuration fallbacks that were applied.
    pub warnings: Vec<AuditWarning>,
}

/// Calculates gross pay, overtime hours and the blended regular rate.
///
/// Lines whose pay type is not registered are paid with
/// [`PayTypeDefinition::fallback`] and reported as configuration warnings.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] for an hourly line with no rate on
/// the line or its pay type.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::calculate_earnings;
/// use payroll_engine::config::OvertimeSettings;
/// use payroll_engine::models::{EarningLine, PayCategory, PayTypeDefinition, PayTypeFlags};
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let mut pay_types = BTreeMap::new();
/// pay_types.insert(
///     "REG".to_string(),
///     PayTypeDefinition::new("REG", "Regular", PayCategory::Regular).with_flags(PayTypeFlags {
///         counts_toward_overtime_hours: true,
///         overtime_rate_eligible: true,
///         includable_in_regular_rate: true,
///         ..PayTypeFlags::default()
///     }),
/// );
///
/// let lines = vec![EarningLine::hourly("REG", Decimal::from(44), Decimal::from(20))];
/// let result = calculate_earnings(&lines, &pay_types, &OvertimeSettings::default(), 1).unwrap();
///
/// assert_eq!(result.overtime_hours, Decimal::from(4));
/// assert_eq!(result.regular_rate, Decimal::from(20));
/// assert_eq!(result.total_gross, Decimal::from(920));
/// ```
pub fn calculate_earnings(
    lines: &[EarningLine],
    pay_types: &BTreeMap<String, PayTypeDefinition>,
    settings: &OvertimeSettings,
    step_number: u32,
) -> EngineResult<EarningsResult> {
    let mut breakdown = Vec::with_capacity(lines.len() + 1);
    let mut warnings = Vec::new();
    let mut audit_steps = Vec::new();

    let mut counted_hours = Decimal::ZERO;
    let mut rate_eligible_hours = Decimal::ZERO;
    let mut regular_rate_wages = Decimal::ZERO;
    let mut regular_rate_hours = Decimal::ZERO;

    for (index, line) in lines.iter().enumerate() {
        let pay_type = match pay_types.get(&line.pay_type) {
            Some(pay_type) => pay_type.clone(),
            None => {
                warnings.push(AuditWarning::configuration(
                    "UNKNOWN_PAY_TYPE",
                    format!(
                        "Pay type {} is not registered; paid as fully taxable with no overtime participation",
                        line.pay_type
                    ),
                ));
                PayTypeDefinition::fallback(line.pay_type.clone())
            }
        };

        let amount = line
            .amount(&pay_type)
            .map(round_internal)
            .ok_or_else(|| EngineError::InvalidInput {
                field: format!("earnings[{}].rate", index),
                message: format!("no rate for pay type {}", line.pay_type),
            })?;

        if should_include_in_calculation(&pay_type, InclusionKind::OvertimeHours) {
            counted_hours += line.hours;
            if should_include_in_calculation(&pay_type, InclusionKind::OvertimeRate) {
                rate_eligible_hours += line.hours;
            }
        }
        if should_include_in_calculation(&pay_type, InclusionKind::RegularRate) {
            regular_rate_wages += amount;
            regular_rate_hours += line.hours;
        }

        breakdown.push(EarningsLineDetail {
            pay_type_code: pay_type.code.clone(),
            category: pay_type.category,
            hours: line.hours,
            rate: line.effective_rate(&pay_type),
            multiplier: line.effective_multiplier(&pay_type),
            amount,
            flags: pay_type.flags,
        });
    }

    let straight_time: Decimal = breakdown.iter().map(|line| line.amount).sum();

    audit_steps.push(AuditStep {
        step_number,
        rule_id: "earnings_lines".to_string(),
        rule_name: "Earnings Lines".to_string(),
        reference: "pay_types.yaml".to_string(),
        input: json!({
            "lines": lines.len(),
        }),
        output: json!({
            "straight_time_gross": straight_time.normalize().to_string(),
            "lines": breakdown
                .iter()
                .map(|line| json!({
                    "pay_type": line.pay_type_code,
                    "amount": line.amount.normalize().to_string(),
                }))
                .collect::<Vec<_>>(),
        }),
        reasoning: format!(
            "Summed {} earning line(s) at straight time: ${}",
            breakdown.len(),
            straight_time.normalize()
        ),
    });

    let regular_rate = if regular_rate_hours > Decimal::ZERO {
        round_internal(regular_rate_wages / regular_rate_hours)
    } else {
        Decimal::ZERO
    };
    let overtime_hours = (counted_hours - settings.weekly_threshold_hours).max(Decimal::ZERO);
    let premium_hours = overtime_hours.min(rate_eligible_hours);
    let overtime_premium =
        round_internal(premium_hours * regular_rate * settings.premium_multiplier);

    let premium_added = settings.auto_premium && overtime_premium > Decimal::ZERO;
    if premium_added {
        let premium_type = PayTypeDefinition::overtime_premium();
        breakdown.push(EarningsLineDetail {
            pay_type_code: premium_type.code,
            category: premium_type.category,
            hours: premium_hours,
            rate: Some(regular_rate),
            multiplier: settings.premium_multiplier,
            amount: overtime_premium,
            flags: premium_type.flags,
        });
    }

    let reasoning = if overtime_hours > Decimal::ZERO {
        format!(
            "{} counted hours exceed the {} hour threshold by {} ({} rate eligible); regular rate ${} / {} hours = ${}; premium {} × ${} × {} = ${}",
            counted_hours.normalize(),
            settings.weekly_threshold_hours.normalize(),
            overtime_hours.normalize(),
            premium_hours.normalize(),
            regular_rate_wages.normalize(),
            regular_rate_hours.normalize(),
            regular_rate.normalize(),
            premium_hours.normalize(),
            regular_rate.normalize(),
            settings.premium_multiplier.normalize(),
            overtime_premium.normalize()
        )
    } else {
        format!(
            "{} counted hours do not exceed the {} hour threshold; no overtime premium",
            counted_hours.normalize(),
            settings.weekly_threshold_hours.normalize()
        )
    };

    audit_steps.push(AuditStep {
        step_number: step_number + 1,
        rule_id: "overtime_regular_rate".to_string(),
        rule_name: "Overtime and Regular Rate".to_string(),
        reference: "29 CFR 778.115".to_string(),
        input: json!({
            "counted_hours": counted_hours.normalize().to_string(),
            "rate_eligible_hours": rate_eligible_hours.normalize().to_string(),
            "regular_rate_wages": regular_rate_wages.normalize().to_string(),
            "regular_rate_hours": regular_rate_hours.normalize().to_string(),
            "threshold_hours": settings.weekly_threshold_hours.normalize().to_string(),
        }),
        output: json!({
            "regular_rate": regular_rate.normalize().to_string(),
            "overtime_hours": overtime_hours.normalize().to_string(),
            "premium_hours": premium_hours.normalize().to_string(),
            "overtime_premium": overtime_premium.normalize().to_string(),
            "premium_line_added": premium_added,
        }),
        reasoning,
    });

    let total_gross = breakdown.iter().map(|line| line.amount).sum();

    Ok(EarningsResult {
        total_gross,
        overtime_hours,
        regular_rate,
        overtime: OvertimeSummary {
            counted_hours,
            overtime_hours,
            regular_rate,
            overtime_premium: if premium_added {
                overtime_premium
            } else {
                Decimal::ZERO
            },
        },
        breakdown,
        audit_steps,
        warnings,
    })
}
