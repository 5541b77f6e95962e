//! Single-jurisdiction tax withholding.
//!
//! Federal income tax uses the annualized percentage method (IRS Pub 15-T):
//! regular wages are annualized, reduced by allowances, run through the
//! filing-status brackets and de-annualized. Supplemental wages are withheld
//! at the flat supplemental rate instead. State income tax is a flat rate for
//! the work state. Social Security stops at its annual wage base, and
//! Additional Medicare applies only above the filing-status threshold.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::TaxTable;
use crate::models::{
    AuditStep, AuditWarning, FilingStatus, PayFrequency, TaxBracket, TaxCalculation, TaxParty,
    TaxType, TaxableWages, TaxesWithheld, YtdSnapshot,
};

use super::rounding::round_internal;
use super::wage_base::{capped_wages, threshold_excess};

/// Jurisdiction code used for federal taxes.
pub const FEDERAL_JURISDICTION: &str = "US";

/// Everything about the employee and period that withholding depends on.
#[derive(Debug, Clone, Copy)]
pub struct TaxContext<'a> {
    /// Tax table effective for the period.
    pub table: &'a TaxTable,
    /// Filing status (already defaulted).
    pub filing_status: FilingStatus,
    /// Withholding allowances.
    pub allowances: u32,
    /// Extra federal withholding per period.
    pub additional_withholding: Decimal,
    /// Primary work state code.
    pub work_state: Option<&'a str>,
    /// Pay frequency for annualization.
    pub frequency: PayFrequency,
}

/// Withholding computed by either tax engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputation {
    /// Totals at internal precision.
    pub withheld: TaxesWithheld,
    /// One entry per computed tax.
    pub calculations: Vec<TaxCalculation>,
    /// Configuration fallbacks that were applied.
    pub warnings: Vec<AuditWarning>,
    /// Audit steps recording the computation.
    pub audit_steps: Vec<AuditStep>,
}

/// Tax on `income` through marginal brackets.
///
/// Brackets are walked ascending by `min_income`; each taxes only the part of
/// the income inside it, and the walk stops once the income is exhausted.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::progressive_tax;
/// use payroll_engine::models::TaxBracket;
/// use rust_decimal::Decimal;
///
/// let brackets = vec![
///     TaxBracket { min_income: Decimal::ZERO, max_income: None, rate: Decimal::new(10, 2) },
///     TaxBracket { min_income: Decimal::from(10_000), max_income: None, rate: Decimal::new(20, 2) },
/// ];
/// assert_eq!(progressive_tax(&brackets, Decimal::from(15_000)), Decimal::from(2_000));
/// ```
pub fn progressive_tax(brackets: &[TaxBracket], income: Decimal) -> Decimal {
    let mut sorted: Vec<&TaxBracket> = brackets.iter().collect();
    sorted.sort_by(|a, b| a.min_income.cmp(&b.min_income));

    let mut tax = Decimal::ZERO;
    for (index, bracket) in sorted.iter().enumerate() {
        if income <= bracket.min_income {
            break;
        }
        let upper = bracket
            .max_income
            .or_else(|| sorted.get(index + 1).map(|next| next.min_income));
        let top = upper.map_or(income, |upper| income.min(upper));
        if top > bracket.min_income {
            tax += (top - bracket.min_income) * bracket.rate;
        }
    }
    tax
}

/// Calculates employee withholding for the period.
///
/// Amounts stay at internal precision; the orchestrator rounds them once.
pub fn calculate_taxes(
    bases: &TaxableWages,
    ytd: &YtdSnapshot,
    context: &TaxContext<'_>,
    step_number: u32,
) -> TaxComputation {
    let table = context.table;
    let mut computation = TaxComputation::default();
    let mut step = step_number;

    // Federal income tax
    let periods = Decimal::from(context.frequency.periods_per_year());
    let regular_wages = (bases.federal - bases.federal_supplemental).max(Decimal::ZERO);
    let allowance_total = Decimal::from(context.allowances) * table.allowance_amount;
    let annual_wages = (regular_wages * periods - allowance_total).max(Decimal::ZERO);

    let regular_tax = match table.brackets_for(context.filing_status) {
        Some(brackets) => round_internal(progressive_tax(brackets, annual_wages) / periods),
        None => {
            computation.warnings.push(AuditWarning::configuration(
                "MISSING_FEDERAL_BRACKETS",
                format!(
                    "No federal brackets in the {} tax table; regular wages withheld at zero",
                    table.effective_date
                ),
            ));
            Decimal::ZERO
        }
    };
    let supplemental_tax = round_internal(bases.federal_supplemental * table.supplemental_rate);
    let federal = regular_tax + supplemental_tax + context.additional_withholding;

    computation.calculations.push(TaxCalculation {
        tax_type: TaxType::FederalIncome,
        party: TaxParty::Employee,
        jurisdiction: FEDERAL_JURISDICTION.to_string(),
        taxable_wages: regular_wages,
        rate: None,
        amount: regular_tax + context.additional_withholding,
        source: format!("federal_brackets.{}", context.filing_status.as_str()),
        explanation: format!(
            "Annualized ${} × {} periods less {} allowance(s) = ${}; bracket tax / {} periods = ${}; additional withholding ${}",
            regular_wages.normalize(),
            periods,
            context.allowances,
            annual_wages.normalize(),
            periods,
            regular_tax.normalize(),
            context.additional_withholding.normalize()
        ),
    });
    if bases.federal_supplemental > Decimal::ZERO {
        computation.calculations.push(TaxCalculation {
            tax_type: TaxType::FederalSupplemental,
            party: TaxParty::Employee,
            jurisdiction: FEDERAL_JURISDICTION.to_string(),
            taxable_wages: bases.federal_supplemental,
            rate: Some(table.supplemental_rate),
            amount: supplemental_tax,
            source: "supplemental_rate".to_string(),
            explanation: format!(
                "Supplemental wages ${} × flat {} = ${}",
                bases.federal_supplemental.normalize(),
                table.supplemental_rate.normalize(),
                supplemental_tax.normalize()
            ),
        });
    }
    computation.audit_steps.push(AuditStep {
        step_number: step,
        rule_id: "federal_income_tax".to_string(),
        rule_name: "Federal Income Tax".to_string(),
        reference: "IRS Pub 15-T percentage method".to_string(),
        input: json!({
            "federal_wages": bases.federal.normalize().to_string(),
            "supplemental_wages": bases.federal_supplemental.normalize().to_string(),
            "filing_status": context.filing_status.as_str(),
            "allowances": context.allowances,
            "periods_per_year": context.frequency.periods_per_year(),
        }),
        output: json!({
            "regular_tax": regular_tax.normalize().to_string(),
            "supplemental_tax": supplemental_tax.normalize().to_string(),
            "federal": federal.normalize().to_string(),
        }),
        reasoning: format!(
            "Federal withholding ${} (regular ${}, supplemental ${}, additional ${})",
            federal.normalize(),
            regular_tax.normalize(),
            supplemental_tax.normalize(),
            context.additional_withholding.normalize()
        ),
    });
    step += 1;

    // State income tax
    let (state_rate, state_source) = match context.work_state {
        Some(state) => match table.state_income_rates.get(state) {
            Some(rate) => (*rate, format!("state_income_rates.{}", state)),
            None => {
                computation.warnings.push(AuditWarning::configuration(
                    "UNKNOWN_STATE_RATE",
                    format!(
                        "No income tax rate for state {}; default rate {} applied",
                        state,
                        table.default_state_rate.normalize()
                    ),
                ));
                (table.default_state_rate, "default_state_rate".to_string())
            }
        },
        None => (table.default_state_rate, "default_state_rate".to_string()),
    };
    let state = round_internal(bases.state * state_rate);
    let state_code = context.work_state.unwrap_or("UNKNOWN").to_string();
    computation.calculations.push(TaxCalculation {
        tax_type: TaxType::StateIncome,
        party: TaxParty::Employee,
        jurisdiction: state_code.clone(),
        taxable_wages: bases.state,
        rate: Some(state_rate),
        amount: state,
        source: state_source.clone(),
        explanation: format!(
            "State wages ${} × {} = ${}",
            bases.state.normalize(),
            state_rate.normalize(),
            state.normalize()
        ),
    });
    computation.audit_steps.push(AuditStep {
        step_number: step,
        rule_id: "state_income_tax".to_string(),
        rule_name: "State Income Tax".to_string(),
        reference: state_source,
        input: json!({
            "state": state_code,
            "state_wages": bases.state.normalize().to_string(),
            "rate": state_rate.normalize().to_string(),
        }),
        output: json!({ "state": state.normalize().to_string() }),
        reasoning: format!("Flat state rate {} applied", state_rate.normalize()),
    });
    step += 1;

    // Social Security and Medicare
    let ss_taxable = capped_wages(
        ytd.social_security_wages,
        bases.social_security,
        table.social_security.wage_base,
    );
    let fica = round_internal(ss_taxable * table.social_security.rate);
    computation.calculations.push(TaxCalculation {
        tax_type: TaxType::SocialSecurity,
        party: TaxParty::Employee,
        jurisdiction: FEDERAL_JURISDICTION.to_string(),
        taxable_wages: ss_taxable,
        rate: Some(table.social_security.rate),
        amount: fica,
        source: "social_security".to_string(),
        explanation: format!(
            "${} of ${} below the annual wage base (YTD ${}) × {} = ${}",
            ss_taxable.normalize(),
            bases.social_security.normalize(),
            ytd.social_security_wages.normalize(),
            table.social_security.rate.normalize(),
            fica.normalize()
        ),
    });

    let medicare_base = round_internal(bases.medicare * table.medicare.rate);
    computation.calculations.push(TaxCalculation {
        tax_type: TaxType::Medicare,
        party: TaxParty::Employee,
        jurisdiction: FEDERAL_JURISDICTION.to_string(),
        taxable_wages: bases.medicare,
        rate: Some(table.medicare.rate),
        amount: medicare_base,
        source: "medicare".to_string(),
        explanation: format!(
            "Medicare wages ${} × {} = ${}",
            bases.medicare.normalize(),
            table.medicare.rate.normalize(),
            medicare_base.normalize()
        ),
    });

    let additional_medicare = match table.additional_medicare_threshold(context.filing_status) {
        Some(threshold) => {
            let excess = threshold_excess(ytd.medicare_wages, bases.medicare, threshold);
            let amount = round_internal(excess * table.medicare.additional_rate);
            if excess > Decimal::ZERO {
                computation.calculations.push(TaxCalculation {
                    tax_type: TaxType::AdditionalMedicare,
                    party: TaxParty::Employee,
                    jurisdiction: FEDERAL_JURISDICTION.to_string(),
                    taxable_wages: excess,
                    rate: Some(table.medicare.additional_rate),
                    amount,
                    source: format!(
                        "medicare.additional_thresholds.{}",
                        context.filing_status.as_str()
                    ),
                    explanation: format!(
                        "${} above the ${} threshold × {} = ${}",
                        excess.normalize(),
                        threshold.normalize(),
                        table.medicare.additional_rate.normalize(),
                        amount.normalize()
                    ),
                });
            }
            amount
        }
        None => Decimal::ZERO,
    };
    let medicare = medicare_base + additional_medicare;

    computation.audit_steps.push(AuditStep {
        step_number: step,
        rule_id: "fica_medicare".to_string(),
        rule_name: "Social Security and Medicare".to_string(),
        reference: "IRC 3101".to_string(),
        input: json!({
            "social_security_wages": bases.social_security.normalize().to_string(),
            "ytd_social_security_wages": ytd.social_security_wages.normalize().to_string(),
            "medicare_wages": bases.medicare.normalize().to_string(),
            "ytd_medicare_wages": ytd.medicare_wages.normalize().to_string(),
        }),
        output: json!({
            "social_security_taxable": ss_taxable.normalize().to_string(),
            "fica": fica.normalize().to_string(),
            "medicare": medicare_base.normalize().to_string(),
            "additional_medicare": additional_medicare.normalize().to_string(),
        }),
        reasoning: format!(
            "Social Security ${} on ${} capped wages; Medicare ${} plus Additional Medicare ${}",
            fica.normalize(),
            ss_taxable.normalize(),
            medicare_base.normalize(),
            additional_medicare.normalize()
        ),
    });
    step += 1;

    // State disability insurance
    let sdi = context
        .work_state
        .and_then(|state| table.state_disability.get(state).map(|rate| (state, rate)))
        .map(|(state, sdi_rate)| {
            let taxable = capped_wages(ytd.sdi_wages, bases.sdi, sdi_rate.wage_base);
            let amount = round_internal(taxable * sdi_rate.rate);
            computation.calculations.push(TaxCalculation {
                tax_type: TaxType::Sdi,
                party: TaxParty::Employee,
                jurisdiction: state.to_string(),
                taxable_wages: taxable,
                rate: Some(sdi_rate.rate),
                amount,
                source: format!("state_disability.{}", state),
                explanation: format!(
                    "SDI wages ${} × {} = ${}",
                    taxable.normalize(),
                    sdi_rate.rate.normalize(),
                    amount.normalize()
                ),
            });
            computation.audit_steps.push(AuditStep {
                step_number: step,
                rule_id: "state_disability".to_string(),
                rule_name: "State Disability Insurance".to_string(),
                reference: format!("state_disability.{}", state),
                input: json!({
                    "sdi_wages": bases.sdi.normalize().to_string(),
                    "ytd_sdi_wages": ytd.sdi_wages.normalize().to_string(),
                }),
                output: json!({ "sdi": amount.normalize().to_string() }),
                reasoning: format!("{} SDI ${}", state, amount.normalize()),
            });
            amount
        });

    computation.withheld = TaxesWithheld {
        federal,
        state,
        fica,
        medicare,
        local: None,
        sdi,
    };
    computation
}
