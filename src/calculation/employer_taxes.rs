//! Employer-side payroll taxes.
//!
//! Mirrors employee Social Security and Medicare at the matching rate (no
//! Additional Medicare on the employer side) and computes FUTA and SUTA, each
//! against its own annual wage base.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::TaxTable;
use crate::models::{
    AuditStep, AuditWarning, EmployerTaxes, TaxCalculation, TaxParty, TaxType, TaxableWages,
    YtdSnapshot,
};

use super::rounding::round_internal;
use super::tax::FEDERAL_JURISDICTION;
use super::wage_base::capped_wages;

/// The result of the employer tax calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerTaxResult {
    /// Totals at internal precision.
    pub taxes: EmployerTaxes,
    /// One entry per computed tax.
    pub calculations: Vec<TaxCalculation>,
    /// Configuration fallbacks that were applied.
    pub warnings: Vec<AuditWarning>,
    /// Audit step recording the computation.
    pub audit_step: AuditStep,
}

/// Calculates the employer's FICA match, Medicare match, FUTA and SUTA.
///
/// SUTA is keyed by the work state; a state missing from the table uses the
/// default SUTA rate and wage base and is reported as a configuration
/// warning.
pub fn calculate_employer_taxes(
    bases: &TaxableWages,
    ytd: &YtdSnapshot,
    table: &TaxTable,
    work_state: Option<&str>,
    step_number: u32,
) -> EmployerTaxResult {
    let mut calculations = Vec::with_capacity(4);
    let mut warnings = Vec::new();

    let ss_taxable = capped_wages(
        ytd.social_security_wages,
        bases.social_security,
        table.social_security.wage_base,
    );
    let fica = round_internal(ss_taxable * table.social_security.rate);
    calculations.push(employer_calculation(
        TaxType::SocialSecurity,
        FEDERAL_JURISDICTION,
        ss_taxable,
        table.social_security.rate,
        fica,
        "social_security",
    ));

    let medicare = round_internal(bases.medicare * table.medicare.rate);
    calculations.push(employer_calculation(
        TaxType::Medicare,
        FEDERAL_JURISDICTION,
        bases.medicare,
        table.medicare.rate,
        medicare,
        "medicare",
    ));

    let futa_taxable = capped_wages(ytd.futa_wages, bases.futa, table.futa.wage_base);
    let futa = round_internal(futa_taxable * table.futa.rate);
    calculations.push(employer_calculation(
        TaxType::Futa,
        FEDERAL_JURISDICTION,
        futa_taxable,
        table.futa.rate,
        futa,
        "futa",
    ));

    let (suta_rate, suta_source) = match work_state.and_then(|state| table.suta.get(state)) {
        Some(rate) => (rate, format!("suta.{}", work_state.unwrap_or_default())),
        None => {
            warnings.push(AuditWarning::configuration(
                "UNKNOWN_SUTA_STATE",
                format!(
                    "No SUTA entry for {}; default rate {} applied",
                    work_state.unwrap_or("an unspecified work state"),
                    table.default_suta.rate.normalize()
                ),
            ));
            (&table.default_suta, "default_suta".to_string())
        }
    };
    let suta_taxable = capped_wages(ytd.suta_wages, bases.suta, suta_rate.wage_base);
    let suta = round_internal(suta_taxable * suta_rate.rate);
    calculations.push(employer_calculation(
        TaxType::Suta,
        work_state.unwrap_or("UNKNOWN"),
        suta_taxable,
        suta_rate.rate,
        suta,
        &suta_source,
    ));

    let taxes = EmployerTaxes {
        fica,
        medicare,
        futa,
        suta,
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "employer_taxes".to_string(),
        rule_name: "Employer Taxes".to_string(),
        reference: "IRC 3111, 3301; state UI".to_string(),
        input: json!({
            "social_security_wages": bases.social_security.normalize().to_string(),
            "medicare_wages": bases.medicare.normalize().to_string(),
            "futa_wages": bases.futa.normalize().to_string(),
            "suta_wages": bases.suta.normalize().to_string(),
            "work_state": work_state,
        }),
        output: json!({
            "fica": fica.normalize().to_string(),
            "medicare": medicare.normalize().to_string(),
            "futa": futa.normalize().to_string(),
            "suta": suta.normalize().to_string(),
        }),
        reasoning: format!(
            "Employer liability ${}: FICA match ${}, Medicare match ${}, FUTA ${} on ${}, SUTA ${} on ${}",
            taxes.total().normalize(),
            fica.normalize(),
            medicare.normalize(),
            futa.normalize(),
            futa_taxable.normalize(),
            suta.normalize(),
            suta_taxable.normalize()
        ),
    };

    EmployerTaxResult {
        taxes,
        calculations,
        warnings,
        audit_step,
    }
}

fn employer_calculation(
    tax_type: TaxType,
    jurisdiction: &str,
    taxable_wages: Decimal,
    rate: Decimal,
    amount: Decimal,
    source: &str,
) -> TaxCalculation {
    TaxCalculation {
        tax_type,
        party: TaxParty::Employer,
        jurisdiction: jurisdiction.to_string(),
        taxable_wages,
        rate: Some(rate),
        amount,
        source: source.to_string(),
        explanation: format!(
            "${} × {} = ${}",
            taxable_wages.normalize(),
            rate.normalize(),
            amount.normalize()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::tax::tests::sample_table;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn bases(amount: &str) -> TaxableWages {
        let amount = dec(amount);
        TaxableWages {
            federal: amount,
            federal_supplemental: Decimal::ZERO,
            state: amount,
            local: amount,
            social_security: amount,
            medicare: amount,
            futa: amount,
            suta: amount,
            sdi: amount,
        }
    }

    #[test]
    fn test_employer_match_and_unemployment() {
        let table = sample_table();
        let result =
            calculate_employer_taxes(&bases("1000"), &YtdSnapshot::default(), &table, Some("CA"), 1);

        assert_eq!(result.taxes.fica, dec("62"));
        assert_eq!(result.taxes.medicare, dec("14.5"));
        assert_eq!(result.taxes.futa, dec("6"));
        assert_eq!(result.taxes.suta, dec("34"));
        assert!(result.warnings.is_empty());
        assert!(result.calculations.iter().all(|c| c.party == TaxParty::Employer));
    }

    #[test]
    fn test_futa_and_suta_stop_at_wage_base() {
        let table = sample_table();
        let ytd = YtdSnapshot {
            futa_wages: dec("6500"),
            suta_wages: dec("7000"),
            ..YtdSnapshot::default()
        };
        let result = calculate_employer_taxes(&bases("1000"), &ytd, &table, Some("CA"), 1);
        assert_eq!(result.taxes.futa, dec("3"));
        assert_eq!(result.taxes.suta, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_state_uses_default_suta() {
        let table = sample_table();
        let result =
            calculate_employer_taxes(&bases("1000"), &YtdSnapshot::default(), &table, Some("TX"), 1);
        assert_eq!(result.taxes.suta, dec("27"));
        assert_eq!(result.warnings[0].code, "UNKNOWN_SUTA_STATE");
    }

    #[test]
    fn test_employer_medicare_has_no_additional_rate() {
        let table = sample_table();
        let ytd = YtdSnapshot {
            medicare_wages: dec("300000"),
            ..YtdSnapshot::default()
        };
        let result = calculate_employer_taxes(&bases("1000"), &ytd, &table, Some("CA"), 1);
        assert_eq!(result.taxes.medicare, dec("14.5"));
    }
}
