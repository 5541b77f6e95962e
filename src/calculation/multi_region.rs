//! Multi-jurisdiction tax withholding.
//!
//! Every effective employee rule of every applicable jurisdiction is
//! evaluated and the results are merged by jurisdiction type:
//!
//! - country: income to federal, social security to FICA, medicare to Medicare
//! - state / province: disability and unemployment to SDI, the rest to state
//! - local: everything to local
//!
//! Progressive rules are cumulative: the period's tax is
//! `tax(ytd + current) − tax(ytd)`, so annual brackets apply correctly
//! whatever the pay frequency. Reciprocity relief is applied after the merge
//! by a [`ReciprocityResolver`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditWarning, EmployeeTaxProfile, JurisdictionType, RateSchedule, TaxCalculation,
    TaxJurisdiction, TaxKind, TaxParty, TaxRule, TaxType, TaxableWages, TaxesWithheld,
    YtdSnapshot,
};

use super::rounding::round_internal;
use super::tax::{TaxComputation, progressive_tax};
use super::wage_base::capped_wages;

/// An immutable registry of tax jurisdictions keyed by code.
///
/// Built once from configuration and passed explicitly to each calculation.
#[derive(Debug, Clone, Default)]
pub struct JurisdictionRegistry {
    jurisdictions: BTreeMap<String, TaxJurisdiction>,
}

impl JurisdictionRegistry {
    /// Builds a registry, rejecting duplicate codes and unknown parents.
    pub fn new(jurisdictions: Vec<TaxJurisdiction>) -> EngineResult<Self> {
        let mut map = BTreeMap::new();
        for jurisdiction in jurisdictions {
            let code = jurisdiction.code.clone();
            if map.insert(code.clone(), jurisdiction).is_some() {
                return Err(EngineError::DuplicateJurisdiction { code });
            }
        }
        for jurisdiction in map.values() {
            if let Some(parent) = &jurisdiction.parent_code {
                if !map.contains_key(parent) {
                    return Err(EngineError::JurisdictionNotFound {
                        code: parent.clone(),
                    });
                }
            }
        }
        Ok(Self { jurisdictions: map })
    }

    /// Looks up a jurisdiction.
    pub fn get(&self, code: &str) -> Option<&TaxJurisdiction> {
        self.jurisdictions.get(code)
    }

    /// Looks up a jurisdiction, failing when it is not registered.
    pub fn require(&self, code: &str) -> EngineResult<&TaxJurisdiction> {
        self.get(code)
            .ok_or_else(|| EngineError::JurisdictionNotFound {
                code: code.to_string(),
            })
    }

    /// The jurisdiction and its ancestors, outermost first.
    pub fn lineage(&self, code: &str) -> Vec<&TaxJurisdiction> {
        let mut chain = Vec::new();
        let mut current = self.get(code);
        while let Some(jurisdiction) = current {
            if chain
                .iter()
                .any(|seen: &&TaxJurisdiction| seen.code == jurisdiction.code)
            {
                break;
            }
            chain.push(jurisdiction);
            current = jurisdiction
                .parent_code
                .as_deref()
                .and_then(|parent| self.get(parent));
        }
        chain.reverse();
        chain
    }

    /// Number of registered jurisdictions.
    pub fn len(&self) -> usize {
        self.jurisdictions.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.jurisdictions.is_empty()
    }

    /// All jurisdictions in code order.
    pub fn iter(&self) -> impl Iterator<Item = &TaxJurisdiction> {
        self.jurisdictions.values()
    }
}

/// Resolves reciprocity agreements after the per-jurisdiction merge.
pub trait ReciprocityResolver {
    /// Returns the computation with any reciprocity relief applied.
    fn resolve(&self, profile: &EmployeeTaxProfile, computation: TaxComputation) -> TaxComputation;
}

/// The default resolver: no agreements, input returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReciprocity;

impl ReciprocityResolver for NoReciprocity {
    fn resolve(&self, _profile: &EmployeeTaxProfile, computation: TaxComputation) -> TaxComputation {
        computation
    }
}

/// Settings the multi-jurisdiction engine needs beyond the registry.
#[derive(Debug, Clone, Copy)]
pub struct MultiRegionSettings<'a> {
    /// Country evaluated for every employee.
    pub home_country: &'a str,
    /// State income rate applied when the primary work jurisdiction is not
    /// registered.
    pub default_state_rate: Decimal,
    /// Date used for rule matching.
    pub as_of: NaiveDate,
}

/// Returns the de-duplicated jurisdiction codes for a profile, in order:
/// primary work, remote work, residency. Blank codes are skipped.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::detect_tax_jurisdictions;
/// use payroll_engine::models::{EmployeeTaxProfile, FilingStatus};
///
/// let mut profile = EmployeeTaxProfile::new(FilingStatus::Single, "CA");
/// profile.remote_work_jurisdiction = Some("CA".to_string());
/// profile.residency_jurisdiction = Some("NV".to_string());
///
/// assert_eq!(detect_tax_jurisdictions(&profile), vec!["CA", "NV"]);
/// ```
pub fn detect_tax_jurisdictions(profile: &EmployeeTaxProfile) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(3);
    for code in [
        &profile.primary_work_jurisdiction,
        &profile.remote_work_jurisdiction,
        &profile.residency_jurisdiction,
    ]
    .into_iter()
    .flatten()
    {
        let code = code.trim();
        if !code.is_empty() && !codes.iter().any(|seen| seen == code) {
            codes.push(code.to_string());
        }
    }
    codes
}

/// Where a rule's amount lands in [`TaxesWithheld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Federal,
    Fica,
    Medicare,
    State,
    Sdi,
    Local,
}

fn bucket_for(jurisdiction_type: JurisdictionType, kind: TaxKind) -> Bucket {
    match (jurisdiction_type, kind) {
        (JurisdictionType::Local, _) => Bucket::Local,
        (JurisdictionType::Country, TaxKind::SocialSecurity) => Bucket::Fica,
        (JurisdictionType::Country, TaxKind::Medicare) => Bucket::Medicare,
        (JurisdictionType::Country, _) => Bucket::Federal,
        (_, TaxKind::Disability | TaxKind::Unemployment) => Bucket::Sdi,
        _ => Bucket::State,
    }
}

fn tax_type_for(bucket: Bucket) -> TaxType {
    match bucket {
        Bucket::Federal => TaxType::FederalIncome,
        Bucket::Fica => TaxType::SocialSecurity,
        Bucket::Medicare => TaxType::Medicare,
        Bucket::State => TaxType::StateIncome,
        Bucket::Sdi => TaxType::Sdi,
        Bucket::Local => TaxType::LocalIncome,
    }
}

/// Current and YTD wages a rule is measured against.
fn wage_base_for(
    jurisdiction_type: JurisdictionType,
    kind: TaxKind,
    bases: &TaxableWages,
    ytd: &YtdSnapshot,
) -> (Decimal, Decimal) {
    match kind {
        TaxKind::Income => match jurisdiction_type {
            JurisdictionType::Country => (bases.federal, ytd.federal_taxable_wages),
            JurisdictionType::State | JurisdictionType::Province => {
                (bases.state, ytd.state_taxable_wages)
            }
            JurisdictionType::Local => (bases.local, ytd.local_taxable_wages),
        },
        TaxKind::SocialSecurity => (bases.social_security, ytd.social_security_wages),
        TaxKind::Medicare => (bases.medicare, ytd.medicare_wages),
        TaxKind::Disability => (bases.sdi, ytd.sdi_wages),
        TaxKind::Unemployment => (bases.suta, ytd.suta_wages),
    }
}

/// Tax due this period under one rule, with the wages it was charged on.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::evaluate_rule;
/// use payroll_engine::models::{Applicability, RateSchedule, TaxKind, TaxRule};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let rule = TaxRule {
///     id: "us_social_security".to_string(),
///     tax_kind: TaxKind::SocialSecurity,
///     schedule: RateSchedule::Percentage { rate: Decimal::new(62, 3) },
///     applicability: Applicability::Both,
///     effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     expiry_date: None,
///     wage_base_cap: Some(Decimal::from(168_600)),
///     filing_status: None,
/// };
///
/// let (taxable, tax) = evaluate_rule(&rule, Decimal::from(168_100), Decimal::from(1000));
/// assert_eq!(taxable, Decimal::from(500));
/// assert_eq!(tax, Decimal::from(31));
/// ```
pub fn evaluate_rule(rule: &TaxRule, ytd: Decimal, current: Decimal) -> (Decimal, Decimal) {
    let taxable = capped_wages(ytd, current, rule.wage_base_cap);
    let tax = match &rule.schedule {
        RateSchedule::Flat { amount } => {
            if current > Decimal::ZERO {
                *amount
            } else {
                Decimal::ZERO
            }
        }
        RateSchedule::Percentage { rate } => taxable * rate,
        RateSchedule::Progressive { brackets } => {
            let prior = rule.wage_base_cap.map_or(ytd, |cap| ytd.min(cap));
            let cumulative = prior + taxable;
            progressive_tax(brackets, cumulative) - progressive_tax(brackets, prior)
        }
    };
    (taxable, round_internal(tax.max(Decimal::ZERO)))
}

/// Calculates employee withholding across every applicable jurisdiction.
///
/// Jurisdictions are evaluated outermost first: the home country, then each
/// detected code's ancestors, then the code itself, each once. A detected
/// code that is not registered is reported as a configuration warning; when
/// it is the primary work jurisdiction, the default state rate is applied to
/// state wages in its place.
pub fn calculate_multi_jurisdiction_tax(
    registry: &JurisdictionRegistry,
    profile: &EmployeeTaxProfile,
    bases: &TaxableWages,
    ytd: &YtdSnapshot,
    settings: &MultiRegionSettings<'_>,
    resolver: &dyn ReciprocityResolver,
    step_number: u32,
) -> TaxComputation {
    let filing_status = profile.effective_filing_status();
    let detected = detect_tax_jurisdictions(profile);
    let primary = profile
        .primary_work_jurisdiction
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let mut warnings = Vec::new();
    let mut order: Vec<&TaxJurisdiction> = Vec::new();
    push_lineage(registry, settings.home_country, &mut order);
    let mut fallback_primary = None;
    for code in &detected {
        if registry.get(code).is_none() {
            warnings.push(AuditWarning::configuration(
                "UNKNOWN_JURISDICTION",
                format!("Jurisdiction {} is not registered", code),
            ));
            if primary == Some(code.as_str()) {
                fallback_primary = Some(code.clone());
            }
            continue;
        }
        push_lineage(registry, code, &mut order);
    }

    let mut withheld = TaxesWithheld::default();
    let mut calculations = Vec::new();
    let mut evaluated = Vec::new();

    for jurisdiction in &order {
        for rule in jurisdiction.effective_rules(settings.as_of) {
            if !rule.applicability.applies_to_employee()
                || !rule.applies_to_filing_status(filing_status)
            {
                continue;
            }
            let (current, prior) =
                wage_base_for(jurisdiction.jurisdiction_type, rule.tax_kind, bases, ytd);
            let (taxable, amount) = evaluate_rule(rule, prior, current);
            let bucket = bucket_for(jurisdiction.jurisdiction_type, rule.tax_kind);
            add_to_bucket(&mut withheld, bucket, amount);

            calculations.push(TaxCalculation {
                tax_type: tax_type_for(bucket),
                party: TaxParty::Employee,
                jurisdiction: jurisdiction.code.clone(),
                taxable_wages: taxable,
                rate: match &rule.schedule {
                    RateSchedule::Percentage { rate } => Some(*rate),
                    _ => None,
                },
                amount,
                source: rule.id.clone(),
                explanation: format!(
                    "{} rule {} on ${} (YTD ${}) = ${}",
                    jurisdiction.name,
                    rule.id,
                    taxable.normalize(),
                    prior.normalize(),
                    amount.normalize()
                ),
            });
            evaluated.push(json!({
                "jurisdiction": jurisdiction.code,
                "rule": rule.id,
                "amount": amount.normalize().to_string(),
            }));
        }
    }

    if let Some(code) = &fallback_primary {
        let amount = round_internal(bases.state * settings.default_state_rate);
        add_to_bucket(&mut withheld, Bucket::State, amount);
        calculations.push(TaxCalculation {
            tax_type: TaxType::StateIncome,
            party: TaxParty::Employee,
            jurisdiction: code.clone(),
            taxable_wages: bases.state,
            rate: Some(settings.default_state_rate),
            amount,
            source: "default_state_rate".to_string(),
            explanation: format!(
                "Unregistered jurisdiction {}: state wages ${} × default {} = ${}",
                code,
                bases.state.normalize(),
                settings.default_state_rate.normalize(),
                amount.normalize()
            ),
        });
        evaluated.push(json!({
            "jurisdiction": code,
            "rule": "default_state_rate",
            "amount": amount.normalize().to_string(),
        }));
    }

    let audit_step = AuditStep {
        step_number,
        rule_id: "multi_jurisdiction_tax".to_string(),
        rule_name: "Multi-Jurisdiction Tax".to_string(),
        reference: "jurisdictions.yaml".to_string(),
        input: json!({
            "detected": detected,
            "evaluated_order": order.iter().map(|j| j.code.clone()).collect::<Vec<_>>(),
            "filing_status": filing_status.as_str(),
            "as_of": settings.as_of.to_string(),
        }),
        output: json!({
            "rules": evaluated,
            "total": withheld.total().normalize().to_string(),
        }),
        reasoning: format!(
            "Evaluated {} rule(s) across {} jurisdiction(s); employee withholding ${}",
            calculations.len(),
            order.len(),
            withheld.total().normalize()
        ),
    };

    let computation = TaxComputation {
        withheld,
        calculations,
        warnings,
        audit_steps: vec![audit_step],
    };
    resolver.resolve(profile, computation)
}

fn push_lineage<'r>(
    registry: &'r JurisdictionRegistry,
    code: &str,
    order: &mut Vec<&'r TaxJurisdiction>,
) {
    for jurisdiction in registry.lineage(code) {
        if !order.iter().any(|seen| seen.code == jurisdiction.code) {
            order.push(jurisdiction);
        }
    }
}

fn add_to_bucket(withheld: &mut TaxesWithheld, bucket: Bucket, amount: Decimal) {
    match bucket {
        Bucket::Federal => withheld.federal += amount,
        Bucket::Fica => withheld.fica += amount,
        Bucket::Medicare => withheld.medicare += amount,
        Bucket::State => withheld.state += amount,
        Bucket::Sdi => *withheld.sdi.get_or_insert(Decimal::ZERO) += amount,
        Bucket::Local => *withheld.local.get_or_insert(Decimal::ZERO) += amount,
    }
}
