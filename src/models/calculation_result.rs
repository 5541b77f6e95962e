//! Calculation result models for the payroll engine.
//!
//! This module contains the [`CalculationResult`] type and its associated
//! structures that capture everything a pay calculation produced: wage bases,
//! withholding, deductions, employer liability and the audit trace.
//!
//! A result is immutable once produced. Corrections create a new result that
//! references the original through [`ResultMetadata::original_calculation_id`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::{DeductionType, PayCategory, PayFrequency, PayTypeFlags, TaxMode};

/// One earning line after classification and amount computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsLineDetail {
    /// Pay type code.
    pub pay_type_code: String,
    /// Pay type category.
    pub category: PayCategory,
    /// Hours on the line.
    pub hours: Decimal,
    /// Rate applied, if the line was hourly.
    pub rate: Option<Decimal>,
    /// Multiplier applied.
    pub multiplier: Decimal,
    /// Line amount at internal precision.
    pub amount: Decimal,
    /// The pay type flags that classified this line.
    pub flags: PayTypeFlags,
}

/// One deduction after sequencing and limit clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionLineDetail {
    /// Deduction code.
    pub code: String,
    /// Deduction type.
    pub deduction_type: DeductionType,
    /// Whether the deduction is pre-tax.
    pub is_pre_tax: bool,
    /// Priority within its class.
    pub priority: u8,
    /// Amount requested before any clamping.
    pub requested_amount: Decimal,
    /// Base amount actually deducted.
    pub amount: Decimal,
    /// Catch-up contribution deducted on top of the base amount.
    pub catch_up_amount: Decimal,
    /// Arrears recovered this period.
    pub arrears_recovered: Decimal,
    /// Arrears carried to the next period.
    pub arrears_carried_forward: Decimal,
    /// Annual limit left after this period, if the deduction is limited.
    pub remaining_annual_limit: Option<Decimal>,
    /// Whether the base amount was reduced by a limit or available wages.
    pub limited: bool,
}

impl DeductionLineDetail {
    /// Total taken for this deduction in the period.
    pub fn total(&self) -> Decimal {
        self.amount + self.catch_up_amount + self.arrears_recovered
    }
}

/// Per-tax-type taxable wage bases for the period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxableWages {
    /// Federal income tax wages.
    pub federal: Decimal,
    /// Portion of federal wages that is supplemental.
    pub federal_supplemental: Decimal,
    /// State income tax wages.
    pub state: Decimal,
    /// Local income tax wages.
    pub local: Decimal,
    /// Social Security wages (before the annual cap).
    pub social_security: Decimal,
    /// Medicare wages.
    pub medicare: Decimal,
    /// FUTA wages (before the annual cap).
    pub futa: Decimal,
    /// SUTA wages (before the annual cap).
    pub suta: Decimal,
    /// SDI wages.
    pub sdi: Decimal,
}

impl TaxableWages {
    /// Field-wise sum of two sets of wage bases.
    pub fn combined(&self, other: &TaxableWages) -> TaxableWages {
        TaxableWages {
            federal: self.federal + other.federal,
            federal_supplemental: self.federal_supplemental + other.federal_supplemental,
            state: self.state + other.state,
            local: self.local + other.local,
            social_security: self.social_security + other.social_security,
            medicare: self.medicare + other.medicare,
            futa: self.futa + other.futa,
            suta: self.suta + other.suta,
            sdi: self.sdi + other.sdi,
        }
    }

    /// Applies `f` to every base.
    pub fn map(&self, f: impl Fn(Decimal) -> Decimal) -> TaxableWages {
        TaxableWages {
            federal: f(self.federal),
            federal_supplemental: f(self.federal_supplemental),
            state: f(self.state),
            local: f(self.local),
            social_security: f(self.social_security),
            medicare: f(self.medicare),
            futa: f(self.futa),
            suta: f(self.suta),
            sdi: f(self.sdi),
        }
    }
}

/// Employee taxes withheld for the period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxesWithheld {
    /// Federal income tax.
    pub federal: Decimal,
    /// State income tax.
    pub state: Decimal,
    /// Social Security.
    pub fica: Decimal,
    /// Medicare, including Additional Medicare.
    pub medicare: Decimal,
    /// Local income tax, when any local jurisdiction applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<Decimal>,
    /// State disability insurance, when it applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdi: Option<Decimal>,
}

impl TaxesWithheld {
    /// Sum of all withheld taxes.
    pub fn total(&self) -> Decimal {
        self.federal
            + self.state
            + self.fica
            + self.medicare
            + self.local.unwrap_or_default()
            + self.sdi.unwrap_or_default()
    }

    /// Field-wise sum of two withholding records.
    pub fn combined(&self, other: &TaxesWithheld) -> TaxesWithheld {
        fn add_optional(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or_default() + b.unwrap_or_default()),
            }
        }
        TaxesWithheld {
            federal: self.federal + other.federal,
            state: self.state + other.state,
            fica: self.fica + other.fica,
            medicare: self.medicare + other.medicare,
            local: add_optional(self.local, other.local),
            sdi: add_optional(self.sdi, other.sdi),
        }
    }

    /// Applies `f` to every present amount.
    pub fn map(&self, f: impl Fn(Decimal) -> Decimal) -> TaxesWithheld {
        TaxesWithheld {
            federal: f(self.federal),
            state: f(self.state),
            fica: f(self.fica),
            medicare: f(self.medicare),
            local: self.local.map(&f),
            sdi: self.sdi.map(&f),
        }
    }
}

/// Employer-side tax liability for the period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerTaxes {
    /// Employer Social Security match.
    pub fica: Decimal,
    /// Employer Medicare match.
    pub medicare: Decimal,
    /// Federal unemployment tax.
    pub futa: Decimal,
    /// State unemployment tax.
    pub suta: Decimal,
}

impl EmployerTaxes {
    /// Sum of all employer taxes.
    pub fn total(&self) -> Decimal {
        self.fica + self.medicare + self.futa + self.suta
    }

    /// Field-wise sum of two employer tax records.
    pub fn combined(&self, other: &EmployerTaxes) -> EmployerTaxes {
        EmployerTaxes {
            fica: self.fica + other.fica,
            medicare: self.medicare + other.medicare,
            futa: self.futa + other.futa,
            suta: self.suta + other.suta,
        }
    }

    /// Applies `f` to every amount.
    pub fn map(&self, f: impl Fn(Decimal) -> Decimal) -> EmployerTaxes {
        EmployerTaxes {
            fica: f(self.fica),
            medicare: f(self.medicare),
            futa: f(self.futa),
            suta: f(self.suta),
        }
    }
}

/// The specific tax a [`TaxCalculation`] computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// Federal income tax on regular wages.
    FederalIncome,
    /// Federal income tax on supplemental wages.
    FederalSupplemental,
    /// State income tax.
    StateIncome,
    /// Local income tax.
    LocalIncome,
    /// Social Security.
    SocialSecurity,
    /// Medicare.
    Medicare,
    /// Additional Medicare above the filing-status threshold.
    AdditionalMedicare,
    /// State disability insurance.
    Sdi,
    /// Federal unemployment.
    Futa,
    /// State unemployment.
    Suta,
}

/// Who bears a computed tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxParty {
    /// Withheld from the employee.
    Employee,
    /// Paid by the employer.
    Employer,
}

/// A single computed tax with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCalculation {
    /// The tax computed.
    pub tax_type: TaxType,
    /// Who bears it.
    pub party: TaxParty,
    /// Jurisdiction code ("US" for federal taxes).
    pub jurisdiction: String,
    /// Wages actually taxed this period (after caps and thresholds).
    pub taxable_wages: Decimal,
    /// Rate applied, when a single rate applies.
    pub rate: Option<Decimal>,
    /// Amount at internal precision.
    pub amount: Decimal,
    /// Rule or table the amount came from.
    pub source: String,
    /// Plain-language explanation.
    pub explanation: String,
}

/// Summary of the overtime computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeSummary {
    /// Hours counted toward the overtime threshold.
    pub counted_hours: Decimal,
    /// Hours beyond the threshold.
    pub overtime_hours: Decimal,
    /// Blended regular rate.
    pub regular_rate: Decimal,
    /// Overtime premium paid.
    pub overtime_premium: Decimal,
}

/// Detailed breakdown for downstream explanation tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDetails {
    /// Version of the engine that produced the result.
    pub engine_version: String,
    /// The as-of date of the calculation.
    pub calculation_date: NaiveDate,
    /// Pay frequency used for annualization.
    pub pay_frequency: PayFrequency,
    /// Tax engine used.
    pub tax_mode: TaxMode,
    /// Overtime summary.
    pub overtime: OvertimeSummary,
    /// Earnings lines.
    pub earnings_breakdown: Vec<EarningsLineDetail>,
    /// Deductions in processing order.
    pub deductions_breakdown: Vec<DeductionLineDetail>,
    /// Employee and employer tax calculations.
    pub tax_calculations: Vec<TaxCalculation>,
}

/// Kind of correction a result represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Retroactive pay for a rate change.
    RetroactivePay,
    /// Off-cycle supplemental payment or correction.
    OffCycleCorrection,
}

/// The delta a correction added onto its original result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    /// Correction kind.
    pub kind: AdjustmentKind,
    /// Reason supplied by the caller.
    pub reason: String,
    /// Gross pay added.
    pub gross_delta: Decimal,
    /// Taxes added.
    pub taxes_delta: TaxesWithheld,
    /// Employer taxes added.
    pub employer_taxes_delta: EmployerTaxes,
    /// Net pay added.
    pub net_delta: Decimal,
}

/// Provenance of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Name of the producing engine.
    pub engine_source: String,
    /// Whether this was a what-if simulation.
    pub is_simulation: bool,
    /// The result this one corrects, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_calculation_id: Option<Uuid>,
    /// The correction applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentRecord>,
}

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// Statutory or configuration reference for this rule.
    pub reference: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// Category of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Inconsistent flags or missing profile fields; the calculation
    /// proceeded with documented defaults.
    Validation,
    /// The result does not reconcile; it must not be finalized.
    CalculationIntegrity,
    /// Unknown configuration; a documented default was used.
    Configuration,
}

/// Severity of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs review.
    Medium,
    /// Blocks finalization or indicates wrong output.
    High,
}

/// A warning generated during calculation.
///
/// Warnings indicate problems that don't prevent calculation but may require
/// attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level.
    pub severity: Severity,
    /// The error category.
    pub kind: IssueKind,
}

impl AuditWarning {
    /// Creates a warning.
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            kind,
        }
    }

    /// A validation warning.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueKind::Validation, Severity::Medium, code, message)
    }

    /// A configuration fallback warning.
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueKind::Configuration, Severity::Medium, code, message)
    }

    /// An integrity failure.
    pub fn integrity(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueKind::CalculationIntegrity, Severity::High, code, message)
    }
}

/// The complete audit trace for a calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of calculation steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during calculation.
    pub warnings: Vec<AuditWarning>,
}

/// The complete result of a payroll calculation.
///
/// Monetary totals are rounded to cents; the breakdowns in
/// [`CalculationDetails`] keep internal precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Deterministic identifier derived from the input.
    pub calculation_id: Uuid,
    /// The employee the calculation is for.
    pub employee_id: String,
    /// First day of the pay period.
    pub pay_period_start: NaiveDate,
    /// Last day of the pay period.
    pub pay_period_end: NaiveDate,
    /// Gross pay.
    pub gross_pay: Decimal,
    /// Total pre-tax deductions.
    pub pre_tax_deductions: Decimal,
    /// Taxable wage bases.
    pub taxable_wages: TaxableWages,
    /// Employee taxes withheld.
    pub taxes_withheld: TaxesWithheld,
    /// Total post-tax deductions.
    pub post_tax_deductions: Decimal,
    /// Net pay, clamped at zero.
    pub net_pay: Decimal,
    /// Net pay before clamping.
    pub unclamped_net_pay: Decimal,
    /// Whether net pay was clamped because it would have been negative.
    pub net_pay_clamped: bool,
    /// Employer tax liability.
    pub employer_taxes: EmployerTaxes,
    /// Detailed breakdowns.
    pub calculation_details: CalculationDetails,
    /// Provenance.
    pub metadata: ResultMetadata,
    /// Audit trace.
    pub audit_trace: AuditTrace,
}

/// Namespace for deterministic calculation identifiers.
pub const CALCULATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a7e_94b3_4d0f_8e21_5b7a_c3d9_e104);

impl CalculationResult {
    /// Derives a calculation id from a seed, so identical seeds always yield
    /// the same id.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::CalculationResult;
    ///
    /// let a = CalculationResult::derive_id(b"emp_001/2024-03-10");
    /// let b = CalculationResult::derive_id(b"emp_001/2024-03-10");
    /// assert_eq!(a, b);
    /// assert_ne!(a, CalculationResult::derive_id(b"emp_002/2024-03-10"));
    /// ```
    pub fn derive_id(seed: &[u8]) -> Uuid {
        Uuid::new_v5(&CALCULATION_NAMESPACE, seed)
    }

    /// Warnings of the given kind.
    pub fn issues_of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &AuditWarning> {
        self.audit_trace
            .warnings
            .iter()
            .filter(move |warning| warning.kind == kind)
    }

    /// Returns true when no integrity failure was recorded, so the pay
    /// period may be finalized with this result.
    pub fn is_finalizable(&self) -> bool {
        self.issues_of_kind(IssueKind::CalculationIntegrity)
            .next()
            .is_none()
    }

    /// Errors with [`EngineError::IntegrityViolation`] unless the result is
    /// finalizable.
    pub fn ensure_finalizable(&self) -> EngineResult<()> {
        let issues: Vec<String> = self
            .issues_of_kind(IssueKind::CalculationIntegrity)
            .map(|warning| format!("{}: {}", warning.code, warning.message))
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(EngineError::IntegrityViolation { issues })
        }
    }
}
