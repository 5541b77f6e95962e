//! The payroll calculation pipeline.
//!
//! [`PayrollEngine`] runs one employee's pay period through a fixed sequence:
//! classify → earnings → deductions → taxable wages → taxes (single- or
//! multi-jurisdiction) → employer taxes → net pay → validation. Audit steps
//! are numbered sequentially across the stages.
//!
//! The engine holds only read-only configuration, so one instance can be
//! shared across threads and calculations run in parallel without locking.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::calculation::{
    CorrectionContext, DeductionLimits, MultiRegionSettings, NoReciprocity, OffCycleCorrection,
    ReciprocityResolver, RetroactiveAdjustment, TaxContext, calculate_deductions,
    calculate_earnings, calculate_employer_taxes, calculate_multi_jurisdiction_tax,
    calculate_net_pay, calculate_taxes, derive_taxable_wages, process_off_cycle_correction,
    process_retroactive_adjustment, round_currency, validate_calculation, validate_pay_type_flags,
};
use crate::config::{PayrollConfig, TaxTable};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditTrace, AuditWarning, CalculationDetails, CalculationResult, IssueKind,
    PayrollInput, ResultMetadata, TaxMode,
};

/// The payroll calculation engine.
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
/// use payroll_engine::engine::PayrollEngine;
/// use payroll_engine::models::{EarningLine, EmployeeTaxProfile, FilingStatus, PayrollInput};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let config = ConfigLoader::load("./config/us_payroll")?.into_config();
/// let engine = PayrollEngine::new(config);
///
/// let input = PayrollInput::new(
///     "emp_001",
///     NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
///     vec![EarningLine::hourly("REG", Decimal::from(40), Decimal::from(25))],
///     EmployeeTaxProfile::new(FilingStatus::Single, "CA"),
/// );
/// let result = engine.calculate(&input)?;
/// println!("Net pay: ${}", result.net_pay);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Clone)]
pub struct PayrollEngine {
    config: Arc<PayrollConfig>,
    resolver: Arc<dyn ReciprocityResolver + Send + Sync>,
}

impl PayrollEngine {
    /// Creates an engine with no reciprocity agreements.
    pub fn new(config: PayrollConfig) -> Self {
        Self::with_resolver(config, NoReciprocity)
    }

    /// Creates an engine with a custom reciprocity resolver.
    pub fn with_resolver<R>(config: PayrollConfig, resolver: R) -> Self
    where
        R: ReciprocityResolver + Send + Sync + 'static,
    {
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
        }
    }

    /// Returns the engine's configuration.
    pub fn config(&self) -> &PayrollConfig {
        &self.config
    }

    /// Calculates one employee's pay for one period.
    ///
    /// Validation and configuration problems are reported as warnings in the
    /// audit trace and the calculation proceeds with documented defaults,
    /// unless `block_on_validation_errors` is set. Integrity failures are
    /// recorded in the trace and make the result non-finalizable.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] for malformed input
    /// - [`EngineError::ValidationFailed`] when blocking on validation errors
    /// - [`EngineError::TaxTableNotFound`] when no tax table covers the as-of date
    pub fn calculate(&self, input: &PayrollInput) -> EngineResult<CalculationResult> {
        input.validate_shape()?;

        let config = self.config.as_ref();
        let settings = config.settings();
        let as_of = input.as_of_date();
        let frequency = input.frequency();
        let tax_mode = input.tax_mode.unwrap_or(settings.tax_mode);
        let profile = &input.tax_profile;
        let work_state = profile
            .primary_work_jurisdiction
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        debug!(
            employee_id = %input.employee_id,
            as_of = %as_of,
            ?frequency,
            ?tax_mode,
            "starting payroll calculation"
        );

        let mut step_number: u32 = 1;
        let mut all_audit_steps = Vec::new();

        // Classification and input validation
        let (classification_step, mut all_warnings) = self.classify(input, step_number);
        all_audit_steps.push(classification_step);
        step_number += 1;

        if input.block_on_validation_errors && !all_warnings.is_empty() {
            let errors = all_warnings
                .iter()
                .map(|warning| warning.message.clone())
                .collect();
            warn!(employee_id = %input.employee_id, "blocking on validation errors");
            return Err(EngineError::ValidationFailed { errors });
        }

        let table = config.tax_table_for(as_of)?;

        // Earnings
        let earnings = calculate_earnings(
            &input.earnings,
            config.pay_types(),
            &settings.overtime,
            step_number,
        )?;
        step_number += earnings.audit_steps.len() as u32;
        all_audit_steps.extend(earnings.audit_steps);
        all_warnings.extend(earnings.warnings);
        debug!(
            gross = %earnings.total_gross,
            overtime_hours = %earnings.overtime_hours,
            regular_rate = %earnings.regular_rate,
            "earnings calculated"
        );

        // Deductions
        let limits = DeductionLimits {
            annual: &table.deduction_limits,
            catch_up: &table.catch_up_limits,
        };
        let deductions = calculate_deductions(
            &input.deductions,
            earnings.total_gross,
            &earnings.breakdown,
            limits,
            step_number,
        );
        step_number += 1;
        all_audit_steps.push(deductions.audit_step);
        debug!(
            pre_tax = %deductions.pre_tax_total,
            post_tax = %deductions.post_tax_total,
            "deductions calculated"
        );

        // Taxes
        let bases = derive_taxable_wages(&earnings.breakdown, deductions.pre_tax_total);
        let taxes = match tax_mode {
            TaxMode::SingleJurisdiction => {
                let context = TaxContext {
                    table,
                    filing_status: profile.effective_filing_status(),
                    allowances: profile.allowances,
                    additional_withholding: profile.additional_withholding,
                    work_state,
                    frequency,
                };
                calculate_taxes(&bases, &input.ytd, &context, step_number)
            }
            TaxMode::MultiJurisdiction => {
                let region_settings = MultiRegionSettings {
                    home_country: &settings.home_country,
                    default_state_rate: table.default_state_rate,
                    as_of,
                };
                calculate_multi_jurisdiction_tax(
                    config.registry(),
                    profile,
                    &bases,
                    &input.ytd,
                    &region_settings,
                    self.resolver.as_ref(),
                    step_number,
                )
            }
        };
        step_number += taxes.audit_steps.len() as u32;
        all_audit_steps.extend(taxes.audit_steps);
        all_warnings.extend(taxes.warnings);

        let employer = calculate_employer_taxes(&bases, &input.ytd, table, work_state, step_number);
        step_number += 1;
        all_audit_steps.push(employer.audit_step);
        all_warnings.extend(employer.warnings);

        // Net pay, from values rounded once at the output boundary
        let gross_pay = round_currency(earnings.total_gross);
        let pre_tax_deductions = round_currency(deductions.pre_tax_total);
        let post_tax_deductions = round_currency(deductions.post_tax_total);
        let taxes_withheld = taxes.withheld.map(round_currency);
        let employer_taxes = employer.taxes.map(round_currency);

        let net = calculate_net_pay(
            gross_pay,
            pre_tax_deductions,
            taxes_withheld.total(),
            post_tax_deductions,
            step_number,
        );
        all_audit_steps.push(net.audit_step);

        for warning in all_warnings
            .iter()
            .filter(|warning| warning.kind == IssueKind::Configuration)
        {
            warn!(
                employee_id = %input.employee_id,
                code = %warning.code,
                "{}",
                warning.message
            );
        }

        let mut tax_calculations = taxes.calculations;
        tax_calculations.extend(employer.calculations);

        let mut result = CalculationResult {
            calculation_id: self.calculation_id(input)?,
            employee_id: input.employee_id.clone(),
            pay_period_start: input.pay_period_start,
            pay_period_end: input.pay_period_end,
            gross_pay,
            pre_tax_deductions,
            taxable_wages: bases.map(round_currency),
            taxes_withheld,
            post_tax_deductions,
            net_pay: net.net_pay,
            unclamped_net_pay: net.unclamped_net_pay,
            net_pay_clamped: net.clamped,
            employer_taxes,
            calculation_details: CalculationDetails {
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                calculation_date: as_of,
                pay_frequency: frequency,
                tax_mode,
                overtime: earnings.overtime,
                earnings_breakdown: earnings.breakdown,
                deductions_breakdown: deductions.breakdown,
                tax_calculations,
            },
            metadata: ResultMetadata {
                engine_source: config.metadata().name.clone(),
                is_simulation: input.simulation,
                original_calculation_id: None,
                adjustment: None,
            },
            audit_trace: AuditTrace {
                steps: all_audit_steps,
                warnings: all_warnings,
            },
        };

        let issues = validate_calculation(&result, settings.validation_tolerance);
        for issue in &issues {
            warn!(
                employee_id = %input.employee_id,
                code = %issue.code,
                "{}",
                issue.message
            );
        }
        result.audit_trace.warnings.extend(issues);

        info!(
            employee_id = %result.employee_id,
            calculation_id = %result.calculation_id,
            gross_pay = %result.gross_pay,
            net_pay = %result.net_pay,
            steps = result.audit_trace.steps.len(),
            warnings = result.audit_trace.warnings.len(),
            "payroll calculation completed"
        );

        Ok(result)
    }

    /// Produces a new result adding retroactive back pay to `original`.
    ///
    /// `input` must be the input `original` was calculated from; its YTD
    /// snapshot, tax profile and as-of date anchor the correction.
    pub fn process_retroactive_adjustment(
        &self,
        original: &CalculationResult,
        input: &PayrollInput,
        adjustment: &RetroactiveAdjustment,
    ) -> EngineResult<CalculationResult> {
        let pay_type = self.config.pay_type(&adjustment.pay_type)?;
        let table = self.correction_table(original, input)?;
        let context = self.correction_context(original, input, table);
        let result = process_retroactive_adjustment(&context, pay_type, adjustment)?;
        info!(
            employee_id = %result.employee_id,
            original_calculation_id = %original.calculation_id,
            calculation_id = %result.calculation_id,
            net_pay = %result.net_pay,
            "retroactive adjustment applied"
        );
        Ok(result)
    }

    /// Produces a new result adding an off-cycle payment to `original`.
    ///
    /// `input` must be the input `original` was calculated from.
    pub fn process_off_cycle_correction(
        &self,
        original: &CalculationResult,
        input: &PayrollInput,
        correction: &OffCycleCorrection,
    ) -> EngineResult<CalculationResult> {
        let pay_type = self.config.pay_type(&correction.pay_type)?;
        let table = self.correction_table(original, input)?;
        let context = self.correction_context(original, input, table);
        let result = process_off_cycle_correction(&context, pay_type, correction)?;
        info!(
            employee_id = %result.employee_id,
            original_calculation_id = %original.calculation_id,
            calculation_id = %result.calculation_id,
            net_pay = %result.net_pay,
            "off-cycle correction applied"
        );
        Ok(result)
    }

    /// Validates the flags of every pay type the input uses and the tax
    /// profile, returning the classification audit step and the validation
    /// warnings.
    fn classify(&self, input: &PayrollInput, step_number: u32) -> (AuditStep, Vec<AuditWarning>) {
        let mut warnings = Vec::new();
        let used: BTreeSet<&str> = input
            .earnings
            .iter()
            .map(|line| line.pay_type.as_str())
            .collect();

        for code in &used {
            if let Some(pay_type) = self.config.pay_types().get(*code) {
                let validation = validate_pay_type_flags(pay_type);
                warnings.extend(
                    validation
                        .errors
                        .into_iter()
                        .map(|error| AuditWarning::validation("INVALID_PAY_TYPE_FLAGS", error)),
                );
            }
        }

        for field in input.tax_profile.missing_fields() {
            let fallback = match field {
                "filing_status" => "withholding as single",
                _ => "using the default state rate",
            };
            warnings.push(AuditWarning::validation(
                "MISSING_TAX_PROFILE_FIELD",
                format!("Tax profile is missing {}; {}", field, fallback),
            ));
        }

        let step = AuditStep {
            step_number,
            rule_id: "pay_type_classification".to_string(),
            rule_name: "Pay Type Classification".to_string(),
            reference: "pay_types.yaml".to_string(),
            input: json!({
                "pay_types": used.iter().collect::<Vec<_>>(),
                "missing_profile_fields": input.tax_profile.missing_fields(),
            }),
            output: json!({
                "validation_errors": warnings.len(),
            }),
            reasoning: if warnings.is_empty() {
                format!("{} pay type(s) used; flags and tax profile valid", used.len())
            } else {
                format!(
                    "{} pay type(s) used; {} validation error(s), proceeding with defaults",
                    used.len(),
                    warnings.len()
                )
            },
        };
        (step, warnings)
    }

    /// Id derived from the configuration version and the serialized input.
    fn calculation_id(&self, input: &PayrollInput) -> EngineResult<uuid::Uuid> {
        let mut seed = self.config.metadata().version.as_bytes().to_vec();
        let payload = serde_json::to_vec(input).map_err(|e| EngineError::InvalidInput {
            field: "input".to_string(),
            message: e.to_string(),
        })?;
        seed.extend_from_slice(&payload);
        Ok(CalculationResult::derive_id(&seed))
    }

    fn correction_table(
        &self,
        original: &CalculationResult,
        input: &PayrollInput,
    ) -> EngineResult<&TaxTable> {
        if original.employee_id != input.employee_id {
            return Err(EngineError::InvalidInput {
                field: "employee_id".to_string(),
                message: format!(
                    "input is for {}, original result is for {}",
                    input.employee_id, original.employee_id
                ),
            });
        }
        self.config.tax_table_for(input.as_of_date())
    }

    fn correction_context<'a>(
        &'a self,
        original: &'a CalculationResult,
        input: &'a PayrollInput,
        table: &'a TaxTable,
    ) -> CorrectionContext<'a> {
        CorrectionContext {
            original,
            prior_ytd: &input.ytd,
            table,
            filing_status: input.tax_profile.effective_filing_status(),
            work_state: input
                .tax_profile
                .primary_work_jurisdiction
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty()),
            tolerance: self.config.settings().validation_tolerance,
        }
    }
}

impl std::fmt::Debug for PayrollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayrollEngine")
            .field("config", &self.config.metadata())
            .finish_non_exhaustive()
    }
}
