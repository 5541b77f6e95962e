//! Configuration types for payroll calculation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calculation::JurisdictionRegistry;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    DeductionType, FilingStatus, PayTypeDefinition, TaxBracket, TaxJurisdiction, TaxMode,
};

/// Metadata about the configuration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetadata {
    /// Name reported as the result's engine source.
    pub name: String,
    /// Version of the configuration set.
    pub version: String,
    /// Where the statutory figures were taken from.
    pub source_url: String,
}

/// Weekly overtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeSettings {
    /// Hours per period before overtime begins.
    pub weekly_threshold_hours: Decimal,
    /// Premium on top of straight time for each overtime hour (0.5 for
    /// time-and-a-half).
    pub premium_multiplier: Decimal,
    /// Adds the premium to the earnings as its own line.
    pub auto_premium: bool,
}

impl Default for OvertimeSettings {
    fn default() -> Self {
        Self {
            weekly_threshold_hours: Decimal::from(40),
            premium_multiplier: Decimal::new(5, 1),
            auto_premium: true,
        }
    }
}

fn default_tolerance() -> Decimal {
    Decimal::new(2, 2)
}

fn default_home_country() -> String {
    "US".to_string()
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Overtime settings.
    #[serde(default)]
    pub overtime: OvertimeSettings,
    /// Tax engine used when the input does not choose one.
    #[serde(default)]
    pub tax_mode: TaxMode,
    /// Largest net pay discrepancy accepted by reconciliation.
    #[serde(default = "default_tolerance")]
    pub validation_tolerance: Decimal,
    /// Country jurisdiction always evaluated in multi-jurisdiction mode.
    #[serde(default = "default_home_country")]
    pub home_country: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            overtime: OvertimeSettings::default(),
            tax_mode: TaxMode::default(),
            validation_tolerance: default_tolerance(),
            home_country: default_home_country(),
        }
    }
}

/// engine.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineFile {
    /// Metadata.
    pub engine: EngineMetadata,
    /// Settings.
    #[serde(default)]
    pub settings: EngineSettings,
}

/// pay_types.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct PayTypesFile {
    /// The registered pay types.
    pub pay_types: Vec<PayTypeDefinition>,
}

/// jurisdictions.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionsFile {
    /// The registered jurisdictions.
    pub jurisdictions: Vec<TaxJurisdiction>,
}

/// A rate with an optional annual wage base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WageBaseRate {
    /// The rate.
    pub rate: Decimal,
    /// Annual wage base above which no tax is due.
    #[serde(default)]
    pub wage_base: Option<Decimal>,
}

/// Medicare rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicareRates {
    /// Base Medicare rate, matched by the employer.
    pub rate: Decimal,
    /// Additional Medicare rate (employee only).
    pub additional_rate: Decimal,
    /// Wages above which Additional Medicare applies, by filing status.
    pub additional_thresholds: BTreeMap<FilingStatus, Decimal>,
}

/// A dated tax table: federal brackets, caps and state rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTable {
    /// First date the table applies.
    pub effective_date: NaiveDate,
    /// Social Security rate and wage base.
    pub social_security: WageBaseRate,
    /// Medicare rates.
    pub medicare: MedicareRates,
    /// FUTA rate and wage base.
    pub futa: WageBaseRate,
    /// Flat federal withholding rate for supplemental wages.
    pub supplemental_rate: Decimal,
    /// Annual amount removed from taxable wages per allowance.
    pub allowance_amount: Decimal,
    /// Annual federal brackets by filing status.
    pub federal_brackets: BTreeMap<FilingStatus, Vec<TaxBracket>>,
    /// Flat state income tax rates by state code.
    #[serde(default)]
    pub state_income_rates: BTreeMap<String, Decimal>,
    /// State rate used for states missing from `state_income_rates`.
    pub default_state_rate: Decimal,
    /// State disability insurance by state code.
    #[serde(default)]
    pub state_disability: BTreeMap<String, WageBaseRate>,
    /// SUTA rates and wage bases by state code.
    #[serde(default)]
    pub suta: BTreeMap<String, WageBaseRate>,
    /// SUTA used for states missing from `suta`.
    pub default_suta: WageBaseRate,
    /// Annual deduction limits by deduction type.
    #[serde(default)]
    pub deduction_limits: BTreeMap<DeductionType, Decimal>,
    /// Annual catch-up limits by deduction type.
    #[serde(default)]
    pub catch_up_limits: BTreeMap<DeductionType, Decimal>,
}

impl TaxTable {
    /// Federal brackets for a filing status, falling back to single.
    pub fn brackets_for(&self, filing_status: FilingStatus) -> Option<&[TaxBracket]> {
        self.federal_brackets
            .get(&filing_status)
            .or_else(|| self.federal_brackets.get(&FilingStatus::Single))
            .map(Vec::as_slice)
    }

    /// Additional Medicare threshold for a filing status, falling back to
    /// single.
    pub fn additional_medicare_threshold(&self, filing_status: FilingStatus) -> Option<Decimal> {
        self.medicare
            .additional_thresholds
            .get(&filing_status)
            .or_else(|| {
                self.medicare
                    .additional_thresholds
                    .get(&FilingStatus::Single)
            })
            .copied()
    }
}

/// The complete payroll configuration loaded from YAML files.
///
/// Built once and shared read-only by every calculation.
#[derive(Debug, Clone)]
pub struct PayrollConfig {
    metadata: EngineMetadata,
    settings: EngineSettings,
    pay_types: BTreeMap<String, PayTypeDefinition>,
    registry: JurisdictionRegistry,
    /// Tax tables sorted oldest first.
    tax_tables: Vec<TaxTable>,
}

impl PayrollConfig {
    /// Creates a new PayrollConfig from its component parts.
    ///
    /// Pay type codes must be unique; a repeated code is reported as a
    /// parse error against the pay type registry.
    pub fn new(
        metadata: EngineMetadata,
        settings: EngineSettings,
        pay_types: Vec<PayTypeDefinition>,
        registry: JurisdictionRegistry,
        tax_tables: Vec<TaxTable>,
    ) -> EngineResult<Self> {
        let mut pay_type_map = BTreeMap::new();
        for pay_type in pay_types {
            let code = pay_type.code.clone();
            if pay_type_map.insert(code.clone(), pay_type).is_some() {
                return Err(EngineError::ConfigParseError {
                    path: "pay_types".to_string(),
                    message: format!("duplicate pay type code {}", code),
                });
            }
        }

        let mut sorted_tables = tax_tables;
        sorted_tables.sort_by(|a, b| a.effective_date.cmp(&b.effective_date));

        Ok(Self {
            metadata,
            settings,
            pay_types: pay_type_map,
            registry,
            tax_tables: sorted_tables,
        })
    }

    /// Returns the configuration metadata.
    pub fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the pay type registry.
    pub fn pay_types(&self) -> &BTreeMap<String, PayTypeDefinition> {
        &self.pay_types
    }

    /// Looks up a pay type by code.
    pub fn pay_type(&self, code: &str) -> EngineResult<&PayTypeDefinition> {
        self.pay_types
            .get(code)
            .ok_or_else(|| EngineError::PayTypeNotFound {
                code: code.to_string(),
            })
    }

    /// Returns the jurisdiction registry.
    pub fn registry(&self) -> &JurisdictionRegistry {
        &self.registry
    }

    /// Returns all tax tables, oldest first.
    pub fn tax_tables(&self) -> &[TaxTable] {
        &self.tax_tables
    }

    /// Returns the most recent tax table effective on or before `date`.
    pub fn tax_table_for(&self, date: NaiveDate) -> EngineResult<&TaxTable> {
        self.tax_tables
            .iter()
            .rev()
            .find(|table| table.effective_date <= date)
            .ok_or(EngineError::TaxTableNotFound { date })
    }
}
