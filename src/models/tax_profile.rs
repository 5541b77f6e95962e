//! Employee tax profile.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Federal filing status from the employee's withholding certificate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    /// Single (also the default when no status is on file).
    #[default]
    Single,
    /// Married filing jointly.
    MarriedFilingJointly,
    /// Married filing separately.
    MarriedFilingSeparately,
    /// Head of household.
    HeadOfHousehold,
}

impl FilingStatus {
    /// Returns the snake_case name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilingStatus::Single => "single",
            FilingStatus::MarriedFilingJointly => "married_filing_jointly",
            FilingStatus::MarriedFilingSeparately => "married_filing_separately",
            FilingStatus::HeadOfHousehold => "head_of_household",
        }
    }
}

/// The withholding-relevant facts about an employee.
///
/// Missing fields are reported as validation warnings and replaced by the
/// documented defaults: filing status [`FilingStatus::Single`], zero
/// allowances, and the configured default state rate when no work
/// jurisdiction is on file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeTaxProfile {
    /// Filing status.
    #[serde(default)]
    pub filing_status: Option<FilingStatus>,
    /// Number of withholding allowances.
    #[serde(default)]
    pub allowances: u32,
    /// Extra federal withholding requested per period.
    #[serde(default)]
    pub additional_withholding: Decimal,
    /// Primary work jurisdiction code (e.g., "CA").
    #[serde(default)]
    pub primary_work_jurisdiction: Option<String>,
    /// Remote work jurisdiction code.
    #[serde(default)]
    pub remote_work_jurisdiction: Option<String>,
    /// Residency jurisdiction code.
    #[serde(default)]
    pub residency_jurisdiction: Option<String>,
}

impl EmployeeTaxProfile {
    /// Creates a profile working in the given jurisdiction.
    pub fn new(filing_status: FilingStatus, primary_work_jurisdiction: impl Into<String>) -> Self {
        Self {
            filing_status: Some(filing_status),
            primary_work_jurisdiction: Some(primary_work_jurisdiction.into()),
            ..Self::default()
        }
    }

    /// The filing status, defaulting to single.
    pub fn effective_filing_status(&self) -> FilingStatus {
        self.filing_status.unwrap_or_default()
    }

    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.filing_status.is_none() {
            missing.push("filing_status");
        }
        if self
            .primary_work_jurisdiction
            .as_deref()
            .is_none_or(|code| code.trim().is_empty())
        {
            missing.push("primary_work_jurisdiction");
        }
        missing
    }
}
