//! Calculation input: one employee, one pay period.
//!
//! Everything the engine needs is resolved by the caller and passed in,
//! including the YTD snapshot and the as-of date used for rule matching, so a
//! calculation never depends on the wall clock.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::{DeductionAmount, DeductionDefinition, EarningLine, EmployeeTaxProfile};

/// How often the employee is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayFrequency {
    /// 52 periods per year.
    Weekly,
    /// 26 periods per year.
    Biweekly,
    /// 24 periods per year.
    Semimonthly,
    /// 12 periods per year.
    Monthly,
}

impl PayFrequency {
    /// Number of pay periods in a year.
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PayFrequency::Weekly => 52,
            PayFrequency::Biweekly => 26,
            PayFrequency::Semimonthly => 24,
            PayFrequency::Monthly => 12,
        }
    }

    /// Infers the frequency from an inclusive period's length in days:
    /// up to 7 is weekly, up to 14 biweekly, up to 16 semimonthly, and
    /// anything longer monthly.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::PayFrequency;
    /// use chrono::NaiveDate;
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
    /// assert_eq!(PayFrequency::from_period(start, end), PayFrequency::Biweekly);
    /// ```
    pub fn from_period(start: NaiveDate, end: NaiveDate) -> Self {
        let days = (end - start).num_days() + 1;
        match days {
            ..=7 => PayFrequency::Weekly,
            8..=14 => PayFrequency::Biweekly,
            15..=16 => PayFrequency::Semimonthly,
            _ => PayFrequency::Monthly,
        }
    }
}

/// Which tax engine computes employee withholding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Federal brackets plus a flat state rate for the work state.
    #[default]
    SingleJurisdiction,
    /// Every effective rule of every detected jurisdiction.
    MultiJurisdiction,
}

/// Year-to-date wages through the prior period, per wage base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YtdSnapshot {
    /// Gross wages.
    pub gross_wages: Decimal,
    /// Federal income tax wages.
    pub federal_taxable_wages: Decimal,
    /// State income tax wages.
    pub state_taxable_wages: Decimal,
    /// Local income tax wages.
    pub local_taxable_wages: Decimal,
    /// Social Security wages.
    pub social_security_wages: Decimal,
    /// Medicare wages.
    pub medicare_wages: Decimal,
    /// FUTA wages.
    pub futa_wages: Decimal,
    /// SUTA wages.
    pub suta_wages: Decimal,
    /// SDI wages.
    pub sdi_wages: Decimal,
}

/// The input to a single payroll calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollInput {
    /// Employee identifier.
    pub employee_id: String,
    /// First day of the pay period (inclusive).
    pub pay_period_start: NaiveDate,
    /// Last day of the pay period (inclusive).
    pub pay_period_end: NaiveDate,
    /// Earning lines for the period.
    pub earnings: Vec<EarningLine>,
    /// Deductions to apply.
    #[serde(default)]
    pub deductions: Vec<DeductionDefinition>,
    /// Withholding profile.
    pub tax_profile: EmployeeTaxProfile,
    /// Year-to-date wages through the prior period.
    #[serde(default)]
    pub ytd: YtdSnapshot,
    /// Date used to select tax tables and rules; defaults to the period end.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Pay frequency; inferred from the period length when absent.
    #[serde(default)]
    pub pay_frequency: Option<PayFrequency>,
    /// Tax engine selection; the engine setting applies when absent.
    #[serde(default)]
    pub tax_mode: Option<TaxMode>,
    /// Marks the calculation as a what-if simulation.
    #[serde(default)]
    pub simulation: bool,
    /// Return an error instead of proceeding when validation errors exist.
    #[serde(default)]
    pub block_on_validation_errors: bool,
}

impl PayrollInput {
    /// Creates an input with no deductions, zero YTD and default options.
    pub fn new(
        employee_id: impl Into<String>,
        pay_period_start: NaiveDate,
        pay_period_end: NaiveDate,
        earnings: Vec<EarningLine>,
        tax_profile: EmployeeTaxProfile,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            pay_period_start,
            pay_period_end,
            earnings,
            deductions: Vec::new(),
            tax_profile,
            ytd: YtdSnapshot::default(),
            as_of: None,
            pay_frequency: None,
            tax_mode: None,
            simulation: false,
            block_on_validation_errors: false,
        }
    }

    /// The date used for tax table and rule matching.
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.unwrap_or(self.pay_period_end)
    }

    /// The pay frequency, inferred from the period when not supplied.
    pub fn frequency(&self) -> PayFrequency {
        self.pay_frequency
            .unwrap_or_else(|| PayFrequency::from_period(self.pay_period_start, self.pay_period_end))
    }

    /// Rejects input whose shape makes a calculation meaningless.
    pub fn validate_shape(&self) -> EngineResult<()> {
        if self.employee_id.trim().is_empty() {
            return Err(EngineError::InvalidInput {
                field: "employee_id".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.pay_period_end < self.pay_period_start {
            return Err(EngineError::InvalidInput {
                field: "pay_period_end".to_string(),
                message: format!(
                    "{} is before pay_period_start {}",
                    self.pay_period_end, self.pay_period_start
                ),
            });
        }
        for (index, line) in self.earnings.iter().enumerate() {
            if line.hours < Decimal::ZERO {
                return Err(EngineError::InvalidInput {
                    field: format!("earnings[{}].hours", index),
                    message: "hours cannot be negative".to_string(),
                });
            }
            if line.rate.is_some_and(|rate| rate < Decimal::ZERO) {
                return Err(EngineError::InvalidInput {
                    field: format!("earnings[{}].rate", index),
                    message: "rate cannot be negative".to_string(),
                });
            }
        }
        if self.tax_profile.additional_withholding < Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                field: "tax_profile.additional_withholding".to_string(),
                message: "additional withholding cannot be negative".to_string(),
            });
        }
        for (index, deduction) in self.deductions.iter().enumerate() {
            match deduction.amount {
                DeductionAmount::Flat { amount } if amount < Decimal::ZERO => {
                    return Err(EngineError::InvalidInput {
                        field: format!("deductions[{}].amount", index),
                        message: "flat amount cannot be negative".to_string(),
                    });
                }
                DeductionAmount::Percentage { rate }
                    if rate < Decimal::ZERO || rate > Decimal::ONE =>
                {
                    return Err(EngineError::InvalidInput {
                        field: format!("deductions[{}].amount", index),
                        message: format!("percentage rate {} must be between 0 and 1", rate),
                    });
                }
                _ => {}
            }
            if deduction.current_ytd < Decimal::ZERO || deduction.arrears_balance < Decimal::ZERO {
                return Err(EngineError::InvalidInput {
                    field: format!("deductions[{}]", index),
                    message: "year-to-date and arrears amounts cannot be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeductionType, FilingStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_input() -> PayrollInput {
        PayrollInput::new(
            "emp_001",
            date(2024, 3, 4),
            date(2024, 3, 10),
            vec![EarningLine::hourly("REG", Decimal::from(40), Decimal::from(25))],
            EmployeeTaxProfile::new(FilingStatus::Single, "CA"),
        )
    }

    #[test]
    fn test_frequency_inferred_from_period_length() {
        assert_eq!(
            PayFrequency::from_period(date(2024, 3, 4), date(2024, 3, 10)),
            PayFrequency::Weekly
        );
        assert_eq!(
            PayFrequency::from_period(date(2024, 3, 1), date(2024, 3, 15)),
            PayFrequency::Semimonthly
        );
        assert_eq!(
            PayFrequency::from_period(date(2024, 3, 1), date(2024, 3, 31)),
            PayFrequency::Monthly
        );
    }

    #[test]
    fn test_explicit_frequency_wins() {
        let mut input = sample_input();
        input.pay_frequency = Some(PayFrequency::Monthly);
        assert_eq!(input.frequency(), PayFrequency::Monthly);
    }

    #[test]
    fn test_as_of_defaults_to_period_end() {
        let mut input = sample_input();
        assert_eq!(input.as_of_date(), date(2024, 3, 10));
        input.as_of = Some(date(2024, 3, 12));
        assert_eq!(input.as_of_date(), date(2024, 3, 12));
    }

    #[test]
    fn test_validate_shape_accepts_valid_input() {
        assert!(sample_input().validate_shape().is_ok());
    }

    #[test]
    fn test_validate_shape_rejects_inverted_period() {
        let mut input = sample_input();
        input.pay_period_end = date(2024, 3, 1);
        match input.validate_shape() {
            Err(EngineError::InvalidInput { field, .. }) => assert_eq!(field, "pay_period_end"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_shape_rejects_negative_hours() {
        let mut input = sample_input();
        input.earnings[0].hours = Decimal::from(-1);
        match input.validate_shape() {
            Err(EngineError::InvalidInput { field, .. }) => {
                assert_eq!(field, "earnings[0].hours")
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_shape_rejects_negative_flat_deduction() {
        let mut input = sample_input();
        input.deductions.push(DeductionDefinition::new(
            "HSA",
            DeductionType::Hsa,
            DeductionAmount::Flat {
                amount: Decimal::from(-50),
            },
            true,
        ));
        match input.validate_shape() {
            Err(EngineError::InvalidInput { field, .. }) => {
                assert_eq!(field, "deductions[0].amount")
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_shape_rejects_percentage_outside_unit_range() {
        for rate in [Decimal::new(-1, 2), Decimal::new(15, 1)] {
            let mut input = sample_input();
            input.deductions.push(DeductionDefinition::new(
                "401K",
                DeductionType::Retirement401k,
                DeductionAmount::Percentage { rate },
                true,
            ));
            match input.validate_shape() {
                Err(EngineError::InvalidInput { field, .. }) => {
                    assert_eq!(field, "deductions[0].amount")
                }
                other => panic!("Expected InvalidInput for {}, got {:?}", rate, other),
            }
        }
    }

    #[test]
    fn test_validate_shape_accepts_full_percentage() {
        let mut input = sample_input();
        input.deductions.push(DeductionDefinition::new(
            "GARN",
            DeductionType::Garnishment,
            DeductionAmount::Percentage { rate: Decimal::ONE },
            false,
        ));
        assert!(input.validate_shape().is_ok());
    }

    #[test]
    fn test_validate_shape_rejects_negative_additional_withholding() {
        let mut input = sample_input();
        input.tax_profile.additional_withholding = Decimal::from(-20);
        match input.validate_shape() {
            Err(EngineError::InvalidInput { field, .. }) => {
                assert_eq!(field, "tax_profile.additional_withholding")
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_minimal_input() {
        let json = r#"{
            "employee_id": "emp_001",
            "pay_period_start": "2024-03-04",
            "pay_period_end": "2024-03-10",
            "earnings": [{ "type": "REG", "hours": "40", "rate": "25" }],
            "tax_profile": { "filing_status": "single", "primary_work_jurisdiction": "CA" }
        }"#;
        let input: PayrollInput = serde_json::from_str(json).unwrap();
        assert!(input.deductions.is_empty());
        assert_eq!(input.ytd, YtdSnapshot::default());
        assert!(!input.simulation);
        assert_eq!(input.tax_mode, None);
    }
}
