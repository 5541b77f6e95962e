//! Tax jurisdictions and their rules.
//!
//! Jurisdictions are versioned configuration: every [`TaxRule`] carries an
//! effective date and an optional expiry date, and rule matching is always
//! done against an explicit as-of date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FilingStatus;

/// The level of government a jurisdiction represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionType {
    /// A country (federal taxes).
    Country,
    /// A US state.
    State,
    /// A province.
    Province,
    /// A city, county or school district.
    Local,
}

/// What a rule taxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    /// Income tax.
    Income,
    /// Social Security / pension contributions.
    SocialSecurity,
    /// Medicare / health contributions.
    Medicare,
    /// Disability insurance.
    Disability,
    /// Unemployment insurance.
    Unemployment,
}

/// Who bears a rule's tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// Withheld from the employee.
    Employee,
    /// Paid by the employer.
    Employer,
    /// Both sides.
    Both,
}

impl Applicability {
    /// Returns true if the employee bears this tax.
    pub fn applies_to_employee(&self) -> bool {
        matches!(self, Applicability::Employee | Applicability::Both)
    }

    /// Returns true if the employer bears this tax.
    pub fn applies_to_employer(&self) -> bool {
        matches!(self, Applicability::Employer | Applicability::Both)
    }
}

/// One bracket of a progressive schedule.
///
/// A bracket covers income from `min_income` up to `max_income`, or up to
/// the next bracket's `min_income` when `max_income` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Lower bound of the bracket (inclusive).
    pub min_income: Decimal,
    /// Upper bound of the bracket (exclusive), if any.
    #[serde(default)]
    pub max_income: Option<Decimal>,
    /// Marginal rate for income within the bracket.
    pub rate: Decimal,
}

/// How a rule computes its tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateSchedule {
    /// A fixed amount per period.
    Flat {
        /// The amount.
        amount: Decimal,
    },
    /// A single rate applied to the wage base.
    Percentage {
        /// The rate.
        rate: Decimal,
    },
    /// Marginal brackets applied to cumulative (YTD + current) income.
    Progressive {
        /// The brackets, in any order.
        brackets: Vec<TaxBracket>,
    },
}

/// A tax rule of a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRule {
    /// Rule identifier.
    pub id: String,
    /// What the rule taxes.
    pub tax_kind: TaxKind,
    /// How the tax is computed.
    pub schedule: RateSchedule,
    /// Who bears the tax.
    pub applicability: Applicability,
    /// First date the rule applies.
    pub effective_date: NaiveDate,
    /// Last date the rule applies (inclusive), if it expires.
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Annual wage base cap, if the rule is capped.
    #[serde(default)]
    pub wage_base_cap: Option<Decimal>,
    /// Restricts the rule to one filing status.
    #[serde(default)]
    pub filing_status: Option<FilingStatus>,
}

impl TaxRule {
    /// Returns true if the rule is in effect on `as_of`.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{Applicability, RateSchedule, TaxKind, TaxRule};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let rule = TaxRule {
    ///     id: "ca_sdi".to_string(),
    ///     tax_kind: TaxKind::Disability,
    ///     schedule: RateSchedule::Percentage { rate: Decimal::new(11, 3) },
    ///     applicability: Applicability::Employee,
    ///     effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    ///     expiry_date: Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
    ///     wage_base_cap: None,
    ///     filing_status: None,
    /// };
    /// assert!(rule.is_effective_on(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    /// assert!(!rule.is_effective_on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    /// ```
    pub fn is_effective_on(&self, as_of: NaiveDate) -> bool {
        self.effective_date <= as_of && self.expiry_date.is_none_or(|expiry| as_of <= expiry)
    }

    /// Returns true if the rule applies to the given filing status.
    pub fn applies_to_filing_status(&self, filing_status: FilingStatus) -> bool {
        self.filing_status.is_none_or(|status| status == filing_status)
    }
}

/// A taxing jurisdiction with its rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxJurisdiction {
    /// Jurisdiction code (e.g., "US", "CA", "NYC").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Level of government.
    pub jurisdiction_type: JurisdictionType,
    /// Enclosing jurisdiction, evaluated before this one.
    #[serde(default)]
    pub parent_code: Option<String>,
    /// The jurisdiction's rules.
    #[serde(default)]
    pub rules: Vec<TaxRule>,
}

impl TaxJurisdiction {
    /// Rules in effect on `as_of`, in configuration order.
    pub fn effective_rules(&self, as_of: NaiveDate) -> impl Iterator<Item = &TaxRule> {
        self.rules.iter().filter(move |rule| rule.is_effective_on(as_of))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(effective: NaiveDate, expiry: Option<NaiveDate>) -> TaxRule {
        TaxRule {
            id: "rule".to_string(),
            tax_kind: TaxKind::Income,
            schedule: RateSchedule::Percentage { rate: dec("0.05") },
            applicability: Applicability::Employee,
            effective_date: effective,
            expiry_date: expiry,
            wage_base_cap: None,
            filing_status: None,
        }
    }

    #[test]
    fn test_rule_not_effective_before_effective_date() {
        let rule = rule(date(2024, 1, 1), None);
        assert!(!rule.is_effective_on(date(2023, 12, 31)));
        assert!(rule.is_effective_on(date(2024, 1, 1)));
        assert!(rule.is_effective_on(date(2030, 6, 1)));
    }

    #[test]
    fn test_rule_expiry_is_inclusive() {
        let rule = rule(date(2023, 1, 1), Some(date(2023, 12, 31)));
        assert!(rule.is_effective_on(date(2023, 12, 31)));
        assert!(!rule.is_effective_on(date(2024, 1, 1)));
    }

    #[test]
    fn test_filing_status_restriction() {
        let mut rule = rule(date(2024, 1, 1), None);
        assert!(rule.applies_to_filing_status(FilingStatus::HeadOfHousehold));
        rule.filing_status = Some(FilingStatus::Single);
        assert!(rule.applies_to_filing_status(FilingStatus::Single));
        assert!(!rule.applies_to_filing_status(FilingStatus::MarriedFilingJointly));
    }

    #[test]
    fn test_applicability() {
        assert!(Applicability::Employee.applies_to_employee());
        assert!(Applicability::Both.applies_to_employee());
        assert!(!Applicability::Employer.applies_to_employee());
        assert!(Applicability::Both.applies_to_employer());
    }

    #[test]
    fn test_effective_rules_filters_by_date() {
        let jurisdiction = TaxJurisdiction {
            code: "CA".to_string(),
            name: "California".to_string(),
            jurisdiction_type: JurisdictionType::State,
            parent_code: Some("US".to_string()),
            rules: vec![
                rule(date(2023, 1, 1), Some(date(2023, 12, 31))),
                rule(date(2024, 1, 1), None),
            ],
        };
        assert_eq!(jurisdiction.effective_rules(date(2024, 3, 1)).count(), 1);
        assert_eq!(jurisdiction.effective_rules(date(2022, 3, 1)).count(), 0);
    }

    #[test]
    fn test_deserialize_progressive_schedule() {
        let json = r#"{
            "type": "progressive",
            "brackets": [
                { "min_income": "0", "rate": "0.01" },
                { "min_income": "10000", "rate": "0.02" }
            ]
        }"#;
        let schedule: RateSchedule = serde_json::from_str(json).unwrap();
        match schedule {
            RateSchedule::Progressive { brackets } => {
                assert_eq!(brackets.len(), 2);
                assert_eq!(brackets[1].min_income, dec("10000"));
                assert_eq!(brackets[1].max_income, None);
            }
            _ => panic!("Expected progressive schedule"),
        }
    }
}
