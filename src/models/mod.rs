//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine:
//! configuration records (pay types, jurisdictions), calculation input, and
//! the immutable calculation result with its audit trace.

mod calculation_result;
mod deduction;
mod earning;
mod input;
mod jurisdiction;
mod pay_type;
mod tax_profile;

pub use calculation_result::{
    AdjustmentKind, AdjustmentRecord, AuditStep, AuditTrace, AuditWarning, CALCULATION_NAMESPACE,
    CalculationDetails, CalculationResult, DeductionLineDetail, EarningsLineDetail, EmployerTaxes,
    IssueKind, OvertimeSummary, ResultMetadata, Severity, TaxCalculation, TaxParty, TaxType,
    TaxableWages, TaxesWithheld,
};
pub use deduction::{CatchUpContribution, DeductionAmount, DeductionDefinition, DeductionType};
pub use earning::EarningLine;
pub use input::{PayFrequency, PayrollInput, TaxMode, YtdSnapshot};
pub use jurisdiction::{
    Applicability, JurisdictionType, RateSchedule, TaxBracket, TaxJurisdiction, TaxKind, TaxRule,
};
pub use pay_type::{
    OVERTIME_PREMIUM_CODE, PayCategory, PayTypeDefinition, PayTypeFlags, TipStatus,
};
pub use tax_profile::{EmployeeTaxProfile, FilingStatus};
