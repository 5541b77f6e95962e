//! Calculation logic for the payroll engine.
//!
//! Every function here is pure: configuration and year-to-date figures come
//! in as arguments, and each stage returns its result together with the
//! audit steps that explain it. The stages are pay type classification,
//! earnings with blended-rate overtime, ordered deductions, taxable wage
//! bases, single- and multi-jurisdiction withholding, employer taxes, net
//! pay with deposit allocation, and corrections to finished results.

mod classifier;
mod corrections;
mod deductions;
mod earnings;
mod employer_taxes;
mod multi_region;
mod net_pay;
mod rounding;
mod tax;
mod wage_base;

pub use classifier::{
    FlagValidation, InclusionKind, flags_include, should_include_in_calculation,
    validate_pay_type_flags,
};
pub use corrections::{
    CorrectionContext, OffCycleCorrection, RetroactiveAdjustment, process_off_cycle_correction,
    process_retroactive_adjustment,
};
pub use deductions::{
    ArrearsRecovery, DeductionLimits, DeductionsResult, LimitedAmount, apply_annual_limit,
    apply_catch_up, calculate_deductions, recover_arrears, sort_deductions,
};
pub use earnings::{EarningsResult, calculate_earnings};
pub use employer_taxes::{EmployerTaxResult, calculate_employer_taxes};
pub use multi_region::{
    JurisdictionRegistry, MultiRegionSettings, NoReciprocity, ReciprocityResolver,
    calculate_multi_jurisdiction_tax, detect_tax_jurisdictions, evaluate_rule,
};
pub use net_pay::{
    AllocatedDeposit, DepositAllocation, DepositInstruction, DepositKind, NetPayResult,
    allocate_deposits, calculate_net_pay, validate_calculation,
};
pub use rounding::{CURRENCY_SCALE, INTERNAL_SCALE, round_currency, round_internal};
pub use tax::{FEDERAL_JURISDICTION, TaxComputation, TaxContext, calculate_taxes, progressive_tax};
pub use wage_base::{
    advance_ytd, capped_wages, derive_taxable_wages, sum_included, threshold_excess,
};
