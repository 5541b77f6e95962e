//! End-to-end tests for the payroll engine against the bundled US
//! configuration.
//!
//! This test suite covers:
//! - Regular pay with federal, state, FICA and SDI withholding
//! - Social Security wage base caps across tax years
//! - Blended-rate overtime
//! - Deduction sequencing and annual limits
//! - Split direct deposits
//! - Multi-jurisdiction withholding
//! - Corrections and determinism

use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::str::FromStr;

use payroll_engine::PayrollEngine;
use payroll_engine::calculation::{DepositInstruction, OffCycleCorrection, allocate_deposits};
use payroll_engine::config::ConfigLoader;
use payroll_engine::error::EngineError;
use payroll_engine::models::{
    AdjustmentKind, CalculationResult, IssueKind, PayrollInput, TaxParty, TaxType,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn create_engine() -> PayrollEngine {
    let config = ConfigLoader::load("./config/us_payroll").expect("Failed to load config");
    PayrollEngine::new(config.into_config())
}

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn create_request(earnings: Value, deductions: Value, ytd: Value) -> Value {
    json!({
        "employee_id": "emp_001",
        "pay_period_start": "2024-03-04",
        "pay_period_end": "2024-03-10",
        "earnings": earnings,
        "deductions": deductions,
        "tax_profile": {
            "filing_status": "single",
            "primary_work_jurisdiction": "CA"
        },
        "ytd": ytd
    })
}

fn calculate(engine: &PayrollEngine, request: Value) -> CalculationResult {
    let input: PayrollInput = serde_json::from_value(request).expect("Invalid request");
    engine.calculate(&input).expect("Calculation failed")
}

fn assert_finalizable(result: &CalculationResult) {
    assert!(
        result.is_finalizable(),
        "Unexpected integrity issues: {:?}",
        result
            .issues_of_kind(IssueKind::CalculationIntegrity)
            .collect::<Vec<_>>()
    );
}

fn tax_amount(result: &CalculationResult, tax_type: TaxType, party: TaxParty) -> Decimal {
    result
        .calculation_details
        .tax_calculations
        .iter()
        .filter(|c| c.tax_type == tax_type && c.party == party)
        .map(|c| c.amount)
        .sum()
}

// =============================================================================
// SECTION 1: Regular Pay
// =============================================================================

#[test]
fn test_weekly_regular_pay_california() {
    // 40h × $25 = $1000, single, CA
    // Federal: $52,000 annualized → $5,288 / 52 = $101.69
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([]),
            json!({}),
        ),
    );

    assert_eq!(result.gross_pay, decimal("1000.00"));
    assert_eq!(result.taxes_withheld.federal, decimal("101.69"));
    assert_eq!(result.taxes_withheld.state, decimal("60.00"));
    assert_eq!(result.taxes_withheld.fica, decimal("62.00"));
    assert_eq!(result.taxes_withheld.medicare, decimal("14.50"));
    assert_eq!(result.taxes_withheld.sdi, Some(decimal("11.00")));
    assert_eq!(result.net_pay, decimal("750.81"));
    assert_eq!(result.employer_taxes.total(), decimal("116.50"));
    assert_finalizable(&result);
}

#[test]
fn test_bonus_withheld_at_supplemental_rate() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([
                { "type": "REG", "hours": "40", "rate": "25" },
                { "type": "BONUS", "flat_amount": "500" }
            ]),
            json!([]),
            json!({}),
        ),
    );

    assert_eq!(result.gross_pay, decimal("1500.00"));
    assert_eq!(result.taxable_wages.federal_supplemental, decimal("500.00"));
    // $101.69 on regular wages + 22% of $500
    assert_eq!(result.taxes_withheld.federal, decimal("211.69"));
    assert_eq!(
        tax_amount(&result, TaxType::FederalSupplemental, TaxParty::Employee),
        decimal("110")
    );
    assert_finalizable(&result);
}

#[test]
fn test_contractor_payment_not_taxed() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "1099", "flat_amount": "2000" }]),
            json!([]),
            json!({}),
        ),
    );

    assert_eq!(result.gross_pay, decimal("2000.00"));
    assert_eq!(result.taxes_withheld.total(), Decimal::ZERO);
    assert_eq!(result.employer_taxes.total(), Decimal::ZERO);
    assert_eq!(result.net_pay, decimal("2000.00"));
}

// =============================================================================
// SECTION 2: Wage Base Caps
// =============================================================================

#[test]
fn test_social_security_stops_at_2023_wage_base() {
    let engine = create_engine();
    let mut request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({ "social_security_wages": "160200", "medicare_wages": "160200" }),
    );
    request["pay_period_start"] = json!("2023-12-18");
    request["pay_period_end"] = json!("2023-12-24");
    let result = calculate(&engine, request);

    assert_eq!(result.taxes_withheld.fica, Decimal::ZERO);
    assert_eq!(result.employer_taxes.fica, Decimal::ZERO);
    assert_eq!(result.taxes_withheld.medicare, decimal("14.50"));
    assert_finalizable(&result);
}

#[test]
fn test_social_security_partially_capped() {
    // $500 of room left under the 2024 wage base
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([]),
            json!({ "social_security_wages": "168100" }),
        ),
    );

    assert_eq!(result.taxes_withheld.fica, decimal("31.00"));
    assert_eq!(result.employer_taxes.fica, decimal("31.00"));
}

#[test]
fn test_futa_and_suta_stop_at_wage_base() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([]),
            json!({ "futa_wages": "7000", "suta_wages": "6800" }),
        ),
    );

    assert_eq!(result.employer_taxes.futa, Decimal::ZERO);
    // $200 left under CA's $7000 SUTA base at 3.4%
    assert_eq!(result.employer_taxes.suta, decimal("6.80"));
}

// =============================================================================
// SECTION 3: Overtime
// =============================================================================

#[test]
fn test_overtime_uses_blended_regular_rate() {
    // 30h × $20 + 20h × $25 = $1100 over 50h → regular rate $22
    // 10 overtime hours × $22 × 0.5 = $110 premium
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([
                { "type": "REG", "hours": "30", "rate": "20" },
                { "type": "REG", "hours": "20", "rate": "25" }
            ]),
            json!([]),
            json!({}),
        ),
    );

    let overtime = &result.calculation_details.overtime;
    assert_eq!(overtime.counted_hours, decimal("50"));
    assert_eq!(overtime.overtime_hours, decimal("10"));
    assert_eq!(overtime.regular_rate, decimal("22"));
    assert_eq!(overtime.overtime_premium, decimal("110"));
    assert_eq!(result.gross_pay, decimal("1210.00"));
}

#[test]
fn test_no_overtime_at_threshold() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "20" }]),
            json!([]),
            json!({}),
        ),
    );

    assert_eq!(result.calculation_details.overtime.overtime_hours, Decimal::ZERO);
    assert_eq!(result.gross_pay, decimal("800.00"));
}

// =============================================================================
// SECTION 4: Deductions
// =============================================================================

#[test]
fn test_deductions_processed_in_priority_order() {
    // HSA is listed first but 401(k) has priority: 10% of $1000, then 10% of $900
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([
                {
                    "code": "HSA",
                    "type": "hsa",
                    "amount": { "method": "percentage", "rate": "0.10" },
                    "is_pre_tax": true
                },
                {
                    "code": "401K",
                    "type": "retirement401k",
                    "amount": { "method": "percentage", "rate": "0.10" },
                    "is_pre_tax": true
                }
            ]),
            json!({}),
        ),
    );

    let lines: Vec<(&str, Decimal)> = result
        .calculation_details
        .deductions_breakdown
        .iter()
        .map(|line| (line.code.as_str(), line.amount))
        .collect();
    assert_eq!(lines, vec![("401K", decimal("100")), ("HSA", decimal("90"))]);
    assert_eq!(result.pre_tax_deductions, decimal("190.00"));
    assert_eq!(result.taxable_wages.federal, decimal("810.00"));
    assert_finalizable(&result);
}

#[test]
fn test_annual_limits_clamp_contributions() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([
                {
                    "code": "401K",
                    "type": "retirement401k",
                    "amount": { "method": "flat", "amount": "100" },
                    "is_pre_tax": true,
                    "current_ytd": "22980"
                },
                {
                    "code": "403B",
                    "type": "retirement403b",
                    "amount": { "method": "flat", "amount": "100" },
                    "is_pre_tax": true,
                    "current_ytd": "23000"
                }
            ]),
            json!({}),
        ),
    );

    let breakdown = &result.calculation_details.deductions_breakdown;
    assert_eq!(breakdown[0].amount, decimal("20"));
    assert!(breakdown[0].limited);
    assert_eq!(breakdown[1].amount, Decimal::ZERO);
    assert_eq!(breakdown[1].remaining_annual_limit, Some(Decimal::ZERO));
    assert_eq!(result.pre_tax_deductions, decimal("20.00"));
}

#[test]
fn test_post_tax_deductions_do_not_reduce_bases() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([{
                "code": "ROTH",
                "type": "roth401k",
                "amount": { "method": "flat", "amount": "50" },
                "is_pre_tax": false
            }]),
            json!({}),
        ),
    );

    assert_eq!(result.taxable_wages.federal, decimal("1000.00"));
    assert_eq!(result.post_tax_deductions, decimal("50.00"));
    assert_eq!(result.net_pay, decimal("700.81"));
}

#[test]
fn test_negative_deduction_amount_rejected() {
    let engine = create_engine();
    let input: PayrollInput = serde_json::from_value(create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([{
            "code": "HSA",
            "type": "hsa",
            "amount": { "method": "flat", "amount": "-50" },
            "is_pre_tax": true
        }]),
        json!({}),
    ))
    .unwrap();

    match engine.calculate(&input) {
        Err(EngineError::InvalidInput { field, .. }) => assert_eq!(field, "deductions[0].amount"),
        other => panic!("Expected InvalidInput, got {:?}", other),
    }
}

// =============================================================================
// SECTION 5: Deposits
// =============================================================================

#[test]
fn test_split_deposit_of_calculated_net_pay() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
            json!([]),
            json!({}),
        ),
    );

    let allocation = allocate_deposits(
        result.net_pay,
        &[
            DepositInstruction::remainder("checking"),
            DepositInstruction::fixed("savings", decimal("200")),
            DepositInstruction::percentage("brokerage", decimal("0.25")),
        ],
    )
    .unwrap();

    let amounts: Vec<Decimal> = allocation.allocations.iter().map(|a| a.amount).collect();
    assert_eq!(
        amounts,
        vec![decimal("363.11"), decimal("200"), decimal("187.70")]
    );
    assert_eq!(allocation.unallocated, Decimal::ZERO);
    assert!(allocation.warnings.is_empty());
}

// =============================================================================
// SECTION 6: Multi-Jurisdiction
// =============================================================================

#[test]
fn test_multi_jurisdiction_work_in_california_live_in_nevada() {
    let engine = create_engine();
    let mut request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    );
    request["tax_mode"] = json!("multi_jurisdiction");
    request["tax_profile"]["residency_jurisdiction"] = json!("NV");
    let result = calculate(&engine, request);

    assert_eq!(
        result.calculation_details.tax_mode,
        payroll_engine::models::TaxMode::MultiJurisdiction
    );
    let jurisdictions: Vec<&str> = result
        .calculation_details
        .tax_calculations
        .iter()
        .filter(|c| c.party == TaxParty::Employee)
        .map(|c| c.jurisdiction.as_str())
        .collect();
    assert!(jurisdictions.contains(&"US"));
    assert!(jurisdictions.contains(&"CA"));
    assert!(!jurisdictions.contains(&"NV"));
    assert_eq!(result.taxes_withheld.fica, decimal("62.00"));
    assert_eq!(result.taxes_withheld.medicare, decimal("14.50"));
    assert_eq!(result.taxes_withheld.sdi, Some(decimal("11.00")));
    assert_finalizable(&result);
}

#[test]
fn test_multi_jurisdiction_local_tax_for_new_york_city() {
    let engine = create_engine();
    let mut request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    );
    request["tax_mode"] = json!("multi_jurisdiction");
    request["tax_profile"]["primary_work_jurisdiction"] = json!("NYC");
    let result = calculate(&engine, request);

    assert!(result.taxes_withheld.local.is_some());
    assert!(
        result
            .calculation_details
            .tax_calculations
            .iter()
            .any(|c| c.tax_type == TaxType::LocalIncome && c.jurisdiction == "NYC")
    );
    assert_finalizable(&result);
}

#[test]
fn test_multi_jurisdiction_work_in_california_live_in_new_york() {
    let engine = create_engine();
    let mut request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    );
    request["tax_mode"] = json!("multi_jurisdiction");
    request["tax_profile"]["residency_jurisdiction"] = json!("NY");
    let result = calculate(&engine, request);

    let employee: Vec<_> = result
        .calculation_details
        .tax_calculations
        .iter()
        .filter(|c| c.party == TaxParty::Employee)
        .collect();
    let state_codes: Vec<&str> = employee
        .iter()
        .filter(|c| c.tax_type == TaxType::StateIncome)
        .map(|c| c.jurisdiction.as_str())
        .collect();
    assert!(state_codes.contains(&"CA"));
    assert!(state_codes.contains(&"NY"));
    let social_security = employee
        .iter()
        .filter(|c| c.tax_type == TaxType::SocialSecurity && c.jurisdiction == "US")
        .count();
    assert_eq!(social_security, 1);

    // Without a reciprocity agreement both states withhold: CA 1% and NY 4%.
    assert_eq!(result.taxes_withheld.state, decimal("50.00"));
    assert_eq!(result.taxes_withheld.sdi, Some(decimal("11.60")));
    assert_eq!(result.taxes_withheld.fica, decimal("62.00"));
    assert_eq!(result.taxes_withheld.medicare, decimal("14.50"));
    assert_eq!(result.net_pay, decimal("861.90"));
    assert_finalizable(&result);
}

#[test]
fn test_multi_jurisdiction_federal_uses_2023_brackets() {
    let engine = create_engine();
    let mut request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({ "federal_taxable_wages": "5250" }),
    );
    request["tax_mode"] = json!("multi_jurisdiction");
    request["pay_period_start"] = json!("2023-03-06");
    request["pay_period_end"] = json!("2023-03-12");
    let result_2023 = calculate(&engine, request.clone());

    request["pay_period_start"] = json!("2024-03-04");
    request["pay_period_end"] = json!("2024-03-10");
    let result_2024 = calculate(&engine, request);

    // Single: 10% starts at $5,250 in 2023 and at $6,000 in 2024.
    assert_eq!(result_2023.taxes_withheld.federal, decimal("100.00"));
    assert_eq!(result_2024.taxes_withheld.federal, decimal("25.00"));
}

// =============================================================================
// SECTION 7: Corrections and Determinism
// =============================================================================

#[test]
fn test_off_cycle_bonus_creates_linked_result() {
    let engine = create_engine();
    let request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    );
    let input: PayrollInput = serde_json::from_value(request).unwrap();
    let original = engine.calculate(&input).unwrap();
    let snapshot = original.clone();

    let correction = OffCycleCorrection {
        pay_type: "BONUS".to_string(),
        amount: decimal("1000"),
        reason: "Spot award".to_string(),
    };
    let corrected = engine
        .process_off_cycle_correction(&original, &input, &correction)
        .unwrap();

    assert_eq!(original, snapshot);
    assert_ne!(corrected.calculation_id, original.calculation_id);
    assert_eq!(
        corrected.metadata.original_calculation_id,
        Some(original.calculation_id)
    );
    let adjustment = corrected.metadata.adjustment.as_ref().unwrap();
    assert_eq!(adjustment.kind, AdjustmentKind::OffCycleCorrection);
    assert_eq!(adjustment.gross_delta, decimal("1000"));
    assert_eq!(adjustment.taxes_delta.federal, decimal("220"));
    assert_eq!(corrected.gross_pay, decimal("2000.00"));
    assert_finalizable(&corrected);
}

#[test]
fn test_off_cycle_reimbursement_adds_to_gross_untaxed() {
    let engine = create_engine();
    let input: PayrollInput = serde_json::from_value(create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    ))
    .unwrap();
    let original = engine.calculate(&input).unwrap();

    let correction = OffCycleCorrection {
        pay_type: "REIMB".to_string(),
        amount: decimal("75"),
        reason: "Mileage".to_string(),
    };
    let corrected = engine
        .process_off_cycle_correction(&original, &input, &correction)
        .unwrap();

    let adjustment = corrected.metadata.adjustment.as_ref().unwrap();
    assert_eq!(adjustment.gross_delta, decimal("75"));
    assert_eq!(adjustment.taxes_delta.total(), Decimal::ZERO);
    assert_eq!(corrected.gross_pay, decimal("1075.00"));
    assert_eq!(corrected.net_pay, decimal("825.81"));
    let breakdown_total: Decimal = corrected
        .calculation_details
        .earnings_breakdown
        .iter()
        .map(|line| line.amount)
        .sum();
    assert_eq!(breakdown_total, corrected.gross_pay);
    assert_finalizable(&corrected);
}

#[test]
fn test_correction_with_unknown_pay_type_rejected() {
    let engine = create_engine();
    let input: PayrollInput = serde_json::from_value(create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    ))
    .unwrap();
    let original = engine.calculate(&input).unwrap();

    let correction = OffCycleCorrection {
        pay_type: "NOPE".to_string(),
        amount: decimal("10"),
        reason: "Typo".to_string(),
    };
    match engine.process_off_cycle_correction(&original, &input, &correction) {
        Err(EngineError::PayTypeNotFound { code }) => assert_eq!(code, "NOPE"),
        other => panic!("Expected PayTypeNotFound, got {:?}", other),
    }
}

#[test]
fn test_repeated_calculation_is_identical() {
    let engine = create_engine();
    let request = create_request(
        json!([
            { "type": "REG", "hours": "46", "rate": "21.75" },
            { "type": "TIPS", "flat_amount": "180.40" }
        ]),
        json!([{
            "code": "401K",
            "type": "retirement401k",
            "amount": { "method": "percentage", "rate": "0.06" },
            "is_pre_tax": true
        }]),
        json!({ "gross_wages": "12000", "social_security_wages": "12000" }),
    );

    let first = serde_json::to_value(calculate(&engine, request.clone())).unwrap();
    let second = serde_json::to_value(calculate(&engine, request)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_engine_shared_across_threads() {
    let engine = create_engine();
    let request = create_request(
        json!([{ "type": "REG", "hours": "40", "rate": "25" }]),
        json!([]),
        json!({}),
    );
    let expected = calculate(&engine, request.clone());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let request = request.clone();
            std::thread::spawn(move || calculate(&engine, request))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_unknown_pay_type_is_configuration_warning() {
    let engine = create_engine();
    let result = calculate(
        &engine,
        create_request(
            json!([
                { "type": "REG", "hours": "40", "rate": "25" },
                { "type": "MYSTERY", "flat_amount": "10" }
            ]),
            json!([]),
            json!({}),
        ),
    );

    assert!(
        result
            .issues_of_kind(IssueKind::Configuration)
            .any(|w| w.code == "UNKNOWN_PAY_TYPE")
    );
    assert_finalizable(&result);
}
