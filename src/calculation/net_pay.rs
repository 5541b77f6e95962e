//! Net pay, deposit allocation and result validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, AuditWarning, CalculationResult};

use super::rounding::round_currency;

/// The net pay computation for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPayResult {
    /// Gross pay less pre-tax deductions.
    pub taxable_wages: Decimal,
    /// Net pay, clamped at zero.
    pub net_pay: Decimal,
    /// Net pay before clamping.
    pub unclamped_net_pay: Decimal,
    /// True when the unclamped value was negative.
    pub clamped: bool,
    /// Audit step recording the computation.
    pub audit_step: AuditStep,
}

/// Calculates net pay from already-rounded components.
///
/// `taxable_wages = gross − pre_tax` and
/// `net = taxable_wages − taxes − post_tax`, clamped at zero. A clamp is
/// recorded in the result rather than corrected silently.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::calculate_net_pay;
/// use rust_decimal::Decimal;
///
/// let result = calculate_net_pay(
///     Decimal::from(1000),
///     Decimal::from(100),
///     Decimal::from(200),
///     Decimal::from(50),
///     1,
/// );
/// assert_eq!(result.taxable_wages, Decimal::from(900));
/// assert_eq!(result.net_pay, Decimal::from(650));
/// assert!(!result.clamped);
/// ```
pub fn calculate_net_pay(
    gross_pay: Decimal,
    pre_tax_deductions: Decimal,
    taxes_total: Decimal,
    post_tax_deductions: Decimal,
    step_number: u32,
) -> NetPayResult {
    let taxable_wages = gross_pay - pre_tax_deductions;
    let unclamped_net_pay = taxable_wages - taxes_total - post_tax_deductions;
    let clamped = unclamped_net_pay < Decimal::ZERO;
    let net_pay = unclamped_net_pay.max(Decimal::ZERO);

    let reasoning = if clamped {
        format!(
            "${} − ${} pre-tax − ${} taxes − ${} post-tax = ${}, clamped to $0",
            gross_pay.normalize(),
            pre_tax_deductions.normalize(),
            taxes_total.normalize(),
            post_tax_deductions.normalize(),
            unclamped_net_pay.normalize()
        )
    } else {
        format!(
            "${} − ${} pre-tax − ${} taxes − ${} post-tax = ${}",
            gross_pay.normalize(),
            pre_tax_deductions.normalize(),
            taxes_total.normalize(),
            post_tax_deductions.normalize(),
            net_pay.normalize()
        )
    };

    NetPayResult {
        taxable_wages,
        net_pay,
        unclamped_net_pay,
        clamped,
        audit_step: AuditStep {
            step_number,
            rule_id: "net_pay".to_string(),
            rule_name: "Net Pay".to_string(),
            reference: "gross − pre-tax − taxes − post-tax".to_string(),
            input: json!({
                "gross_pay": gross_pay.normalize().to_string(),
                "pre_tax_deductions": pre_tax_deductions.normalize().to_string(),
                "taxes": taxes_total.normalize().to_string(),
                "post_tax_deductions": post_tax_deductions.normalize().to_string(),
            }),
            output: json!({
                "taxable_wages": taxable_wages.normalize().to_string(),
                "net_pay": net_pay.normalize().to_string(),
                "clamped": clamped,
            }),
            reasoning,
        },
    }
}

// ============================================================================
// Deposits
// ============================================================================

/// How much of net pay an account receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DepositKind {
    /// A fixed amount.
    Fixed {
        /// The amount.
        amount: Decimal,
    },
    /// A fraction of net pay (0.5 = 50%).
    Percentage {
        /// The fraction.
        rate: Decimal,
    },
    /// Whatever is left after every other allocation.
    Remainder,
}

/// One direct deposit instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositInstruction {
    /// Destination account.
    pub account_id: String,
    /// How the amount is determined.
    pub allocation: DepositKind,
}

impl DepositInstruction {
    /// A fixed-amount instruction.
    pub fn fixed(account_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            allocation: DepositKind::Fixed { amount },
        }
    }

    /// A percentage-of-net instruction.
    pub fn percentage(account_id: impl Into<String>, rate: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            allocation: DepositKind::Percentage { rate },
        }
    }

    /// The remainder instruction.
    pub fn remainder(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            allocation: DepositKind::Remainder,
        }
    }
}

/// The amount deposited to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedDeposit {
    /// Destination account.
    pub account_id: String,
    /// Amount deposited.
    pub amount: Decimal,
}

/// The outcome of splitting net pay across accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAllocation {
    /// One entry per instruction, in input order.
    pub allocations: Vec<AllocatedDeposit>,
    /// Net pay no instruction received.
    pub unallocated: Decimal,
    /// Raised when money was left unallocated.
    pub warnings: Vec<AuditWarning>,
}

/// Splits net pay across deposit accounts.
///
/// Fixed amounts are allocated first, then percentages of net pay, then the
/// single remainder account takes what is left. Each allocation is capped to
/// the balance still unallocated at its turn, so the sum never exceeds net
/// pay.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{DepositInstruction, allocate_deposits};
/// use rust_decimal::Decimal;
///
/// let allocation = allocate_deposits(
///     Decimal::from(1000),
///     &[
///         DepositInstruction::fixed("savings", Decimal::from(200)),
///         DepositInstruction::percentage("brokerage", Decimal::new(5, 1)),
///         DepositInstruction::remainder("checking"),
///     ],
/// )
/// .unwrap();
///
/// let amounts: Vec<Decimal> = allocation.allocations.iter().map(|a| a.amount).collect();
/// assert_eq!(amounts, vec![Decimal::from(200), Decimal::from(500), Decimal::from(300)]);
/// ```
pub fn allocate_deposits(
    net_pay: Decimal,
    instructions: &[DepositInstruction],
) -> EngineResult<DepositAllocation> {
    let remainder_count = instructions
        .iter()
        .filter(|instruction| instruction.allocation == DepositKind::Remainder)
        .count();
    if remainder_count > 1 {
        return Err(EngineError::InvalidInput {
            field: "deposits".to_string(),
            message: format!(
                "exactly one remainder account is allowed, found {}",
                remainder_count
            ),
        });
    }
    for (index, instruction) in instructions.iter().enumerate() {
        let negative = match &instruction.allocation {
            DepositKind::Fixed { amount } => *amount < Decimal::ZERO,
            DepositKind::Percentage { rate } => *rate < Decimal::ZERO,
            DepositKind::Remainder => false,
        };
        if negative {
            return Err(EngineError::InvalidInput {
                field: format!("deposits[{}]", index),
                message: "allocation cannot be negative".to_string(),
            });
        }
    }

    let mut amounts = vec![Decimal::ZERO; instructions.len()];
    let mut remaining = net_pay.max(Decimal::ZERO);

    for (index, instruction) in instructions.iter().enumerate() {
        if let DepositKind::Fixed { amount } = &instruction.allocation {
            let allocated = (*amount).min(remaining);
            amounts[index] = allocated;
            remaining -= allocated;
        }
    }
    for (index, instruction) in instructions.iter().enumerate() {
        if let DepositKind::Percentage { rate } = &instruction.allocation {
            let allocated = round_currency(net_pay * rate).min(remaining);
            amounts[index] = allocated;
            remaining -= allocated;
        }
    }
    if let Some(index) = instructions
        .iter()
        .position(|instruction| instruction.allocation == DepositKind::Remainder)
    {
        amounts[index] = remaining;
        remaining = Decimal::ZERO;
    }

    let mut warnings = Vec::new();
    if remaining > Decimal::ZERO {
        warnings.push(AuditWarning::validation(
            "UNALLOCATED_NET_PAY",
            format!(
                "${} of net pay has no deposit account; add a remainder account",
                remaining.normalize()
            ),
        ));
    }

    Ok(DepositAllocation {
        allocations: instructions
            .iter()
            .zip(amounts)
            .map(|(instruction, amount)| AllocatedDeposit {
                account_id: instruction.account_id.clone(),
                amount,
            })
            .collect(),
        unallocated: remaining,
        warnings,
    })
}

// ============================================================================
// Validation
// ============================================================================

/// Recomputes net pay from a result's components and reports integrity
/// failures: a mismatch beyond `tolerance`, a negative unclamped net pay, or
/// deductions exceeding gross pay.
///
/// Failures are reported, never corrected; any of them makes the result
/// non-finalizable.
pub fn validate_calculation(result: &CalculationResult, tolerance: Decimal) -> Vec<AuditWarning> {
    let mut issues = Vec::new();

    let expected = result.gross_pay
        - result.pre_tax_deductions
        - result.taxes_withheld.total()
        - result.post_tax_deductions;
    let expected_net = expected.max(Decimal::ZERO);
    if (expected_net - result.net_pay).abs() > tolerance {
        issues.push(AuditWarning::integrity(
            "NET_PAY_MISMATCH",
            format!(
                "Net pay ${} differs from recomputed ${} by more than ${}",
                result.net_pay.normalize(),
                expected_net.normalize(),
                tolerance.normalize()
            ),
        ));
    }

    if result.unclamped_net_pay < Decimal::ZERO || expected < Decimal::ZERO {
        issues.push(AuditWarning::integrity(
            "NEGATIVE_NET_PAY",
            format!(
                "Taxes and deductions exceed wages by ${}; net pay was clamped to $0",
                (-expected.min(result.unclamped_net_pay)).normalize()
            ),
        ));
    }

    let deductions = result.pre_tax_deductions + result.post_tax_deductions;
    if deductions > result.gross_pay {
        issues.push(AuditWarning::integrity(
            "DEDUCTIONS_EXCEED_GROSS",
            format!(
                "Deductions ${} exceed gross pay ${}",
                deductions.normalize(),
                result.gross_pay.normalize()
            ),
        ));
    }

    issues
}
