use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::DcfError;
use crate::types::{round_money, with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

use super::inputs::{ResolvedInputs, ValuationInputs};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One year of the explicit forecast. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub year: u32,
    pub revenue: Money,
    pub ebit: Money,
    pub nopat: Money,
    pub fcff: Money,
}

/// Output of a single DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Year-by-year projections, rounded to 2 dp
    pub projections: Vec<ProjectionRow>,
    /// Sum of present values of explicit-period FCFFs
    pub pv_of_fcff: Money,
    /// Undiscounted Gordon growth terminal value
    pub terminal_value: Money,
    /// Present value of terminal value
    pub pv_of_terminal: Money,
    /// Enterprise value = PV(FCFFs) + PV(TV)
    pub enterprise_value: Money,
    /// EV - net_debt; absent when net debt was not supplied
    pub equity_value: Option<Money>,
    /// Equity value / shares outstanding
    pub value_per_share: Option<Money>,
}

/// Reduced view of a valuation used for scenario comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSummary {
    pub enterprise_value: Money,
    pub equity_value: Option<Money>,
    pub value_per_share: Option<Money>,
}

impl From<&ValuationResult> for ValuationSummary {
    fn from(result: &ValuationResult) -> Self {
        ValuationSummary {
            enterprise_value: result.enterprise_value,
            equity_value: result.equity_value,
            value_per_share: result.value_per_share,
        }
    }
}

impl ValuationResult {
    pub fn summary(&self) -> ValuationSummary {
        ValuationSummary::from(self)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run an FCFF DCF valuation with a Gordon growth terminal value.
pub fn calculate(inputs: &ValuationInputs) -> DcfResult<ValuationResult> {
    let resolved = inputs.resolve()?;
    calculate_resolved(&resolved)
}

/// Same as [`calculate`], wrapped in the standard metadata envelope with
/// advisory warnings.
pub fn calculate_with_metadata(
    inputs: &ValuationInputs,
) -> DcfResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let resolved = inputs.resolve()?;
    let result = calculate_resolved(&resolved)?;

    let mut warnings: Vec<String> = Vec::new();
    if inputs.revenue.is_some() && inputs.base_revenue.is_some() {
        warnings.push("Both revenue and base_revenue supplied; using revenue".into());
    }
    collect_warnings(&result, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "FCFF DCF (Gordon growth terminal value)",
        &resolved,
        warnings,
        elapsed,
        result,
    ))
}

/// Core calculation over already-validated inputs.
pub fn calculate_resolved(input: &ResolvedInputs) -> DcfResult<ValuationResult> {
    debug!(
        years = input.years,
        wacc = %input.wacc,
        terminal_growth = %input.terminal_growth,
        "running DCF valuation"
    );

    let (projections, fcffs) = build_projections(input)?;

    // --- Discount explicit period ---
    let one_plus_wacc = Decimal::ONE + input.wacc;
    let mut pv_of_fcff = Decimal::ZERO;
    for (idx, fcff) in fcffs.iter().enumerate() {
        let factor = compound(one_plus_wacc, idx as u32 + 1)?;
        let pv = checked(fcff.checked_div(factor), "present value of FCFF")?;
        pv_of_fcff = checked(pv_of_fcff.checked_add(pv), "present value of FCFF")?;
    }

    // --- Terminal value ---
    let last_fcff = *fcffs.last().ok_or_else(|| DcfError::InvalidInput {
        field: "years".into(),
        reason: "No projection years generated".into(),
    })?;
    let terminal_value = gordon_terminal_value(last_fcff, input.wacc, input.terminal_growth)?;
    let pv_of_terminal = checked(
        terminal_value.checked_div(compound(one_plus_wacc, input.years)?),
        "present value of terminal value",
    )?;

    let enterprise_value = checked(pv_of_fcff.checked_add(pv_of_terminal), "enterprise value")?;

    // --- Equity bridge ---
    let equity_value = input
        .net_debt
        .map(|nd| checked(enterprise_value.checked_sub(nd), "equity value"))
        .transpose()?;
    let value_per_share = match (equity_value, input.shares_outstanding) {
        (Some(equity), Some(shares)) => {
            if shares.is_zero() {
                return Err(DcfError::DivideByZero {
                    context: "value per share (shares_outstanding is zero)".into(),
                });
            }
            Some(checked(equity.checked_div(shares), "value per share")?)
        }
        _ => None,
    };

    debug!(enterprise_value = %enterprise_value, "DCF valuation complete");

    Ok(ValuationResult {
        projections,
        pv_of_fcff: round_money(pv_of_fcff),
        terminal_value: round_money(terminal_value),
        pv_of_terminal: round_money(pv_of_terminal),
        enterprise_value: round_money(enterprise_value),
        equity_value: equity_value.map(round_money),
        value_per_share: value_per_share.map(round_money),
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Returns the rounded projection table and the full-precision FCFF per year.
fn build_projections(input: &ResolvedInputs) -> DcfResult<(Vec<ProjectionRow>, Vec<Money>)> {
    let mut projections = Vec::with_capacity(input.revenue_growth.len());
    let mut fcffs = Vec::with_capacity(input.revenue_growth.len());
    let mut revenue = input.revenue;
    let after_tax = Decimal::ONE - input.tax_rate;

    for (idx, growth) in input.revenue_growth.iter().enumerate() {
        let year = idx as u32 + 1;
        let at = |value: Option<Decimal>, line: &str| {
            value.ok_or_else(|| overflow(format!("{line} in year {year}")))
        };

        revenue = at(revenue.checked_mul(Decimal::ONE + growth), "revenue")?;
        let ebit = at(revenue.checked_mul(input.ebit_margin), "EBIT")?;
        let nopat = at(ebit.checked_mul(after_tax), "NOPAT")?;
        let capex = at(revenue.checked_mul(input.capex_pct), "capex")?;
        let delta_nwc = at(revenue.checked_mul(input.nwc_pct), "NWC investment")?;

        // FCFF = NOPAT - CapEx - Delta NWC
        let fcff = at(
            nopat.checked_sub(capex).and_then(|v| v.checked_sub(delta_nwc)),
            "FCFF",
        )?;

        projections.push(ProjectionRow {
            year,
            revenue: round_money(revenue),
            ebit: round_money(ebit),
            nopat: round_money(nopat),
            fcff: round_money(fcff),
        });
        fcffs.push(fcff);
    }

    Ok((projections, fcffs))
}

/// Map a failed checked operation to a typed error naming the quantity.
fn checked(value: Option<Decimal>, quantity: &str) -> DcfResult<Decimal> {
    value.ok_or_else(|| overflow(quantity.to_string()))
}

fn overflow(quantity: String) -> DcfError {
    DcfError::InvalidInput {
        field: "inputs".into(),
        reason: format!("{quantity} is outside the representable decimal range"),
    }
}

/// (1 + r)^n, failing instead of overflowing on extreme horizons.
fn compound(one_plus_rate: Decimal, periods: u32) -> DcfResult<Decimal> {
    let factor = one_plus_rate
        .checked_powi(periods as i64)
        .ok_or_else(|| DcfError::InvalidInput {
            field: "years".into(),
            reason: format!("Discount factor overflows at period {periods}"),
        })?;
    if factor.is_zero() {
        return Err(DcfError::DivideByZero {
            context: format!("discount factor at period {periods}"),
        });
    }
    Ok(factor)
}

/// Gordon growth: TV = FCFF_N * (1 + g) / (WACC - g)
fn gordon_terminal_value(last_fcff: Money, wacc: Rate, growth: Rate) -> DcfResult<Money> {
    let spread = wacc - growth;
    if spread <= Decimal::ZERO {
        return Err(DcfError::InvalidRateSpread {
            wacc,
            terminal_growth: growth,
        });
    }
    let grown = checked(
        last_fcff.checked_mul(Decimal::ONE + growth),
        "terminal-year FCFF",
    )?;
    checked(grown.checked_div(spread), "terminal value")
}

fn collect_warnings(result: &ValuationResult, warnings: &mut Vec<String>) {
    if result.enterprise_value > Decimal::ZERO {
        let tv_pct = result
            .pv_of_terminal
            .checked_div(result.enterprise_value)
            .unwrap_or(Decimal::MAX);
        if tv_pct > dec!(0.75) {
            warnings.push(format!(
                "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
                tv_pct.saturating_mul(dec!(100))
            ));
        }
    } else {
        warnings.push(format!(
            "Enterprise value is not positive ({})",
            result.enterprise_value
        ));
    }

    if let Some(last) = result.projections.last() {
        if last.fcff < Decimal::ZERO {
            warnings.push(format!(
                "Terminal-year FCFF is negative ({}); terminal value is negative",
                last.fcff
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
