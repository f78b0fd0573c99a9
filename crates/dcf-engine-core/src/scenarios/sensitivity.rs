use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::DcfError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::valuation::dcf::{calculate_resolved, ValuationResult};
use crate::valuation::inputs::ValuationInputs;
use crate::DcfResult;

/// Upper bound on the number of values a single sweep axis may produce.
pub const MAX_SWEEP_POINTS: usize = 1000;

/// Inclusive sweep from `min` to `max` in `step` increments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRange {
    pub min: Rate,
    pub max: Rate,
    pub step: Rate,
}

/// Valuation figure reported in each grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMetric {
    #[default]
    EnterpriseValue,
    EquityValue,
    ValuePerShare,
}

impl SensitivityMetric {
    fn extract(self, result: &ValuationResult) -> Option<Money> {
        match self {
            SensitivityMetric::EnterpriseValue => Some(result.enterprise_value),
            SensitivityMetric::EquityValue => result.equity_value,
            SensitivityMetric::ValuePerShare => result.value_per_share,
        }
    }
}

/// Input for a 2-way WACC x terminal growth sensitivity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base_inputs: ValuationInputs,
    pub wacc: SweepRange,
    pub terminal_growth: SweepRange,
    #[serde(default)]
    pub metric: SensitivityMetric,
}

/// Output of 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub wacc_values: Vec<Rate>,
    pub terminal_growth_values: Vec<Rate>,
    pub metric: SensitivityMetric,
    /// matrix[i][j] = metric at wacc_values[i], terminal_growth_values[j];
    /// `None` where the pair is not a valid valuation
    pub matrix: Vec<Vec<Option<Money>>>,
    /// Grid cell nearest to the base inputs (row, col)
    pub base_case_position: (usize, usize),
    /// Metric at the base inputs themselves
    pub base_case_value: Option<Money>,
}

/// Generate the sweep values from min to max with step.
fn generate_sweep_values(field: &str, range: &SweepRange) -> DcfResult<Vec<Rate>> {
    if range.step <= Decimal::ZERO {
        return Err(DcfError::InvalidInput {
            field: format!("{field}.step"),
            reason: "Step must be positive".into(),
        });
    }
    if range.min > range.max {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: "Min must be <= max".into(),
        });
    }

    let too_many = || DcfError::InvalidInput {
        field: format!("{field}.step"),
        reason: format!(
            "Sweep from {} to {} by {} exceeds {MAX_SWEEP_POINTS} points",
            range.min, range.max, range.step
        ),
    };
    let steps = range
        .max
        .checked_sub(range.min)
        .and_then(|span| span.checked_div(range.step));
    match steps {
        Some(steps) if steps < Decimal::from(MAX_SWEEP_POINTS) => {}
        _ => return Err(too_many()),
    }

    let mut values = Vec::new();
    let mut current = Some(range.min);
    while let Some(value) = current.filter(|v| *v <= range.max) {
        values.push(value);
        current = value.checked_add(range.step);
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < range.max {
            values.push(range.max);
        }
    }
    if values.len() > MAX_SWEEP_POINTS {
        return Err(too_many());
    }

    Ok(values)
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| v.saturating_sub(target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Value the base inputs across every (WACC, terminal growth) pair.
///
/// The base inputs must themselves be valid. Grid cells that cannot be valued
/// (WACC not above growth, or the metric is unavailable) are left empty and
/// listed in the warnings.
pub fn wacc_growth_sensitivity(
    input: &SensitivityInput,
) -> DcfResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let base = input.base_inputs.resolve()?;
    let base_case_value = input.metric.extract(&calculate_resolved(&base)?);

    let wacc_values = generate_sweep_values("wacc", &input.wacc)?;
    let growth_values = generate_sweep_values("terminal_growth", &input.terminal_growth)?;

    let evaluated: Vec<Vec<DcfResult<Option<Money>>>> = wacc_values
        .par_iter()
        .map(|wacc| {
            growth_values
                .iter()
                .map(|growth| {
                    if wacc <= growth {
                        return Err(DcfError::InvalidRateSpread {
                            wacc: *wacc,
                            terminal_growth: *growth,
                        });
                    }
                    let mut cell = base.clone();
                    cell.wacc = *wacc;
                    cell.terminal_growth = *growth;
                    calculate_resolved(&cell).map(|r| input.metric.extract(&r))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let matrix: Vec<Vec<Option<Money>>> = evaluated
        .into_iter()
        .zip(&wacc_values)
        .map(|(row, wacc)| {
            row.into_iter()
                .zip(&growth_values)
                .map(|(cell, growth)| match cell {
                    Ok(Some(value)) => Some(value),
                    Ok(None) => {
                        warnings.push(format!(
                            "No {:?} at ({wacc}, {growth}); metric unavailable for these inputs",
                            input.metric
                        ));
                        None
                    }
                    Err(e) => {
                        warnings.push(format!("Evaluation failed at ({wacc}, {growth}): {e}"));
                        None
                    }
                })
                .collect()
        })
        .collect();

    let base_row = closest_index(&wacc_values, base.wacc);
    let base_col = closest_index(&growth_values, base.terminal_growth);

    let output = SensitivityOutput {
        wacc_values,
        terminal_growth_values: growth_values,
        metric: input.metric,
        matrix,
        base_case_position: (base_row, base_col),
        base_case_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Analysis (WACC x Terminal Growth)",
        &serde_json::json!({
            "wacc": input.wacc,
            "terminal_growth": input.terminal_growth,
            "metric": input.metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}
