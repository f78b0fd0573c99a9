use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use crate::error::DcfError;
use crate::valuation::dcf::{calculate, ValuationSummary};
use crate::valuation::inputs::{ValuationInputs, ValuationOverrides};
use crate::types::{with_metadata, ComputationOutput};
use crate::DcfResult;

use super::ordered::{deserialize_entries, serialize_entries};

/// Name under which the unmodified base case is reported.
pub const BASE_SCENARIO: &str = "base";

/// Relative EV move against base above which a scenario is flagged.
const LARGE_DEVIATION: Decimal = dec!(0.50);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Named override sets, in the order the caller supplied them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioSet {
    entries: Vec<(String, ValuationOverrides)>,
}

impl ScenarioSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scenario, builder style.
    pub fn with(mut self, name: impl Into<String>, overrides: ValuationOverrides) -> Self {
        self.push(name, overrides);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, overrides: ValuationOverrides) {
        self.entries.push((name.into(), overrides));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValuationOverrides)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }
}

impl<N: Into<String>> FromIterator<(N, ValuationOverrides)> for ScenarioSet {
    fn from_iter<I: IntoIterator<Item = (N, ValuationOverrides)>>(iter: I) -> Self {
        ScenarioSet {
            entries: iter.into_iter().map(|(n, o)| (n.into(), o)).collect(),
        }
    }
}

impl Serialize for ScenarioSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for ScenarioSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ScenarioSet {
            entries: deserialize_entries(deserializer)?,
        })
    }
}

/// Scenario name → summary; "base" first, then caller order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioResult {
    entries: Vec<(String, ValuationSummary)>,
}

impl ScenarioResult {
    pub fn get(&self, name: &str) -> Option<&ValuationSummary> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, summary)| summary)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValuationSummary)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }
}

impl FromIterator<(String, ValuationSummary)> for ScenarioResult {
    fn from_iter<I: IntoIterator<Item = (String, ValuationSummary)>>(iter: I) -> Self {
        ScenarioResult {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for ScenarioResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for ScenarioResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ScenarioResult {
            entries: deserialize_entries(deserializer)?,
        })
    }
}

/// Request shape for a full scenario analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysisInput {
    /// Full DCF input set for the base case
    pub base_inputs: ValuationInputs,
    /// Scenario name → input overrides
    #[serde(default)]
    pub scenarios: ScenarioSet,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value the base case and every scenario. Fails on the first scenario (in
/// caller order) whose inputs are invalid; no partial result is returned.
pub fn run_scenarios(base: &ValuationInputs, scenarios: &ScenarioSet) -> DcfResult<ScenarioResult> {
    validate_names(scenarios)?;

    let base_summary = calculate(base)
        .map_err(|e| in_scenario(BASE_SCENARIO, e))?
        .summary();

    debug!(scenarios = scenarios.len(), "evaluating scenarios");

    // Each scenario values its own copy of the base inputs; order of the
    // collected outcomes follows the input order.
    let outcomes: Vec<DcfResult<ValuationSummary>> = scenarios
        .entries
        .par_iter()
        .map(|(_, overrides)| calculate(&base.overlay(overrides)).map(|r| r.summary()))
        .collect();

    let mut entries = Vec::with_capacity(scenarios.len() + 1);
    entries.push((BASE_SCENARIO.to_string(), base_summary));
    for ((name, _), outcome) in scenarios.entries.iter().zip(outcomes) {
        let summary = outcome.map_err(|e| in_scenario(name, e))?;
        entries.push((name.clone(), summary));
    }

    Ok(ScenarioResult { entries })
}

/// [`run_scenarios`] in the standard metadata envelope, flagging scenarios
/// whose enterprise value moves more than 50% from base.
pub fn run_scenarios_with_metadata(
    input: &ScenarioAnalysisInput,
) -> DcfResult<ComputationOutput<ScenarioResult>> {
    let start = Instant::now();
    let result = run_scenarios(&input.base_inputs, &input.scenarios)?;

    let mut warnings: Vec<String> = Vec::new();
    if let Some(base) = result.get(BASE_SCENARIO) {
        for (name, summary) in result.iter().skip(1) {
            if base.enterprise_value.is_zero() {
                break;
            }
            let deviation = summary
                .enterprise_value
                .checked_sub(base.enterprise_value)
                .and_then(|delta| delta.checked_div(base.enterprise_value));
            let Some(deviation) = deviation else {
                warnings.push(format!(
                    "Scenario '{name}' moves enterprise value too far from base to express"
                ));
                continue;
            };
            if deviation.abs() > LARGE_DEVIATION {
                warnings.push(format!(
                    "Scenario '{name}' moves enterprise value {:.1}% from base",
                    deviation.saturating_mul(dec!(100))
                ));
            }
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "DCF Scenario Analysis (base + overrides)",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "scenario_names": input.scenarios.iter().map(|(n, _)| n).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_names(scenarios: &ScenarioSet) -> DcfResult<()> {
    let mut seen = HashSet::with_capacity(scenarios.len());
    for (name, _) in scenarios.iter() {
        if name == BASE_SCENARIO {
            return Err(DcfError::InvalidInput {
                field: "scenarios".into(),
                reason: format!("'{BASE_SCENARIO}' is reserved for the unmodified input set"),
            });
        }
        if !seen.insert(name) {
            return Err(DcfError::InvalidInput {
                field: "scenarios".into(),
                reason: format!("Duplicate scenario name '{name}'"),
            });
        }
    }
    Ok(())
}

fn in_scenario(name: &str, source: DcfError) -> DcfError {
    DcfError::Scenario {
        name: name.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DcfErrorKind;
    use pretty_assertions::assert_eq;

    fn base_inputs() -> ValuationInputs {
        ValuationInputs {
            revenue: Some(dec!(1000)),
            years: Some(3),
            revenue_growth: Some(dec!(0.10).into()),
            ebit_margin: Some(dec!(0.20)),
            wacc: Some(dec!(0.10)),
            terminal_growth: Some(dec!(0.03)),
            shares_outstanding: Some(dec!(100)),
            net_debt: Some(dec!(50)),
            ..Default::default()
        }
    }

    fn bear_bull() -> ScenarioSet {
        ScenarioSet::new()
            .with(
                "bull",
                ValuationOverrides {
                    revenue_growth: Some(Some(dec!(0.15).into())),
                    ..Default::default()
                },
            )
            .with(
                "bear",
                ValuationOverrides {
                    revenue_growth: Some(Some(dec!(0.02).into())),
                    wacc: Some(Some(dec!(0.12))),
                    ..Default::default()
                },
            )
    }

    #[test]
    fn test_base_first_then_caller_order() {
        let result = run_scenarios(&base_inputs(), &bear_bull()).unwrap();
        assert_eq!(result.names(), vec!["base", "bull", "bear"]);
    }

    #[test]
    fn test_empty_scenarios_is_base_only() {
        let base = base_inputs();
        let result = run_scenarios(&base, &ScenarioSet::new()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get("base").unwrap(),
            &calculate(&base).unwrap().summary()
        );
    }

    #[test]
    fn test_scenarios_match_direct_calculation() {
        let base = base_inputs();
        let set = bear_bull();
        let result = run_scenarios(&base, &set).unwrap();
        for (name, overrides) in set.iter() {
            let direct = calculate(&base.overlay(overrides)).unwrap().summary();
            assert_eq!(result.get(name).unwrap(), &direct);
        }
        let bull = result.get("bull").unwrap();
        let bear = result.get("bear").unwrap();
        assert!(bull.enterprise_value > result.get("base").unwrap().enterprise_value);
        assert!(bear.enterprise_value < result.get("base").unwrap().enterprise_value);
    }

    #[test]
    fn test_overrides_do_not_leak_between_scenarios() {
        let set = ScenarioSet::new()
            .with(
                "high_wacc",
                ValuationOverrides {
                    wacc: Some(Some(dec!(0.15))),
                    ..Default::default()
                },
            )
            .with("unchanged", ValuationOverrides::default());
        let result = run_scenarios(&base_inputs(), &set).unwrap();
        assert_eq!(result.get("unchanged"), result.get("base"));
    }

    #[test]
    fn test_order_preserved_across_many_scenarios() {
        let set: ScenarioSet = (1..=40)
            .map(|i| {
                (
                    format!("s{i:02}"),
                    ValuationOverrides {
                        wacc: Some(Some(dec!(0.10) + Decimal::new(i, 3))),
                        ..Default::default()
                    },
                )
            })
            .collect();
        let result = run_scenarios(&base_inputs(), &set).unwrap();
        let names = result.names();
        assert_eq!(names[0], "base");
        for (i, name) in names.iter().skip(1).enumerate() {
            assert_eq!(*name, format!("s{:02}", i + 1));
        }
        // Higher WACC each step, so EV strictly falls along the list
        let evs: Vec<Decimal> = result.iter().skip(1).map(|(_, s)| s.enterprise_value).collect();
        assert!(evs.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_fail_fast_reports_first_failing_scenario() {
        let set = ScenarioSet::new()
            .with("ok", ValuationOverrides::default())
            .with(
                "inverted",
                ValuationOverrides {
                    terminal_growth: Some(Some(dec!(0.20))),
                    ..Default::default()
                },
            )
            .with(
                "bad_shape",
                ValuationOverrides {
                    revenue_growth: Some(Some(vec![dec!(0.1)].into())),
                    ..Default::default()
                },
            );
        let err = run_scenarios(&base_inputs(), &set).unwrap_err();
        assert_eq!(err.scenario_name(), Some("inverted"));
        assert_eq!(err.kind(), DcfErrorKind::InvalidRateSpread);
    }

    #[test]
    fn test_invalid_base_is_reported_as_base() {
        let mut base = base_inputs();
        base.net_debt = None;
        base.shares_outstanding = None;
        let err = run_scenarios(&base, &bear_bull()).unwrap_err();
        assert_eq!(err.scenario_name(), Some("base"));
        assert_eq!(err.kind(), DcfErrorKind::MissingInput);
    }

    #[test]
    fn test_reserved_and_duplicate_names_rejected() {
        let reserved = ScenarioSet::new().with("base", ValuationOverrides::default());
        assert_eq!(
            run_scenarios(&base_inputs(), &reserved).unwrap_err().kind(),
            DcfErrorKind::InvalidInput
        );

        let dup = ScenarioSet::new()
            .with("x", ValuationOverrides::default())
            .with("x", ValuationOverrides::default());
        assert_eq!(
            run_scenarios(&base_inputs(), &dup).unwrap_err().kind(),
            DcfErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_scenario_set_deserializes_in_document_order() {
        let input: ScenarioAnalysisInput = serde_json::from_str(
            r#"{
                "base_inputs": {"revenue": 1000, "net_debt": 50},
                "scenarios": {
                    "zeta": {"wacc": 0.11},
                    "alpha": {"revenue_growth": 0.08},
                    "mid": {}
                }
            }"#,
        )
        .unwrap();
        let names: Vec<&str> = input.scenarios.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_result_serializes_as_ordered_object() {
        let result = run_scenarios(&base_inputs(), &bear_bull()).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let base_pos = json.find("\"base\"").unwrap();
        let bull_pos = json.find("\"bull\"").unwrap();
        let bear_pos = json.find("\"bear\"").unwrap();
        assert!(base_pos < bull_pos && bull_pos < bear_pos);
    }

    #[test]
    fn test_metadata_flags_large_moves() {
        let input = ScenarioAnalysisInput {
            base_inputs: base_inputs(),
            scenarios: ScenarioSet::new().with(
                "collapse",
                ValuationOverrides {
                    ebit_margin: Some(Some(dec!(0.09))),
                    ..Default::default()
                },
            ),
        };
        let out = run_scenarios_with_metadata(&input).unwrap();
        assert_eq!(out.result.len(), 2);
        assert!(out.warnings.iter().any(|w| w.contains("collapse")));
    }
}
