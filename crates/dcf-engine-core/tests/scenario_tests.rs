use dcf_engine_core::scenarios::runner::{run_scenarios, ScenarioAnalysisInput, ScenarioSet};
use dcf_engine_core::valuation::dcf;
use dcf_engine_core::valuation::inputs::{ValuationInputs, ValuationOverrides};
use dcf_engine_core::DcfErrorKind;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn base() -> ValuationInputs {
    ValuationInputs {
        revenue: Some(dec!(5000)),
        years: Some(5),
        ebit_margin: Some(dec!(0.18)),
        wacc: Some(dec!(0.085)),
        terminal_growth: Some(dec!(0.02)),
        shares_outstanding: Some(dec!(250)),
        net_debt: Some(dec!(1200)),
        ..Default::default()
    }
}

#[test]
fn test_no_overrides_equals_single_valuation() {
    let result = run_scenarios(&base(), &ScenarioSet::new()).unwrap();
    assert_eq!(result.names(), vec!["base"]);
    assert_eq!(
        result.get("base"),
        Some(&dcf::calculate(&base()).unwrap().summary())
    );
}

#[test]
fn test_base_inputs_unchanged_after_run() {
    let inputs = base();
    let snapshot = inputs.clone();
    let set = ScenarioSet::new().with(
        "cheap_capital",
        ValuationOverrides {
            wacc: Some(Some(dec!(0.07))),
            net_debt: Some(Some(dec!(0))),
            ..Default::default()
        },
    );
    run_scenarios(&inputs, &set).unwrap();
    assert_eq!(inputs, snapshot);
}

#[test]
fn test_json_request_end_to_end() {
    let request: ScenarioAnalysisInput = serde_json::from_str(
        r#"{
            "base_inputs": {"revenue": 5000, "years": 5, "ebit_margin": 0.18,
                            "wacc": 0.085, "terminal_growth": 0.02,
                            "shares_outstanding": 250, "net_debt": 1200},
            "scenarios": {
                "bull": {"revenue_growth": [0.12, 0.11, 0.10, 0.09, 0.08]},
                "bear": {"revenue_growth": 0.0, "ebit_margin": 0.14}
            }
        }"#,
    )
    .unwrap();
    assert_eq!(request.base_inputs, base());

    let result = run_scenarios(&request.base_inputs, &request.scenarios).unwrap();
    assert_eq!(result.names(), vec!["base", "bull", "bear"]);

    let base_ps = result.get("base").unwrap().value_per_share.unwrap();
    let bull_ps = result.get("bull").unwrap().value_per_share.unwrap();
    let bear_ps = result.get("bear").unwrap().value_per_share.unwrap();
    assert!(bear_ps < base_ps && base_ps < bull_ps);
}

#[test]
fn test_scenario_error_carries_name() {
    let set = ScenarioSet::new().with(
        "wrong_length",
        ValuationOverrides {
            revenue_growth: Some(Some(vec![dec!(0.1), dec!(0.1)].into())),
            ..Default::default()
        },
    );
    let err = run_scenarios(&base(), &set).unwrap_err();
    assert_eq!(err.kind(), DcfErrorKind::ShapeMismatch);
    assert_eq!(err.scenario_name(), Some("wrong_length"));
    assert!(err.to_string().contains("wrong_length"));
}

#[test]
fn test_horizon_override_with_matching_sequence() {
    let set = ScenarioSet::new().with(
        "short",
        ValuationOverrides {
            years: Some(Some(2)),
            revenue_growth: Some(Some(vec![dec!(0.05), dec!(0.04)].into())),
            ..Default::default()
        },
    );
    let result = run_scenarios(&base(), &set).unwrap();
    let direct = dcf::calculate(&ValuationInputs {
        years: Some(2),
        revenue_growth: Some(vec![dec!(0.05), dec!(0.04)].into()),
        ..base()
    })
    .unwrap();
    assert_eq!(result.get("short"), Some(&direct.summary()));
}

#[test]
fn test_null_override_clears_net_debt() {
    let request: ScenarioAnalysisInput = serde_json::from_str(
        r#"{
            "base_inputs": {"revenue": 1000, "shares_outstanding": 100, "net_debt": 50},
            "scenarios": {"no_debt_info": {"net_debt": null}}
        }"#,
    )
    .unwrap();
    let result = run_scenarios(&request.base_inputs, &request.scenarios).unwrap();

    let base = result.get("base").unwrap();
    assert!(base.equity_value.is_some());

    let cleared = result.get("no_debt_info").unwrap();
    assert_eq!(cleared.equity_value, None);
    assert_eq!(cleared.value_per_share, None);
    assert_eq!(cleared.enterprise_value, base.enterprise_value);
}

#[test]
fn test_yaml_null_override_clears_field() {
    let request: ScenarioAnalysisInput = serde_yaml::from_str(
        "base_inputs:\n  revenue: 1000\n  shares_outstanding: 100\n  net_debt: 50\n\
         scenarios:\n  no_debt_info:\n    net_debt: ~\n  same: {}\n",
    )
    .unwrap();
    let result = run_scenarios(&request.base_inputs, &request.scenarios).unwrap();
    assert_eq!(result.get("no_debt_info").unwrap().equity_value, None);
    assert_eq!(
        result.get("same").unwrap(),
        result.get("base").unwrap()
    );
}

#[test]
fn test_clearing_both_equity_inputs_fails_in_scenario() {
    let set = ScenarioSet::new().with(
        "nothing_left",
        ValuationOverrides {
            shares_outstanding: Some(None),
            net_debt: Some(None),
            ..Default::default()
        },
    );
    let err = run_scenarios(&base(), &set).unwrap_err();
    assert_eq!(err.kind(), DcfErrorKind::MissingInput);
    assert_eq!(err.scenario_name(), Some("nothing_left"));
}
