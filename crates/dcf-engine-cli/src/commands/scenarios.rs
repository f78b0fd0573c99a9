use clap::Args;

use dcf_engine_core::export::export_scenarios_csv;
use dcf_engine_core::scenarios::runner::{self, ScenarioAnalysisInput};
use dcf_engine_core::scenarios::sensitivity::{self, SensitivityInput};

use super::CommandOutput;
use crate::input;

/// Arguments for scenario analysis
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to JSON or YAML file with `base_inputs` and `scenarios`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a WACC x terminal growth sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON or YAML file with `base_inputs`, `wacc`, `terminal_growth` and `metric`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let request: ScenarioAnalysisInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input file is required for scenario analysis".into());
    };

    let result = runner::run_scenarios_with_metadata(&request)?;
    let csv = export_scenarios_csv(&result.result)?;

    Ok(CommandOutput {
        value: serde_json::to_value(result)?,
        csv: Some(csv),
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let request: SensitivityInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input file is required for sensitivity analysis".into());
    };

    let result = sensitivity::wacc_growth_sensitivity(&request)?;

    Ok(CommandOutput {
        value: serde_json::to_value(result)?,
        csv: None,
    })
}
