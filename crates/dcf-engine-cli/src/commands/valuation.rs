use clap::Args;
use rust_decimal::Decimal;

use dcf_engine_core::export::export_valuation_csv;
use dcf_engine_core::valuation::dcf;
use dcf_engine_core::valuation::inputs::{GrowthSchedule, ValuationInputs};

use super::CommandOutput;
use crate::input;

/// Arguments for a single DCF valuation
#[derive(Args)]
pub struct ValueArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Base (year 0) revenue
    #[arg(long, alias = "base-revenue")]
    pub revenue: Option<Decimal>,

    /// Explicit forecast years [default: 5]
    #[arg(long)]
    pub years: Option<u32>,

    /// Revenue growth applied every year (e.g. 0.05 for 5%)
    #[arg(long, conflicts_with = "growth_schedule", allow_hyphen_values = true)]
    pub growth: Option<Decimal>,

    /// Comma-separated per-year growth rates; count must equal --years
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub growth_schedule: Vec<Decimal>,

    /// EBIT margin
    #[arg(long)]
    pub ebit_margin: Option<Decimal>,

    /// Tax rate on operating income
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Capital expenditure as a fraction of revenue
    #[arg(long)]
    pub capex_pct: Option<Decimal>,

    /// Working capital investment as a fraction of revenue
    #[arg(long)]
    pub nwc_pct: Option<Decimal>,

    /// Discount rate (WACC)
    #[arg(long, alias = "discount-rate")]
    pub wacc: Option<Decimal>,

    /// Terminal (perpetuity) growth rate
    #[arg(long, allow_hyphen_values = true)]
    pub terminal_growth: Option<Decimal>,

    /// Diluted shares outstanding
    #[arg(long, alias = "shares-outstanding")]
    pub shares: Option<Decimal>,

    /// Net debt (negative for net cash)
    #[arg(long, allow_hyphen_values = true)]
    pub net_debt: Option<Decimal>,
}

impl ValueArgs {
    fn into_inputs(self) -> ValuationInputs {
        let revenue_growth = if !self.growth_schedule.is_empty() {
            Some(GrowthSchedule::Sequence(self.growth_schedule))
        } else {
            self.growth.map(GrowthSchedule::Scalar)
        };

        ValuationInputs {
            revenue: self.revenue,
            base_revenue: None,
            shares_outstanding: self.shares,
            net_debt: self.net_debt,
            years: self.years,
            revenue_growth,
            ebit_margin: self.ebit_margin,
            tax_rate: self.tax_rate,
            capex_pct: self.capex_pct,
            nwc_pct: self.nwc_pct,
            wacc: self.wacc,
            terminal_growth: self.terminal_growth,
        }
    }
}

pub fn run_value(args: ValueArgs) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let inputs: ValuationInputs = if let Some(path) = args.input.clone() {
        input::file::read_input(&path)?
    } else if args.revenue.is_some() {
        args.into_inputs()
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--revenue is required (or provide --input / pipe JSON on stdin)".into());
    };

    let result = dcf::calculate_with_metadata(&inputs)?;
    let csv = export_valuation_csv(&result.result)?;

    Ok(CommandOutput {
        value: serde_json::to_value(result)?,
        csv: Some(csv),
    })
}
