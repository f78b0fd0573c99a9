//! CSV renderings of valuation and scenario results.
//!
//! Column order and the literal section labels are a compatibility contract
//! with downstream consumers: do not reorder or rename them.
//!
//! Every row, including the blank separator rows, ends with a bare LF
//! (`\n`), not CRLF. Money cells use fixed two-decimal text.

use std::io::Write;

use crate::error::DcfError;
use crate::scenarios::runner::ScenarioResult;
use crate::types::Money;
use crate::valuation::dcf::ValuationResult;
use crate::DcfResult;

pub const PROJECTIONS_TITLE: &str = "DCF PROJECTIONS";
pub const SUMMARY_TITLE: &str = "SUMMARY";
pub const PROJECTION_COLUMNS: [&str; 5] = ["year", "revenue", "ebit", "nopat", "fcff"];
pub const SCENARIO_COLUMNS: [&str; 4] = [
    "scenario",
    "enterprise_value",
    "equity_value",
    "value_per_share",
];

/// Render a single valuation as CSV text.
pub fn export_valuation_csv(result: &ValuationResult) -> DcfResult<String> {
    let mut buf = Vec::new();
    write_valuation_csv(result, &mut buf)?;
    into_string(buf)
}

/// Render a scenario comparison as CSV text.
pub fn export_scenarios_csv(result: &ScenarioResult) -> DcfResult<String> {
    let mut buf = Vec::new();
    write_scenarios_csv(result, &mut buf)?;
    into_string(buf)
}

/// Stream a single valuation as CSV.
pub fn write_valuation_csv<W: Write>(result: &ValuationResult, mut sink: W) -> DcfResult<()> {
    {
        let mut wtr = csv_writer(&mut sink);
        wtr.write_record([PROJECTIONS_TITLE])?;
        wtr.flush()?;
    }
    blank_row(&mut sink)?;

    {
        let mut wtr = csv_writer(&mut sink);
        wtr.write_record(PROJECTION_COLUMNS)?;
        for row in &result.projections {
            wtr.write_record([
                row.year.to_string(),
                money_field(Some(row.revenue)),
                money_field(Some(row.ebit)),
                money_field(Some(row.nopat)),
                money_field(Some(row.fcff)),
            ])?;
        }
        wtr.flush()?;
    }
    blank_row(&mut sink)?;

    let mut wtr = csv_writer(&mut sink);
    wtr.write_record([SUMMARY_TITLE])?;
    wtr.write_record([
        "Enterprise Value".to_string(),
        money_field(Some(result.enterprise_value)),
    ])?;
    wtr.write_record(["Equity Value".to_string(), money_field(result.equity_value)])?;
    wtr.write_record([
        "Value Per Share".to_string(),
        money_field(result.value_per_share),
    ])?;
    wtr.flush()?;
    Ok(())
}

/// Stream a scenario comparison as CSV, one row per scenario in result order.
pub fn write_scenarios_csv<W: Write>(result: &ScenarioResult, sink: W) -> DcfResult<()> {
    let mut wtr = csv_writer(sink);

    wtr.write_record(SCENARIO_COLUMNS)?;
    for (name, summary) in result.iter() {
        wtr.write_record([
            name.to_string(),
            money_field(Some(summary.enterprise_value)),
            money_field(summary.equity_value),
            money_field(summary.value_per_share),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

fn csv_writer<W: Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

/// Empty line between sections.
fn blank_row<W: Write>(sink: &mut W) -> DcfResult<()> {
    sink.write_all(b"\n")?;
    Ok(())
}

/// Fixed 2-dp text; absent values become an empty field.
fn money_field(value: Option<Money>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn into_string(buf: Vec<u8>) -> DcfResult<String> {
    String::from_utf8(buf).map_err(|e| DcfError::Serialization(e.to_string()))
}

impl From<csv::Error> for DcfError {
    fn from(e: csv::Error) -> Self {
        DcfError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for DcfError {
    fn from(e: std::io::Error) -> Self {
        DcfError::Serialization(e.to_string())
    }
}
