use serde_json::{Map, Value};
use std::io::{self, Write};

/// Write output as CSV to stdout, for results without a fixed export layout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_csv(value, stdout.lock()) {
        eprintln!("CSV write error: {}", e);
    }
}

fn write_csv<W: Write>(value: &Value, sink: W) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(sink);

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) if map.contains_key("matrix") => write_grid(&mut wtr, map)?,
        Value::Object(map) => {
            // Two-column CSV: field, value
            wtr.write_record(["field", "value"])?;
            for (key, val) in map {
                wtr.write_record([key.as_str(), &format_csv_value(val)])?;
            }
        }
        _ => wtr.write_record([&format_csv_value(result)])?,
    }

    wtr.flush()?;
    Ok(())
}

/// Sensitivity grid: WACC down the side, terminal growth across the top.
fn write_grid<W: Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) -> csv::Result<()> {
    let empty = Vec::new();
    let cols = map
        .get("terminal_growth_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let rows = map.get("wacc_values").and_then(Value::as_array).unwrap_or(&empty);
    let matrix = map.get("matrix").and_then(Value::as_array).unwrap_or(&empty);

    let mut header = vec!["wacc \\ terminal_growth".to_string()];
    header.extend(cols.iter().map(format_csv_value));
    wtr.write_record(&header)?;

    for (wacc, cells) in rows.iter().zip(matrix) {
        let mut record = vec![format_csv_value(wacc)];
        if let Some(cells) = cells.as_array() {
            record.extend(cells.iter().map(format_csv_value));
        }
        wtr.write_record(&record)?;
    }
    Ok(())
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
