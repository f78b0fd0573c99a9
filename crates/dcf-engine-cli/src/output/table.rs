use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_result(result, map),
            None => println!("{}", field_value_table(map)),
        },
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res) if res.contains_key("matrix") => println!("{}", grid_table(res)),
        Value::Object(res) if !res.is_empty() && res.values().all(Value::is_object) => {
            println!("{}", keyed_rows_table("scenario", res));
        }
        Value::Object(res) => {
            // Tabular fields (projections) first, then the scalar summary
            let mut scalars = Map::new();
            for (key, val) in res {
                match val {
                    Value::Array(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
                        println!("{}", key.to_uppercase());
                        println!("{}\n", rows_table(rows));
                    }
                    _ => {
                        scalars.insert(key.clone(), val.clone());
                    }
                }
            }
            println!("{}", field_value_table(&scalars));
        }
        other => println!("{}", format_value(other)),
    }

    // Print warnings if any
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    // Print methodology
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn field_value_table(map: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    builder.build()
}

/// One row per object, columns taken from the first object.
fn rows_table(rows: &[Value]) -> Table {
    let headers: Vec<String> = rows
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();

    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows {
        if let Value::Object(map) = row {
            builder.push_record(cells(map, &headers));
        }
    }
    builder.build()
}

/// One row per entry of a name-keyed object, name in the first column.
fn keyed_rows_table(key_header: &str, map: &Map<String, Value>) -> Table {
    let headers: Vec<String> = map
        .values()
        .next()
        .and_then(Value::as_object)
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();

    let mut builder = Builder::default();
    let mut header_row = vec![key_header.to_string()];
    header_row.extend(headers.iter().cloned());
    builder.push_record(header_row);

    for (name, row) in map {
        if let Value::Object(inner) = row {
            let mut record = vec![name.clone()];
            record.extend(cells(inner, &headers));
            builder.push_record(record);
        }
    }
    builder.build()
}

fn grid_table(res: &Map<String, Value>) -> Table {
    let empty = Vec::new();
    let cols = res
        .get("terminal_growth_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let rows = res.get("wacc_values").and_then(Value::as_array).unwrap_or(&empty);
    let matrix = res.get("matrix").and_then(Value::as_array).unwrap_or(&empty);

    let mut builder = Builder::default();
    let mut header = vec!["WACC \\ g".to_string()];
    header.extend(cols.iter().map(format_value));
    builder.push_record(header);

    for (wacc, cells) in rows.iter().zip(matrix) {
        let mut record = vec![format_value(wacc)];
        if let Some(cells) = cells.as_array() {
            record.extend(cells.iter().map(format_value));
        }
        builder.push_record(record);
    }
    builder.build()
}

fn cells(map: &Map<String, Value>, headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
        .collect()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
