use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Valuations print the most specific figure available (per-share, then
/// equity, then enterprise value). Scenario results print one
/// `name: value` line per scenario.
pub fn print_minimal(value: &Value) {
    for line in minimal_lines(value) {
        println!("{}", line);
    }
}

const PRIORITY_KEYS: [&str; 4] = [
    "value_per_share",
    "equity_value",
    "enterprise_value",
    "base_case_value",
];

fn minimal_lines(value: &Value) -> Vec<String> {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result_obj else {
        return vec![format_minimal(result_obj)];
    };

    if let Some(answer) = headline(map) {
        return vec![answer];
    }

    // Scenario mapping: one headline per entry
    if !map.is_empty() && map.values().all(Value::is_object) {
        return map
            .iter()
            .map(|(name, summary)| {
                let answer = summary
                    .as_object()
                    .and_then(headline)
                    .unwrap_or_default();
                format!("{}: {}", name, answer)
            })
            .collect();
    }

    // Fall back to first field
    match map.iter().next() {
        Some((key, val)) => vec![format!("{}: {}", key, format_minimal(val))],
        None => Vec::new(),
    }
}

/// First non-null priority field.
fn headline(map: &serde_json::Map<String, Value>) -> Option<String> {
    PRIORITY_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|val| !val.is_null())
        .map(format_minimal)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_valuation_prefers_per_share() {
        let value = json!({"result": {
            "enterprise_value": "1417.14",
            "equity_value": "1367.14",
            "value_per_share": "13.67"
        }});
        assert_eq!(minimal_lines(&value), vec!["13.67"]);
    }

    #[test]
    fn test_valuation_without_bridge_falls_back_to_ev() {
        let value = json!({"result": {
            "enterprise_value": "1417.14",
            "equity_value": null,
            "value_per_share": null
        }});
        assert_eq!(minimal_lines(&value), vec!["1417.14"]);
    }

    #[test]
    fn test_scenarios_one_line_each() {
        let value = json!({"result": {
            "base": {"enterprise_value": "10.00", "equity_value": "8.00", "value_per_share": null},
            "bull": {"enterprise_value": "12.00", "equity_value": "10.00", "value_per_share": null}
        }});
        assert_eq!(minimal_lines(&value), vec!["base: 8.00", "bull: 10.00"]);
    }
}
