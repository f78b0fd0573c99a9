use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_json(value, stdout.lock()) {
        eprintln!("JSON serialization error: {}", e);
    }
}

fn write_json<W: Write>(value: &Value, mut sink: W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut sink, value)?;
    writeln!(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_newline() {
        let mut buf = Vec::new();
        write_json(&serde_json::json!({"enterprise_value": "1417.14"}), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"enterprise_value\": \"1417.14\""));
    }
}
