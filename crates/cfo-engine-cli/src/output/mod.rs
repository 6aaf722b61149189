pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(unwrap_response(value)),
        OutputFormat::Csv => csv_out::print_csv(unwrap_response(value)),
        OutputFormat::Minimal => minimal::print_minimal(unwrap_response(value)),
    }
}

/// A successful dispatch response wraps the computation envelope in
/// `{status, intent, result}`; the non-JSON formatters show the envelope.
fn unwrap_response(value: &Value) -> &Value {
    match value.as_object() {
        Some(map) if map.get("status").and_then(Value::as_str) == Some("success") => {
            map.get("result").unwrap_or(value)
        }
        _ => value,
    }
}

/// Period-by-field grid for a serialized time series
/// (`[{period, values: {...}}]`), or None for any other array.
pub fn series_grid(arr: &[Value]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let rows: Vec<(&Value, &Map<String, Value>)> = arr
        .iter()
        .map(|item| {
            let period = item.get("period")?;
            let values = item.get("values")?.as_object()?;
            Some((period, values))
        })
        .collect::<Option<_>>()?;
    if rows.is_empty() {
        return None;
    }

    let mut fields: Vec<String> = Vec::new();
    for (_, values) in &rows {
        for key in values.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
    }

    let mut headers = vec!["period".to_string()];
    headers.extend(fields.iter().cloned());
    let body = rows
        .iter()
        .map(|(period, values)| {
            let mut row = vec![cell(period)];
            row.extend(fields.iter().map(|f| values.get(f).map(cell).unwrap_or_default()));
            row
        })
        .collect();
    Some((headers, body))
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "undefined".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
