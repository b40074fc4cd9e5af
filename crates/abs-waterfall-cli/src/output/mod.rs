pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Result fields that hold per-period or per-tranche record sets, in the
/// order they are preferred when only one can be shown.
pub const RECORD_SECTIONS: [&str; 5] = [
    "liability_periods",
    "schedule",
    "asset_periods",
    "tranches",
    "history",
];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// True for a non-empty array whose first element is an object.
pub fn is_record_set(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if matches!(arr.first(), Some(Value::Object(_))))
}

/// The result object of an output envelope, or the value itself.
pub fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// First record set in `map` by [`RECORD_SECTIONS`] priority.
pub fn primary_records(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    RECORD_SECTIONS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|v| is_record_set(v))
        .and_then(Value::as_array)
}
