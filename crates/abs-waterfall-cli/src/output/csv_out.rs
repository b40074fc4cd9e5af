use serde_json::Value;
use std::io;

use super::{primary_records, result_of};

/// Write output as CSV to stdout.
///
/// Record-bearing results (schedules, waterfalls, pricing) are written as one
/// row per record; anything else becomes two-column `field,value` CSV.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(map) => {
            if let Some(records) = primary_records(map) {
                write_array_csv(&mut wtr, records);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    if !val.is_array() {
                        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                    }
                }
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        other => {
            let _ = wtr.write_record([&format_csv_value(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
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
