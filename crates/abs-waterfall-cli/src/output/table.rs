use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::is_record_set;

/// Format output as tables using the tabled crate.
///
/// Scalar result fields go in one `Field | Value` table; each record set
/// (per-period ledgers, tranche summaries) gets its own titled table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_object(map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    if let Value::Object(res_map) = result {
        print_object(res_map);
    } else {
        print_object(envelope);
    }

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

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if !is_record_set(val) {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
    }
    println!("{}", Table::from(builder));

    for (key, val) in map {
        if let Value::Array(records) = val {
            if is_record_set(val) {
                println!("\n{}:", key);
                print_array_table(records);
            }
        }
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            // Money and rates read better rounded in a table
            Some(f) if n.is_f64() => format!("{:.6}", f)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_float_cells_rounded() {
        assert_eq!(format_value(&json!(106.618_795_4)), "106.618795");
        assert_eq!(format_value(&json!(12.5)), "12.5");
        assert_eq!(format_value(&json!(36)), "36");
        assert_eq!(format_value(&json!([0.05, 0.08])), "0.05, 0.08");
    }
}
