use serde_json::Value;

use super::result_of;

/// Print just the key answer from the output.
///
/// Priced or summarised tranches print one line each (`name coupon rating`);
/// otherwise the first well-known scalar wins, falling back to the first
/// field of the result.
pub fn print_minimal(value: &Value) {
    let result_obj = result_of(value);

    let priority_keys = [
        "weighted_average_rate",
        "monthly_payment",
        "final_period",
        "total_interest",
    ];

    if let Value::Object(map) = result_obj {
        if let Some(Value::Array(tranches)) = map.get("tranches") {
            let lines: Vec<String> = tranches.iter().filter_map(tranche_line).collect();
            if !lines.is_empty() {
                println!("{}", lines.join("\n"));
                return;
            }
        }

        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn tranche_line(tranche: &Value) -> Option<String> {
    let name = tranche.get("name")?.as_str()?;
    let coupon = tranche.get("coupon_rate")?;
    let rating = tranche.get("rating")?;
    Some(format!(
        "{} {} {}",
        name,
        format_minimal(coupon),
        format_minimal(rating)
    ))
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
