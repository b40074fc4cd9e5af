use serde_json::Value;
use std::io::{self, Read};

/// Parse a piped deal document. JSON is tried first, then YAML.
pub fn parse_deal_document(raw: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => serde_yaml::from_str::<Value>(trimmed)
            .map(Some)
            .map_err(|yaml_err| {
                Box::<dyn std::error::Error>::from(format!(
                    "Deal on stdin is neither JSON ({json_err}) nor YAML ({yaml_err})"
                ))
            }),
    }
}

/// Read a deal piped on stdin. Returns None when stdin is a terminal or
/// the pipe is empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_deal_document(&buffer)
}
