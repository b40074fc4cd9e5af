use serde_json::Value;
use std::io::{self, Write};

/// Write the envelope as JSON: indented for a terminal, one line per
/// document when piped.
pub fn write_json<W: Write>(out: &mut W, value: &Value, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)
}

pub fn print_json(value: &Value) {
    let pretty = atty::is(atty::Stream::Stdout);
    let stdout = io::stdout();
    if let Err(e) = write_json(&mut stdout.lock(), value, pretty) {
        eprintln!("JSON output error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compact_when_piped() {
        let mut buf = Vec::new();
        write_json(&mut buf, &json!({"final_period": 36}), false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"final_period\":36}\n");
    }

    #[test]
    fn test_pretty_is_multiline() {
        let mut buf = Vec::new();
        write_json(&mut buf, &json!({"a": 1, "b": 2}), true).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 4);
    }
}
