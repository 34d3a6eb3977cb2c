//! Output handling for the CLI
//!
//! Results go to stdout as one compact JSON value per line. Logs and
//! metrics go to stderr.

use std::io::Write;

use serde_json::Value;

use super::errors::CliResult;

/// Writes one value as a single line
pub fn write_value<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes preformatted text followed by a newline
pub fn write_text<W: Write>(out: &mut W, text: &str) -> CliResult<()> {
    writeln!(out, "{}", text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_value_per_line() {
        let mut out = Vec::new();
        write_value(&mut out, &json!({"a": 1})).unwrap();
        write_value(&mut out, &json!([1, 2])).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n[1,2]\n");
    }
}
