//! Human-readable message extraction from API error bodies.
//!
//! The API reports errors in several shapes: a bare string, an
//! `{"errors":[{"message":..}]}` envelope, or arbitrary nesting of the two.
//! All string leaves are collected in document order and joined with `\n`.

use serde_json::Value;

/// Message used when the body is not JSON
pub const UNKNOWN_ERROR_FORMAT: &str = "failed to parse unknown error format";

/// Nesting depth past which flattening stops
pub const MAX_ERROR_DEPTH: usize = 64;

/// Flatten an error body into a message.
#[must_use]
pub fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => flatten(&value, 0),
        Err(_) => UNKNOWN_ERROR_FORMAT.to_owned(),
    }
}

fn flatten(value: &Value, depth: usize) -> String {
    if depth >= MAX_ERROR_DEPTH {
        return unexpected("nesting too deep");
    }
    match value {
        Value::String(message) => message.clone(),
        Value::Array(items) => join(items.iter(), depth),
        Value::Object(fields) => join(fields.values(), depth),
        Value::Number(_) => unexpected("number"),
        Value::Bool(_) => unexpected("bool"),
        Value::Null => unexpected("null"),
    }
}

fn join<'a>(values: impl Iterator<Item = &'a Value>, depth: usize) -> String {
    values
        .map(|value| flatten(value, depth + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn unexpected(kind: &str) -> String {
    format!("failed to parse unexpected error type: {kind}")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_errors_envelope() {
        let body = br#"{"errors":[{"message":"a"},{"message":"b"}]}"#;
        assert_eq!(error_message(body), "a\nb");
    }

    #[test]
    fn test_bare_string() {
        assert_eq!(error_message(br#""token expired""#), "token expired");
    }

    #[test]
    fn test_object_order_is_preserved() {
        let body = br#"{"z":"first","a":["second","third"]}"#;
        assert_eq!(error_message(body), "first\nsecond\nthird");
    }

    #[test]
    fn test_non_json_body() {
        assert_eq!(error_message(b"<html>502</html>"), UNKNOWN_ERROR_FORMAT);
        assert_eq!(error_message(b""), UNKNOWN_ERROR_FORMAT);
    }

    #[test]
    fn test_unexpected_scalars() {
        assert_eq!(
            error_message(b"42"),
            "failed to parse unexpected error type: number"
        );
        assert_eq!(
            error_message(br#"{"errors":[{"code":true}]}"#),
            "failed to parse unexpected error type: bool"
        );
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let depth = MAX_ERROR_DEPTH + 10;
        let body = format!("{}\"x\"{}", "[".repeat(depth), "]".repeat(depth));

        let message = error_message(body.as_bytes());
        assert_eq!(message, "failed to parse unexpected error type: nesting too deep");
    }
}
