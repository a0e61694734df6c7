//! Payload sanitization for log entries.
//!
//! Redacts values under sensitive keys and truncates oversized strings and
//! arrays before a payload is emitted or leaves the process. Total over any
//! input; a depth guard bounds recursion on pathological structures.

use regex::RegexSet;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Recursion limit; deeper values are replaced with `[MAX_DEPTH]`.
const MAX_DEPTH: usize = 10;

/// Strings longer than this are truncated with a marker.
const MAX_STRING_LENGTH: usize = 1000;

/// Arrays are capped to this many elements.
const MAX_ARRAY_LENGTH: usize = 50;

/// Marker appended to truncated strings.
const TRUNCATED_MARKER: &str = "...[truncated]";

/// Replacement for values under sensitive keys.
const REDACTED: &str = "[REDACTED]";

fn sensitive_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)password",
            r"(?i)secret",
            r"(?i)token",
            r"(?i)api[_-]?key",
            r"(?i)auth",
            r"(?i)credential",
            r"(?i)private",
            r"(?i)ssn",
            r"(?i)credit[_-]?card",
        ])
        .expect("sensitive key patterns are valid regexes")
    })
}

/// Returns true when a key matches one of the sensitive-name patterns.
pub fn is_sensitive_key(key: &str) -> bool {
    sensitive_patterns().is_match(key)
}

/// Sanitizes an arbitrary JSON value for logging.
///
/// Values under keys matching the sensitive-name patterns are replaced with
/// `[REDACTED]` at any depth. Strings over 1000 characters are truncated
/// with a marker, arrays are capped to their first 50 elements, and
/// recursion stops with a `[MAX_DEPTH]` marker past depth 10.
pub fn sanitize(value: &Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("[MAX_DEPTH]".to_string());
    }

    match value {
        Value::String(s) => Value::String(truncate_chars(s)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_ARRAY_LENGTH)
                .map(|item| sanitize_at(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => {
            let mut sanitized = Map::with_capacity(map.len());
            for (key, val) in map {
                if is_sensitive_key(key) {
                    sanitized.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_at(val, depth + 1));
                }
            }
            Value::Object(sanitized)
        }
        // null, booleans, and numbers pass through unchanged
        other => other.clone(),
    }
}

fn truncate_chars(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_LENGTH {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(MAX_STRING_LENGTH).collect();
    truncated.push_str(TRUNCATED_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_sensitive_keys() {
        let value = json!({
            "username": "admin",
            "password": "hunter2",
            "API_KEY": "k-123",
            "userToken": "t-456"
        });
        let sanitized = sanitize(&value);
        assert_eq!(sanitized["username"], "admin");
        assert_eq!(sanitized["password"], "[REDACTED]");
        assert_eq!(sanitized["API_KEY"], "[REDACTED]");
        assert_eq!(sanitized["userToken"], "[REDACTED]");
    }

    #[test]
    fn test_redacts_at_any_depth() {
        let value = json!({
            "request": {
                "headers": {
                    "authorization": "Bearer abc",
                    "accept": "application/json"
                }
            }
        });
        let sanitized = sanitize(&value);
        assert_eq!(sanitized["request"]["headers"]["authorization"], "[REDACTED]");
        assert_eq!(sanitized["request"]["headers"]["accept"], "application/json");
    }

    #[test]
    fn test_redacts_regardless_of_value_type() {
        let value = json!({
            "credentials": {"user": "a", "pass": "b"},
            "ssn": 123456789
        });
        let sanitized = sanitize(&value);
        assert_eq!(sanitized["credentials"], "[REDACTED]");
        assert_eq!(sanitized["ssn"], "[REDACTED]");
    }

    #[test]
    fn test_truncates_long_strings() {
        let value = json!({"body": "x".repeat(1500)});
        let sanitized = sanitize(&value);
        let s = sanitized["body"].as_str().unwrap();
        assert_eq!(s.len(), 1000 + "...[truncated]".len());
        assert!(s.starts_with(&"x".repeat(1000)));
        assert!(s.ends_with("...[truncated]"));
    }

    #[test]
    fn test_short_strings_pass_through() {
        let short = "y".repeat(999);
        let value = json!({ "body": short });
        let sanitized = sanitize(&value);
        assert_eq!(sanitized["body"].as_str().unwrap(), short);
    }

    #[test]
    fn test_caps_arrays_at_fifty_elements() {
        let numbers: Vec<i64> = (0..60).collect();
        let value = json!(numbers);
        let sanitized = sanitize(&value);
        let items = sanitized.as_array().unwrap();
        assert_eq!(items.len(), 50);
        assert_eq!(items[0], json!(0));
        assert_eq!(items[49], json!(49));
    }

    #[test]
    fn test_depth_limit_marker() {
        // Build a mapping nested 12 levels deep.
        let mut value = json!("leaf");
        for _ in 0..12 {
            value = json!({ "next": value });
        }
        let sanitized = sanitize(&value);

        // Descend 10 levels; the 11th must be the marker.
        let mut cursor = &sanitized;
        for _ in 0..10 {
            cursor = &cursor["next"];
            assert!(cursor.is_object() || cursor.is_string());
        }
        assert_eq!(cursor["next"], "[MAX_DEPTH]");
    }

    #[test]
    fn test_depth_limit_not_applied_early() {
        let mut value = json!("leaf");
        for _ in 0..10 {
            value = json!({ "next": value });
        }
        let sanitized = sanitize(&value);
        let mut cursor = &sanitized;
        for _ in 0..10 {
            cursor = &cursor["next"];
        }
        assert_eq!(*cursor, json!("leaf"));
    }

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(sanitize(&json!(null)), json!(null));
        assert_eq!(sanitize(&json!(true)), json!(true));
        assert_eq!(sanitize(&json!(42)), json!(42));
        assert_eq!(sanitize(&json!(2.5)), json!(2.5));
    }
}
