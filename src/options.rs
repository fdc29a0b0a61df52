//! Lenient readers for [`AdapterOptions`]. A missing or wrong-typed value
//! never fails; it falls back to the supplied default and leaves a debug
//! diagnostic behind.

use crate::adapter::AdapterOptions;
use serde_json::Value;
use std::time::Duration;

/// Largest count accepted from options; anything above is treated as
/// malformed.
pub const MAX_COUNT: usize = 10_000_000;

fn ignored(key: &str, value: &Value, expected: &str) {
    tracing::debug!(option = key, ?value, expected, "ignoring malformed adapter option");
}

pub fn string(options: &AdapterOptions, key: &str) -> Option<String> {
    match options.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => {
            ignored(key, other, "string");
            None
        }
    }
}

pub fn string_or(options: &AdapterOptions, key: &str, default: &str) -> String {
    string(options, key).unwrap_or_else(|| default.to_string())
}

/// A list of strings. A single string is accepted as a one-element list;
/// non-string items are skipped. An empty result yields the default.
pub fn string_list_or(options: &AdapterOptions, key: &str, default: &[&str]) -> Vec<String> {
    let list = match options.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    ignored(key, other, "string list item");
                    None
                }
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(other) => {
            ignored(key, other, "string list");
            Vec::new()
        }
        None => Vec::new(),
    };

    if list.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        list
    }
}

/// A non-negative count up to [`MAX_COUNT`]. Floats are truncated, as JSON
/// configs often carry every number as a float.
pub fn count_or(options: &AdapterOptions, key: &str, default: usize) -> usize {
    match options.get(key) {
        Some(Value::Number(n)) => match n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && *f <= MAX_COUNT as f64).map(|f| f as u64))
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v <= MAX_COUNT)
        {
            Some(v) => v,
            None => {
                ignored(key, &Value::Number(n.clone()), "non-negative number");
                default
            }
        },
        Some(other) => {
            ignored(key, other, "number");
            default
        }
        None => default,
    }
}

/// A duration given in (possibly fractional) seconds.
pub fn seconds_or(options: &AdapterOptions, key: &str, default: Duration) -> Duration {
    match options.get(key) {
        Some(Value::Number(n)) => match n.as_f64().and_then(|f| Duration::try_from_secs_f64(f).ok()) {
            Some(secs) => secs,
            None => {
                ignored(key, &Value::Number(n.clone()), "non-negative seconds");
                default
            }
        },
        Some(other) => {
            ignored(key, other, "seconds");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(v: Value) -> AdapterOptions {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn wrong_types_fall_back_to_defaults() {
        let o = opts(json!({
            "hosts": 42,
            "topic": ["x"],
            "batch_size": "lots",
            "flush_interval": -1.0,
        }));
        assert_eq!(string_list_or(&o, "hosts", &["localhost:9092"]), vec!["localhost:9092"]);
        assert_eq!(string_or(&o, "topic", "logs"), "logs");
        assert_eq!(count_or(&o, "batch_size", 100), 100);
        assert_eq!(seconds_or(&o, "flush_interval", Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn floats_and_fractions_are_accepted() {
        let o = opts(json!({ "batch_size": 500.0, "flush_interval": 0.1, "hosts": ["a", 1, "b"] }));
        assert_eq!(count_or(&o, "batch_size", 1), 500);
        assert_eq!(seconds_or(&o, "flush_interval", Duration::ZERO), Duration::from_millis(100));
        assert_eq!(string_list_or(&o, "hosts", &[]), vec!["a", "b"]);
    }

    #[test]
    fn out_of_range_numbers_fall_back_to_defaults() {
        let o = opts(json!({
            "batch_size": 1e20,
            "bulk_size": 18446744073709551615u64,
            "max_buffered": MAX_COUNT + 1,
            "flush_interval": 1e20,
        }));
        assert_eq!(count_or(&o, "batch_size", 100), 100);
        assert_eq!(count_or(&o, "bulk_size", 200), 200);
        assert_eq!(count_or(&o, "max_buffered", 1000), 1000);
        assert_eq!(seconds_or(&o, "flush_interval", Duration::from_secs(5)), Duration::from_secs(5));

        let o = opts(json!({ "batch_size": MAX_COUNT }));
        assert_eq!(count_or(&o, "batch_size", 100), MAX_COUNT);
    }
}
