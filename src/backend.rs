use crate::adapter::{AdapterConfig, AdapterOptions};
use serde_json::Value;

/// Parse a DSN string into an [`AdapterConfig`], inferring the adapter
/// from its scheme.
///
/// Examples:
/// - "kafka://broker1:9092,broker2:9092/topic"
/// - "elasticsearch://127.0.0.1:9200/index"
/// - "opensearch://https://search.internal:9200/index"
/// - "file:///var/log/app-adapter"
pub fn parse_dsn(dsn: &str) -> Result<AdapterConfig, DsnError> {
    let dsn = dsn.trim();
    let (scheme, rest) = dsn.split_once("://").ok_or(DsnError::MissingScheme)?;
    let mut options = AdapterOptions::new();

    match scheme.to_ascii_lowercase().as_str() {
        "kafka" => {
            let (brokers, topic) = split_target(rest);
            let brokers: Vec<Value> = brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(|b| Value::String(b.to_string()))
                .collect();
            if !brokers.is_empty() {
                options.insert("brokers".to_string(), Value::Array(brokers));
            }
            if let Some(topic) = topic {
                options.insert("topic".to_string(), Value::String(topic.to_string()));
            }
            Ok(AdapterConfig::new("kafka", options))
        }
        "elasticsearch" | "opensearch" => {
            // Allow an explicit http(s) base nested inside the DSN.
            let (base, rest) = match rest.split_once("://") {
                Some((inner, r)) if inner.eq_ignore_ascii_case("http") || inner.eq_ignore_ascii_case("https") => {
                    (format!("{}://", inner), r)
                }
                _ => ("http://".to_string(), rest),
            };
            let (hosts, index) = split_target(rest);
            let hosts: Vec<Value> = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(|h| Value::String(format!("{}{}", base, h)))
                .collect();
            if !hosts.is_empty() {
                options.insert("hosts".to_string(), Value::Array(hosts));
            }
            if let Some(index) = index {
                options.insert("index".to_string(), Value::String(index.to_string()));
            }
            Ok(AdapterConfig::new("elasticsearch", options))
        }
        "file" => {
            if rest.is_empty() {
                return Err(DsnError::MissingPath);
            }
            options.insert("path".to_string(), Value::String(rest.to_string()));
            Ok(AdapterConfig::new("file", options))
        }
        "noop" => Ok(AdapterConfig::new("noop", options)),
        _ => Err(DsnError::UnknownScheme(scheme.to_string())),
    }
}

/// Split `hosts/target` at the first slash; an empty target is `None`.
fn split_target(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((hosts, target)) => {
            let target = target.trim_matches('/');
            (hosts, (!target.is_empty()).then_some(target))
        }
        None => (rest, None),
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("DSN has no scheme")]
    MissingScheme,

    #[error("unknown or unsupported DSN scheme: {0}")]
    UnknownScheme(String),

    #[error("file DSN has no path")]
    MissingPath,
}
