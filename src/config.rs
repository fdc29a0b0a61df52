use crate::adapter::{AdapterConfig, AdapterOptions};
use crate::backend::parse_dsn;
use crate::dispatcher::DEFAULT_DISPATCH_TIMEOUT;
use crate::env::{self, env_non_empty};
use crate::level::Level;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where encoded lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    /// Only the rotating file tree.
    File,
    /// Only stdout.
    #[default]
    Terminal,
    Both,
}

impl OutputTarget {
    pub fn parse_lenient(s: &str) -> OutputTarget {
        s.parse().unwrap_or_default()
    }

    pub fn wants_terminal(self) -> bool {
        matches!(self, OutputTarget::Terminal | OutputTarget::Both)
    }

    pub fn wants_file(self) -> bool {
        matches!(self, OutputTarget::File | OutputTarget::Both)
    }
}

impl FromStr for OutputTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(OutputTarget::File),
            "terminal" | "console" | "stdout" => Ok(OutputTarget::Terminal),
            "both" => Ok(OutputTarget::Both),
            other => Err(format!("unknown output target: {other}")),
        }
    }
}

/// Configuration of one [`Logger`](crate::logger::Logger).
///
/// **Fields**
/// - `level`: entries below this level are discarded everywhere.
/// - `path`: root of the `<root>/YYYY-MM/MM-DD.log` tree; file output is
///   skipped when unset.
/// - `node_id`, `module`, `address`: identity stamped on every entry.
/// - `output`: console, file or both.
/// - `adapters`: adapters built by name from a registry.
/// - `dispatch_timeout`: budget for one adapter to accept one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    #[serde(deserialize_with = "lenient_level")]
    pub level: Level,
    pub path: Option<PathBuf>,
    pub node_id: Option<String>,
    pub module: Option<String>,
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient_output")]
    pub output: OutputTarget,
    pub adapters: Vec<AdapterConfig>,
    #[serde(with = "seconds")]
    pub dispatch_timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: Level::Info,
            path: None,
            node_id: None,
            module: Some("default".to_string()),
            address: None,
            output: OutputTarget::default(),
            adapters: Vec::new(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by whatever `LOG_FANOUT_*` variables are set.
    pub fn from_env() -> Self {
        let mut cfg = LoggerConfig::default();

        if let Some(level) = env_non_empty(env::LOG_FANOUT_LEVEL_ENV) {
            cfg.level = Level::parse_lenient(&level);
        }
        cfg.path = env_non_empty(env::LOG_FANOUT_PATH_ENV).map(PathBuf::from);
        cfg.node_id = env_non_empty(env::LOG_FANOUT_NODE_ID_ENV);
        if let Some(module) = env_non_empty(env::LOG_FANOUT_MODULE_ENV) {
            cfg.module = Some(module);
        }
        cfg.address = env_non_empty(env::LOG_FANOUT_ADDRESS_ENV);
        if let Some(output) = env_non_empty(env::LOG_FANOUT_OUTPUT_ENV) {
            cfg.output = OutputTarget::parse_lenient(&output);
        }
        if let Some(dsns) = env_non_empty(env::LOG_FANOUT_ADAPTERS_ENV) {
            cfg.adapters = parse_dsn_list(&dsns);
        }
        cfg
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn with_file_output(self) -> Self {
        self.with_output(OutputTarget::File)
    }

    pub fn with_terminal_output(self) -> Self {
        self.with_output(OutputTarget::Terminal)
    }

    pub fn with_both_output(self) -> Self {
        self.with_output(OutputTarget::Both)
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_adapter(mut self, name: impl Into<String>, options: AdapterOptions) -> Self {
        self.adapters.push(AdapterConfig::new(name, options));
        self
    }

    pub fn with_kafka_adapter(self, options: AdapterOptions) -> Self {
        self.with_adapter("kafka", options)
    }

    pub fn with_elasticsearch_adapter(self, options: AdapterOptions) -> Self {
        self.with_adapter("elasticsearch", options)
    }
}

/// Parse `;`-separated DSNs, skipping the ones that don't parse.
pub fn parse_dsn_list(list: &str) -> Vec<AdapterConfig> {
    list.split(';')
        .map(str::trim)
        .filter(|dsn| !dsn.is_empty())
        .filter_map(|dsn| match parse_dsn(dsn) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(%dsn, error = %e, "skipping adapter DSN");
                None
            }
        })
        .collect()
}

fn lenient_level<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
    let s = String::deserialize(d)?;
    Ok(Level::parse_lenient(&s))
}

fn lenient_output<'de, D: Deserializer<'de>>(d: D) -> Result<OutputTarget, D::Error> {
    let s = String::deserialize(d)?;
    Ok(OutputTarget::parse_lenient(&s))
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("duration must be non-negative seconds within range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_terminal_info() {
        let cfg = LoggerConfig::default();
        assert_eq!(cfg.level, Level::Info);
        assert_eq!(cfg.output, OutputTarget::Terminal);
        assert_eq!(cfg.module.as_deref(), Some("default"));
        assert!(cfg.path.is_none());
    }

    #[test]
    fn builder_chain_sets_fields() {
        let cfg = LoggerConfig::default()
            .with_level(Level::Debug)
            .with_path("./logs")
            .with_node_id("node-001")
            .with_module("api-server")
            .with_address("192.168.1.10")
            .with_both_output()
            .with_kafka_adapter(AdapterOptions::new());

        assert_eq!(cfg.level, Level::Debug);
        assert_eq!(cfg.path, Some(PathBuf::from("./logs")));
        assert_eq!(cfg.output, OutputTarget::Both);
        assert_eq!(cfg.adapters[0].name, "kafka");
    }

    #[test]
    fn deserializes_leniently() {
        let cfg: LoggerConfig = serde_json::from_value(json!({
            "level": "loud",
            "output": "both",
            "path": "/tmp/logs",
            "dispatch_timeout": 0.5,
            "adapters": [{ "name": "elasticsearch", "options": { "bulk_size": 10 } }],
        }))
        .unwrap();

        assert_eq!(cfg.level, Level::Info);
        assert_eq!(cfg.output, OutputTarget::Both);
        assert_eq!(cfg.dispatch_timeout, Duration::from_millis(500));
        assert_eq!(cfg.adapters[0].options["bulk_size"], 10);
        assert_eq!(cfg.module.as_deref(), Some("default"));
    }

    #[test]
    fn oversized_dispatch_timeout_is_an_error() {
        let res: Result<LoggerConfig, _> = serde_json::from_value(json!({ "dispatch_timeout": 1e20 }));
        assert!(res.is_err());
        let res: Result<LoggerConfig, _> = serde_json::from_value(json!({ "dispatch_timeout": -1.0 }));
        assert!(res.is_err());
    }

    #[test]
    fn dsn_list_skips_bad_entries() {
        let adapters = parse_dsn_list("kafka://a:9092,b:9092/logs; bogus ;file:///tmp/x");
        let names: Vec<_> = adapters.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["kafka", "file"]);
    }
}
