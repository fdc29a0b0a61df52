//! Environment variable names read by [`LoggerConfig::from_env`].
//!
//! These are purely helpers; loggers themselves never touch the
//! environment.
//!
//! [`LoggerConfig::from_env`]: crate::config::LoggerConfig::from_env

/// Minimum level: `debug`, `info`, `warn`, `error` or `panic`.
pub const LOG_FANOUT_LEVEL_ENV: &str = "LOG_FANOUT_LEVEL";

/// Root of the rotating file tree; empty disables file output.
pub const LOG_FANOUT_PATH_ENV: &str = "LOG_FANOUT_PATH";

/// Node id stamped on every entry.
pub const LOG_FANOUT_NODE_ID_ENV: &str = "LOG_FANOUT_NODE_ID";

/// Module name stamped on every entry.
pub const LOG_FANOUT_MODULE_ENV: &str = "LOG_FANOUT_MODULE";

/// Network address stamped on every entry.
pub const LOG_FANOUT_ADDRESS_ENV: &str = "LOG_FANOUT_ADDRESS";

/// `file`, `terminal` or `both`.
pub const LOG_FANOUT_OUTPUT_ENV: &str = "LOG_FANOUT_OUTPUT";

/// Semicolon-separated adapter DSNs, e.g.
/// `kafka://b1:9092,b2:9092/logs;elasticsearch://localhost:9200/app`.
pub const LOG_FANOUT_ADAPTERS_ENV: &str = "LOG_FANOUT_ADAPTERS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and blank the same.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_unset() {
        std::env::set_var("LOG_FANOUT_TEST_BLANK", "  ");
        assert_eq!(env_non_empty("LOG_FANOUT_TEST_BLANK"), None);
        assert_eq!(env_or("LOG_FANOUT_TEST_UNSET", "info"), "info");

        std::env::set_var("LOG_FANOUT_TEST_SET", "debug");
        assert_eq!(env_non_empty("LOG_FANOUT_TEST_SET").as_deref(), Some("debug"));
    }
}
