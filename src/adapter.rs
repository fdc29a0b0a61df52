use crate::record::LogEntry;
use crate::rotator::RotateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// Untyped options handed to [`LogAdapter::init`].
pub type AdapterOptions = serde_json::Map<String, serde_json::Value>;

/// Selects a registered adapter by name and carries its options.
///
/// Consumed once while the owning logger is built; adapters do not keep a
/// reference to it after `init` returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub name: String,
    #[serde(default)]
    pub options: AdapterOptions,
}

impl AdapterConfig {
    pub fn new(name: impl Into<String>, options: AdapterOptions) -> Self {
        AdapterConfig {
            name: name.into(),
            options,
        }
    }

    /// Build from a JSON object literal; non-object values yield no options.
    pub fn from_json(name: impl Into<String>, options: serde_json::Value) -> Self {
        let options = match options {
            serde_json::Value::Object(map) => map,
            _ => AdapterOptions::new(),
        };
        Self::new(name, options)
    }
}

/// Error returned by [`LogAdapter`] operations.
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    #[error("adapter {0} was already initialized")]
    AlreadyInitialized(&'static str),

    #[error("adapter {adapter} failed to connect: {reason}")]
    Connect { adapter: String, reason: String },

    #[error("adapter {adapter} failed to send batch of {count}: {source}")]
    Send {
        adapter: String,
        count: usize,
        source: Box<dyn Error + Send + Sync>,
    },

    #[error("adapter {adapter} failed to close: {source}")]
    Close {
        adapter: String,
        source: Box<dyn Error + Send + Sync>,
    },

    #[error(transparent)]
    File(#[from] RotateError),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// A remote (or otherwise out-of-process) destination for log entries.
///
/// Implementations are owned by a [`Dispatcher`](crate::dispatcher::Dispatcher)
/// behind an `Arc`, so every method except `init` takes `&self` and must be
/// safe to call from many tasks at once.
#[async_trait]
pub trait LogAdapter: Send + Sync {
    /// Stable identity, e.g. `"kafka"`.
    fn name(&self) -> &str;

    /// Parse options and connect. Malformed options fall back to defaults;
    /// only a destination that cannot be reached fails here.
    async fn init(&mut self, options: &AdapterOptions) -> Result<(), AdapterError>;

    /// Accept one entry. May flush inline when a batch fills up.
    async fn process(&self, entry: LogEntry) -> Result<(), AdapterError>;

    /// Send everything currently buffered.
    async fn flush(&self) -> Result<(), AdapterError>;

    /// Final flush, then release destination resources.
    async fn close(&self) -> Result<(), AdapterError>;
}
