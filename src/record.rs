use crate::level::Level;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extra named properties attached to a [`LogEntry`].
pub type Properties = BTreeMap<String, serde_json::Value>;

/// One emitted log line, as handed to every adapter.
///
/// Entries are built once per logging call and cloned into each adapter;
/// nothing mutates an entry after it has been dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: Level,
    pub time: DateTime<Local>,
    pub message: String,
    pub caller: Option<String>,
    pub node_id: Option<String>,
    pub module: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl LogEntry {
    pub fn new(level: Level, time: DateTime<Local>, message: impl Into<String>) -> Self {
        LogEntry {
            level,
            time,
            message: message.into(),
            caller: None,
            node_id: None,
            module: None,
            address: None,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
