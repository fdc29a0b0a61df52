//! Leveled structured logging into a daily-rotating file tree, with
//! batched fire-and-forget fan-out to pluggable adapters.

pub mod level;
pub mod record;
pub mod clock;
pub mod rotator;

pub mod adapter;
pub mod options;
pub mod batch;
pub mod memory;
pub mod kafka;
pub mod elasticsearch;
pub mod file_batch;
pub mod noop_sink;

pub mod registry;
pub mod dispatcher;
pub mod layer;

pub mod backend;
pub mod env;
pub mod config;

pub mod logger;
pub mod global;
pub mod init;

pub use adapter::{AdapterConfig, AdapterError, AdapterOptions, LogAdapter};
pub use config::{LoggerConfig, OutputTarget};
pub use level::Level;
pub use logger::{Logger, LoggerError};
pub use record::{LogEntry, Properties};
pub use registry::AdapterRegistry;
