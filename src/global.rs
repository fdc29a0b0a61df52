//! Process-wide default logger.
//!
//! Until [`init`] or [`set_default`] runs, the free functions log through
//! a console logger at [`Level::Info`].

use crate::config::LoggerConfig;
use crate::level::Level;
use crate::logger::{Logger, LoggerError};
use crate::record::Properties;
use crate::registry::AdapterRegistry;
use parking_lot::RwLock;
use std::fmt::Display;
use std::sync::Arc;

static DEFAULT: RwLock<Option<Arc<Logger>>> = parking_lot::const_rwlock(None);

/// Build a logger from `config` using [`AdapterRegistry::global`] and
/// install it as the default. The replaced default is closed, so its
/// buffered entries are flushed before this returns.
pub async fn init(config: LoggerConfig) -> Result<(), LoggerError> {
    let logger = Logger::new(config, AdapterRegistry::global()).await?;
    if let Some(previous) = set_default(logger) {
        if let Err(e) = previous.close().await {
            tracing::warn!(error = %e, "closing replaced default logger failed");
        }
    }
    Ok(())
}

/// Install `logger` as the default, returning the previous one so the
/// caller can close it.
pub fn set_default(logger: Logger) -> Option<Arc<Logger>> {
    DEFAULT.write().replace(Arc::new(logger))
}

pub fn default_logger() -> Arc<Logger> {
    if let Some(logger) = DEFAULT.read().as_ref() {
        return Arc::clone(logger);
    }

    let mut slot = DEFAULT.write();
    if let Some(logger) = slot.as_ref() {
        return Arc::clone(logger);
    }
    let logger = Arc::new(Logger::console(Level::Info).unwrap_or_else(|_| Logger::noop()));
    *slot = Some(Arc::clone(&logger));
    logger
}

#[track_caller]
pub fn log(level: Level, message: impl Display, properties: Properties) {
    default_logger().log(level, message, properties);
}

#[track_caller]
pub fn debug(message: impl Display) {
    default_logger().debug(message);
}

#[track_caller]
pub fn info(message: impl Display) {
    default_logger().info(message);
}

#[track_caller]
pub fn warn(message: impl Display) {
    default_logger().warn(message);
}

#[track_caller]
pub fn error(message: impl Display) {
    default_logger().error(message);
}

#[track_caller]
pub fn panic(message: impl Display) {
    default_logger().panic(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop_sink::NoopAdapter;
    use crate::adapter::LogAdapter;

    #[tokio::test]
    async fn free_functions_use_the_installed_default() {
        let before = default_logger();
        assert_eq!(before.level(), Level::Info);

        let logger = Logger::console(Level::Debug).unwrap();
        let noop = Arc::new(NoopAdapter::default());
        logger.add_adapter(noop.clone());
        set_default(logger);

        debug("one");
        info("two");
        log(Level::Warn, "three", Properties::new());
        let current = default_logger();
        current.close().await.unwrap();

        assert_eq!(noop.processed(), 3);
        assert!(!Arc::ptr_eq(&before, &current));

        let batches = crate::memory::MemoryBatches::default();
        let replaced = Logger::console(Level::Info).unwrap();
        let mut adapter = batches.adapter();
        adapter.init(&crate::adapter::AdapterOptions::new()).await.unwrap();
        replaced.add_adapter(Arc::new(adapter));
        set_default(replaced);
        info("buffered in the replaced logger");

        init(LoggerConfig::default()).await.unwrap();
        assert_eq!(batches.entries().len(), 1);
        assert!(batches.is_closed());
    }
}
