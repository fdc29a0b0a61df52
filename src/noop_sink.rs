use crate::adapter::{AdapterError, AdapterOptions, LogAdapter};
use crate::record::LogEntry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// An adapter that simply drops all entries.
///
/// Useful for measuring the overhead of dispatch itself without any
/// external I/O, and for tests that don't care about delivery.
#[derive(Default)]
pub struct NoopAdapter {
    processed: AtomicU64,
}

impl NoopAdapter {
    /// Entries seen so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogAdapter for NoopAdapter {
    fn name(&self) -> &str {
        "noop"
    }

    async fn init(&mut self, _options: &AdapterOptions) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn process(&self, _entry: LogEntry) -> Result<(), AdapterError> {
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}
