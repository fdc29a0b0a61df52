use crate::adapter::{AdapterError, AdapterOptions};
use crate::batch::{BatchAdapter, BatchDestination, BatchSettings};
use crate::options;
use crate::record::LogEntry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Batching adapter that keeps every delivered batch in memory.
pub type MemoryAdapter = BatchAdapter<MemoryDestination>;

/// Shared view of what a [`MemoryDestination`] received.
///
/// Useful for tests and for embedding the logger in a process that wants
/// to inspect its own output. Clones observe the same batches.
#[derive(Clone, Default)]
pub struct MemoryBatches {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    batches: Mutex<Vec<Vec<LogEntry>>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemoryBatches {
    /// A fresh, uninitialized adapter delivering into these batches.
    pub fn adapter(&self) -> MemoryAdapter {
        BatchAdapter::new(MemoryDestination { batches: self.clone() })
    }

    pub fn batches(&self) -> Vec<Vec<LogEntry>> {
        self.inner.batches.lock().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner.batches.lock().iter().map(Vec::len).collect()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.batches.lock().iter().flatten().cloned().collect()
    }

    /// Make subsequent sends fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

pub struct MemoryDestination {
    batches: MemoryBatches,
}

#[async_trait]
impl BatchDestination for MemoryDestination {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn configure(&mut self, options: &AdapterOptions) -> Result<BatchSettings, AdapterError> {
        Ok(BatchSettings::new(
            options::count_or(options, "batch_size", 100),
            options::seconds_or(options, "flush_interval", Duration::from_secs(5)),
        ))
    }

    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), AdapterError> {
        if self.batches.inner.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Send {
                adapter: self.name().to_string(),
                count: batch.len(),
                source: "memory destination set to fail".into(),
            });
        }
        self.batches.inner.batches.lock().push(batch.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.batches.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
