use crate::adapter::{AdapterError, AdapterOptions, LogAdapter};
use crate::options;
use crate::record::LogEntry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

/// Upper bound on the buffer capacity reserved by `init`; larger batches
/// grow on demand.
const MAX_RESERVED: usize = 4096;

/// Thresholds controlling when a [`BatchAdapter`] flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Entry count that triggers an inline flush from `process`.
    pub batch_size: usize,
    /// Period of the background flush task.
    pub flush_interval: Duration,
    /// Upper bound on entries kept around after failed sends.
    pub max_buffered: usize,
}

impl BatchSettings {
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        BatchSettings {
            batch_size,
            flush_interval,
            max_buffered: batch_size.saturating_mul(10),
        }
    }

    // Enforce minimal thresholds to avoid degenerate configs.
    fn normalized(self) -> Self {
        let batch_size = self.batch_size.max(1);
        BatchSettings {
            batch_size,
            flush_interval: self.flush_interval.max(Duration::from_millis(10)),
            max_buffered: self.max_buffered.max(batch_size),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings::new(100, Duration::from_secs(5))
    }
}

/// The destination half of a batching adapter: one implementation per
/// remote system, wrapped by [`BatchAdapter`] for buffering.
#[async_trait]
pub trait BatchDestination: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Read destination options (with defaults) and connect. Returns the
    /// batching thresholds this destination was configured with.
    async fn configure(&mut self, options: &AdapterOptions) -> Result<BatchSettings, AdapterError>;

    /// Deliver one batch, in order. Only `Ok` lets the adapter drop the
    /// entries from its buffer.
    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), AdapterError>;

    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Snapshot of a [`BatchAdapter`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches_sent: u64,
    pub entries_sent: u64,
    pub send_failures: u64,
    pub entries_dropped: u64,
}

#[derive(Default)]
struct Counters {
    batches_sent: AtomicU64,
    entries_sent: AtomicU64,
    send_failures: AtomicU64,
    entries_dropped: AtomicU64,
}

/// Buffers entries in memory and hands them to a [`BatchDestination`] when
/// the buffer reaches the batch size or the flush interval elapses.
///
/// Size-triggered flushes run inline inside `process`; time-triggered ones
/// run on a single background task started by `init`. Both take the same
/// buffer lock and skip the destination entirely when there is nothing to
/// send.
///
/// Failed sends keep their entries for the next attempt, so a flaky
/// destination can see the same entry twice. The retained backlog is capped
/// at [`BatchSettings::max_buffered`]; beyond that the oldest entries are
/// dropped.
///
/// Dropping an adapter that was never closed spawns one last flush and
/// close on the current runtime, if there is one.
pub struct BatchAdapter<D: BatchDestination> {
    shared: Arc<Shared<D>>,
    ticker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

struct Shared<D> {
    destination: D,
    settings: BatchSettings,
    buffer: Mutex<Vec<LogEntry>>,
    counters: Counters,
    closed: AtomicBool,
}

impl<D: BatchDestination> BatchAdapter<D> {
    pub fn new(destination: D) -> Self {
        BatchAdapter {
            shared: Arc::new(Shared {
                destination,
                settings: BatchSettings::default(),
                buffer: Mutex::new(Vec::new()),
                counters: Counters::default(),
                closed: AtomicBool::new(false),
            }),
            ticker: parking_lot::Mutex::new(None),
        }
    }

    pub fn destination(&self) -> &D {
        &self.shared.destination
    }

    pub fn settings(&self) -> BatchSettings {
        self.shared.settings
    }

    /// Number of entries waiting for the next flush.
    pub async fn buffered(&self) -> usize {
        self.shared.buffer.lock().await.len()
    }

    pub fn stats(&self) -> BatchStats {
        let c = &self.shared.counters;
        BatchStats {
            batches_sent: c.batches_sent.load(Ordering::Relaxed),
            entries_sent: c.entries_sent.load(Ordering::Relaxed),
            send_failures: c.send_failures.load(Ordering::Relaxed),
            entries_dropped: c.entries_dropped.load(Ordering::Relaxed),
        }
    }
}

impl<D: BatchDestination> Shared<D> {
    async fn push(&self, entry: LogEntry) -> Result<(), AdapterError> {
        let mut buffer = self.buffer.lock().await;
        buffer.push(entry);
        if buffer.len() >= self.settings.batch_size {
            self.drain(&mut buffer).await
        } else {
            Ok(())
        }
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        let mut buffer = self.buffer.lock().await;
        self.drain(&mut buffer).await
    }

    async fn drain(&self, buffer: &mut Vec<LogEntry>) -> Result<(), AdapterError> {
        if buffer.is_empty() {
            return Ok(());
        }

        match self.destination.send_batch(buffer).await {
            Ok(()) => {
                self.counters.batches_sent.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .entries_sent
                    .fetch_add(buffer.len() as u64, Ordering::Relaxed);
                buffer.clear();
                Ok(())
            }
            Err(e) => {
                self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
                self.trim_backlog(buffer);
                Err(e)
            }
        }
    }

    async fn shutdown(&self) -> Result<(), AdapterError> {
        self.closed.store(true, Ordering::SeqCst);
        let flushed = self.flush().await;
        let closed = self.destination.close().await;
        flushed.and(closed)
    }

    fn trim_backlog(&self, buffer: &mut Vec<LogEntry>) {
        let max = self.settings.max_buffered;
        if buffer.len() <= max {
            return;
        }
        let excess = buffer.len() - max;
        buffer.drain(..excess);
        self.counters
            .entries_dropped
            .fetch_add(excess as u64, Ordering::Relaxed);
        tracing::warn!(
            adapter = self.destination.name(),
            dropped = excess,
            kept = max,
            "batch backlog full, dropping oldest entries"
        );
    }
}

fn spawn_periodic_flush<D: BatchDestination>(shared: Weak<Shared<D>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if let Err(e) = shared.flush().await {
                tracing::warn!(adapter = shared.destination.name(), error = %e, "periodic flush failed");
            }
        }
    })
}

#[async_trait]
impl<D: BatchDestination> LogAdapter for BatchAdapter<D> {
    fn name(&self) -> &str {
        self.shared.destination.name()
    }

    async fn init(&mut self, options: &AdapterOptions) -> Result<(), AdapterError> {
        let name = self.shared.destination.name();
        // Unique until the periodic task holds its weak reference.
        let shared = Arc::get_mut(&mut self.shared).ok_or(AdapterError::AlreadyInitialized(name))?;

        let settings = shared.destination.configure(options).await?;
        let max_buffered = options::count_or(options, "max_buffered", settings.max_buffered);
        shared.settings = BatchSettings {
            max_buffered,
            ..settings
        }
        .normalized();
        shared
            .buffer
            .get_mut()
            .reserve(shared.settings.batch_size.min(MAX_RESERVED));

        let period = shared.settings.flush_interval;
        tracing::debug!(
            adapter = name,
            batch_size = shared.settings.batch_size,
            flush_interval = ?period,
            "adapter initialized"
        );

        let handle = spawn_periodic_flush(Arc::downgrade(&self.shared), period);
        *self.ticker.lock() = Some(handle);
        Ok(())
    }

    async fn process(&self, entry: LogEntry) -> Result<(), AdapterError> {
        self.shared.push(entry).await
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        self.shared.flush().await
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        self.shared.shutdown().await
    }
}

impl<D: BatchDestination> Drop for BatchAdapter<D> {
    fn drop(&mut self) {
        let Some(handle) = self.ticker.get_mut().take() else {
            return;
        };
        handle.abort();

        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        match Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.shared);
                runtime.spawn(async move {
                    if let Err(e) = shared.shutdown().await {
                        tracing::warn!(adapter = shared.destination.name(), error = %e, "final flush of dropped adapter failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    adapter = self.shared.destination.name(),
                    "adapter dropped outside a runtime without close, buffered entries lost"
                );
            }
        }
    }
}
