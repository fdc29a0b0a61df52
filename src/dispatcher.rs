use crate::adapter::{AdapterError, LogAdapter};
use crate::record::LogEntry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Duration;

/// How long one adapter may spend on one entry before it is abandoned.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fans entries out to a list of adapters without ever blocking or failing
/// the logging caller.
///
/// Each `dispatch` spawns one task per adapter, bounded by a timeout.
/// Results are only counted: an adapter that errors or stalls is never
/// retried and never reported back to the code that logged. Delivery is
/// at most once and best effort, and different adapters may see entries in
/// different orders.
///
/// Dispatch tasks are detached: dropping the dispatcher does not cancel
/// them, and each adapter is released once its last task finishes.
pub struct Dispatcher {
    adapters: RwLock<Vec<Arc<dyn LogAdapter>>>,
    in_flight: Arc<InFlight>,
    runtime: Option<Handle>,
    timeout: Duration,
    counters: Arc<Counters>,
}

/// Count of running dispatch tasks, with a wakeup when it reaches zero.
#[derive(Default)]
struct InFlight {
    running: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(self: &Arc<Self>) -> InFlightGuard {
        self.running.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.running.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of a [`Dispatcher`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Adapter `process` calls that returned `Ok`.
    pub delivered: u64,
    /// Adapter `process` calls that returned an error.
    pub failed: u64,
    /// Adapter `process` calls abandoned after the timeout.
    pub timed_out: u64,
    /// Entries not dispatched because no runtime was available.
    pub dropped: u64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new(DEFAULT_DISPATCH_TIMEOUT)
    }
}

impl Dispatcher {
    /// Create a dispatcher, capturing the current Tokio runtime if there is
    /// one so later dispatches work from plain threads too.
    pub fn new(timeout: Duration) -> Self {
        Dispatcher {
            adapters: RwLock::new(Vec::new()),
            in_flight: Arc::new(InFlight::default()),
            runtime: Handle::try_current().ok(),
            timeout,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn add_adapter(&self, adapter: Arc<dyn LogAdapter>) {
        self.adapters.write().push(adapter);
    }

    /// Remove the first adapter called `name` and hand it back, unclosed.
    pub fn remove_adapter(&self, name: &str) -> Option<Arc<dyn LogAdapter>> {
        let mut adapters = self.adapters.write();
        let pos = adapters.iter().position(|a| a.name() == name)?;
        Some(adapters.remove(pos))
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.read().iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            delivered: c.delivered.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// Hand a copy of `entry` to every adapter, each in its own task.
    /// Returns as soon as the tasks are spawned.
    pub fn dispatch(&self, entry: LogEntry) {
        let adapters = self.adapters.read();
        if adapters.is_empty() {
            return;
        }

        let Some(handle) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        for adapter in adapters.iter() {
            let adapter = Arc::clone(adapter);
            let entry = entry.clone();
            let counters = Arc::clone(&self.counters);
            let budget = self.timeout;
            let guard = self.in_flight.start();

            handle.spawn(async move {
                let _guard = guard;
                match tokio::time::timeout(budget, adapter.process(entry)).await {
                    Ok(Ok(())) => {
                        counters.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(adapter = adapter.name(), error = %e, "adapter rejected entry");
                    }
                    Err(_) => {
                        counters.timed_out.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(adapter = adapter.name(), ?budget, "adapter timed out, entry abandoned");
                    }
                }
            });
        }
    }

    /// Detach every adapter, wait for in-flight dispatches, then flush and
    /// close each one. All adapters are closed even if some fail; the first
    /// failure is returned.
    pub async fn close_all(&self) -> Result<(), AdapterError> {
        let adapters = std::mem::take(&mut *self.adapters.write());
        self.in_flight.wait_idle().await;

        let mut first_err = None;
        for adapter in adapters {
            let flushed = adapter.flush().await;
            let closed = adapter.close().await;
            if let Err(e) = flushed.and(closed) {
                tracing::warn!(adapter = adapter.name(), error = %e, "adapter failed to close cleanly");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
