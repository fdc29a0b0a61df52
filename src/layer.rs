use crate::clock::{Clock, SystemClock};
use crate::dispatcher::Dispatcher;
use crate::level::Level;
use crate::record::{LogEntry, Properties};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Identity stamped on every entry produced by an [`AdapterLayer`].
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub node_id: Option<String>,
    pub module: Option<String>,
    pub address: Option<String>,
}

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogEntry`] values and hands them to a [`Dispatcher`].
///
/// Events below `min_level` are ignored, as are events emitted by this
/// crate itself so adapter diagnostics never loop back into the adapters.
pub struct AdapterLayer {
    dispatcher: Arc<Dispatcher>,
    min_level: Level,
    origin: Origin,
    clock: Arc<dyn Clock>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events converted and dispatched.
    pub dispatched_events: Arc<AtomicU64>,
}

impl AdapterLayer {
    pub fn new(dispatcher: Arc<Dispatcher>, min_level: Level, origin: Origin) -> Self {
        AdapterLayer {
            dispatcher,
            min_level,
            origin,
            clock: Arc::new(SystemClock),
            total_events: Arc::new(AtomicU64::new(0)),
            dispatched_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

fn is_internal(target: &str) -> bool {
    target == env!("CARGO_CRATE_NAME") || target.starts_with(concat!(env!("CARGO_CRATE_NAME"), "::"))
}

impl<S> Layer<S> for AdapterLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let level = Level::from_tracing(meta.level());
        if level < self.min_level || is_internal(meta.target()) {
            return;
        }

        let mut properties = Properties::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut properties,
            message: &mut message,
        };
        event.record(&mut visitor);

        let caller = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.to_string()),
            _ => None,
        };

        let entry = LogEntry {
            level,
            time: self.clock.now(),
            message: message.unwrap_or_default(),
            caller,
            node_id: self.origin.node_id.clone(),
            module: self
                .origin
                .module
                .clone()
                .or_else(|| meta.module_path().map(|s| s.to_string())),
            address: self.origin.address.clone(),
            properties,
        };

        self.dispatcher.dispatch(entry);
        self.dispatched_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Properties,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
