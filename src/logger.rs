use crate::adapter::{AdapterError, LogAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::LoggerConfig;
use crate::dispatcher::Dispatcher;
use crate::layer::Origin;
use crate::level::Level;
use crate::record::{LogEntry, Properties};
use crate::registry::AdapterRegistry;
use crate::rotator::{RotateError, RotatingFileSink};
use std::fmt::Display;
use std::panic::Location;
use std::sync::Arc;
use tracing::{Dispatch, Span};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Target of every line a [`Logger`] encodes.
pub const EVENT_TARGET: &str = "fanout";

#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("create log rotator failed: {0}")]
    Rotator(#[from] RotateError),

    #[error("init adapter {name} failed: {source}")]
    AdapterInit { name: String, source: AdapterError },

    #[error("close adapters failed: {0}")]
    Close(#[source] AdapterError),
}

/// Leveled logger writing encoded lines to the console and/or a
/// [`RotatingFileSink`], and fanning each entry out to its adapters.
///
/// Every logging call builds one [`LogEntry`]. The entry is encoded
/// synchronously (text on stdout, JSON in the file tree) and then handed
/// to the [`Dispatcher`], which never blocks or fails the caller.
///
/// Call [`Logger::close`] for an orderly shutdown. A logger that is just
/// dropped still lets dispatched entries reach their adapters, which then
/// flush once in the background.
pub struct Logger {
    dispatch: Dispatch,
    span: Span,
    dispatcher: Arc<Dispatcher>,
    file: Option<RotatingFileSink>,
    level: Level,
    origin: Origin,
    clock: Arc<dyn Clock>,
    noop: bool,
}

impl Logger {
    /// Build a logger and its adapters from `config`, looking adapters up
    /// in `registry`. Unknown adapter names are skipped; an adapter that
    /// fails to initialize fails the whole construction.
    pub async fn new(config: LoggerConfig, registry: &AdapterRegistry) -> Result<Logger, LoggerError> {
        Self::with_clock(config, registry, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        config: LoggerConfig,
        registry: &AdapterRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Logger, LoggerError> {
        let logger = Self::local(&config, clock)?;

        for cfg in &config.adapters {
            let Some(mut adapter) = registry.get(&cfg.name) else {
                tracing::warn!(adapter = %cfg.name, "no adapter registered under this name, skipping");
                continue;
            };
            adapter
                .init(&cfg.options)
                .await
                .map_err(|source| LoggerError::AdapterInit {
                    name: cfg.name.clone(),
                    source,
                })?;
            logger.dispatcher.add_adapter(Arc::from(adapter));
        }

        Ok(logger)
    }

    /// Console-only logger without adapters. Usable outside a runtime.
    pub fn console(level: Level) -> Result<Logger, LoggerError> {
        let config = LoggerConfig::default().with_level(level).with_terminal_output();
        Self::local(&config, Arc::new(SystemClock))
    }

    /// A degraded logger that discards everything, including `panic`.
    pub fn noop() -> Logger {
        Logger {
            dispatch: Dispatch::none(),
            span: Span::none(),
            dispatcher: Arc::new(Dispatcher::default()),
            file: None,
            level: Level::Panic,
            origin: Origin::default(),
            clock: Arc::new(SystemClock),
            noop: true,
        }
    }

    fn local(config: &LoggerConfig, clock: Arc<dyn Clock>) -> Result<Logger, LoggerError> {
        let file = match (&config.path, config.output.wants_file()) {
            (Some(path), true) => Some(RotatingFileSink::with_clock(path, Arc::clone(&clock))?),
            _ => None,
        };
        // With no usable file output, fall back to the console.
        let terminal = config.output.wants_terminal() || file.is_none();

        let console_layer = terminal.then(|| {
            fmt::layer()
                .with_timer(ClockTimer(Arc::clone(&clock)))
                .with_writer(std::io::stdout)
                .with_target(false)
        });
        let file_layer = file.clone().map(|sink| {
            fmt::layer()
                .json()
                .with_timer(ClockTimer(Arc::clone(&clock)))
                .with_current_span(true)
                .with_span_list(false)
                .with_target(false)
                .with_writer(sink)
        });

        let subscriber = Registry::default()
            .with(LevelFilter::from_level(config.level.to_tracing()))
            .with(console_layer)
            .with(file_layer);
        let dispatch = Dispatch::new(subscriber);

        let origin = Origin {
            node_id: config.node_id.clone(),
            module: config.module.clone(),
            address: config.address.clone(),
        };
        let span = identity_span(&dispatch, &origin);

        Ok(Logger {
            dispatch,
            span,
            dispatcher: Arc::new(Dispatcher::new(config.dispatch_timeout)),
            file,
            level: config.level,
            origin,
            clock,
            noop: false,
        })
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn file_sink(&self) -> Option<&RotatingFileSink> {
        self.file.as_ref()
    }

    pub fn add_adapter(&self, adapter: Arc<dyn LogAdapter>) {
        self.dispatcher.add_adapter(adapter);
    }

    pub fn remove_adapter(&self, name: &str) -> Option<Arc<dyn LogAdapter>> {
        self.dispatcher.remove_adapter(name)
    }

    /// Log `message` with extra `properties` at `level`.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Display, properties: Properties) {
        if self.noop || level < self.level {
            return;
        }

        let location = Location::caller();
        let entry = LogEntry {
            level,
            time: self.clock.now(),
            message: message.to_string(),
            caller: Some(format!("{}:{}", location.file(), location.line())),
            node_id: self.origin.node_id.clone(),
            module: self.origin.module.clone(),
            address: self.origin.address.clone(),
            properties,
        };

        self.encode(&entry);
        self.dispatcher.dispatch(entry);
    }

    fn encode(&self, entry: &LogEntry) {
        let caller = entry.caller.as_deref().unwrap_or_default();
        let message = entry.message.as_str();
        let props = (!entry.properties.is_empty()).then(|| {
            serde_json::Value::Object(
                entry
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        });

        macro_rules! emit {
            ($lvl:expr) => {
                match &props {
                    Some(props) => tracing::event!(
                        target: EVENT_TARGET,
                        $lvl,
                        caller,
                        properties = %props,
                        "{}",
                        message
                    ),
                    None => tracing::event!(target: EVENT_TARGET, $lvl, caller, "{}", message),
                }
            };
        }

        tracing::dispatcher::with_default(&self.dispatch, || {
            self.span.in_scope(|| match entry.level {
                Level::Debug => emit!(tracing::Level::DEBUG),
                Level::Info => emit!(tracing::Level::INFO),
                Level::Warn => emit!(tracing::Level::WARN),
                Level::Error | Level::Panic => emit!(tracing::Level::ERROR),
            })
        });
    }

    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message, Properties::new());
    }

    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message, Properties::new());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message, Properties::new());
    }

    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message, Properties::new());
    }

    /// Log at [`Level::Panic`], then panic with the message. The no-op
    /// logger returns instead.
    #[track_caller]
    pub fn panic(&self, message: impl Display) {
        if self.noop {
            return;
        }
        let message = message.to_string();
        self.log(Level::Panic, &message, Properties::new());
        panic!("{}", message);
    }

    /// Force file output to disk.
    pub fn sync(&self) -> Result<(), RotateError> {
        match &self.file {
            Some(file) => file.sync_to_disk(),
            None => Ok(()),
        }
    }

    /// Flush and close every adapter, then close the file sink. Both are
    /// attempted even if the first fails.
    pub async fn close(&self) -> Result<(), LoggerError> {
        let adapters = self.dispatcher.close_all().await;
        let file = match &self.file {
            Some(file) => file.close(),
            None => Ok(()),
        };
        adapters.map_err(LoggerError::Close)?;
        file?;
        Ok(())
    }
}

/// Timestamps encoded lines with the logger's clock.
struct ClockTimer(Arc<dyn Clock>);

impl FormatTime for ClockTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        use std::fmt::Write as _;
        write!(w, "{}", self.0.now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false))
    }
}

fn identity_span(dispatch: &Dispatch, origin: &Origin) -> Span {
    tracing::dispatcher::with_default(dispatch, || {
        // ERROR so the span survives any level filter.
        let span = tracing::span!(
            target: EVENT_TARGET,
            tracing::Level::ERROR,
            "logger",
            node_id = tracing::field::Empty,
            module = tracing::field::Empty,
            address = tracing::field::Empty,
        );
        if let Some(node_id) = &origin.node_id {
            span.record("node_id", node_id.as_str());
        }
        if let Some(module) = &origin.module {
            span.record("module", module.as_str());
        }
        if let Some(address) = &origin.address {
            span.record("address", address.as_str());
        }
        span
    })
}
