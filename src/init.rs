use crate::dispatcher::Dispatcher;
use crate::layer::{AdapterLayer, Origin};
use crate::level::Level;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry};

/// Configuration of the global `tracing` bridge.
///
/// **Fields**
/// - `min_level`: events below this level reach neither the adapters nor
///   the console.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   added on top of [`AdapterLayer`] and events are also printed.
/// - `origin`: identity stamped on every bridged entry.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
    pub origin: Origin,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Info,
            enable_stdout: true,
            origin: Origin::default(),
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to the
/// adapters held by `dispatcher`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`AdapterLayer`] as the global
/// default subscriber, so every `tracing` event in the process is
/// offered to the adapters. Fails if a global subscriber already exists.
pub fn init_tracing_with_config(dispatcher: Arc<Dispatcher>, config: LayerConfig) -> Result<(), TryInitError> {
    let layer = AdapterLayer::new(dispatcher, config.min_level, config.origin);
    let fmt_layer = config
        .enable_stdout
        .then(|| tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(config.min_level.to_tracing())));

    Registry::default().with(layer).with(fmt_layer).try_init()
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(dispatcher: Arc<Dispatcher>) -> Result<(), TryInitError> {
    init_tracing_with_config(dispatcher, LayerConfig::default())
}
