use crate::adapter::LogAdapter;
use crate::elasticsearch::ElasticsearchAdapter;
use crate::file_batch::FileAdapter;
use crate::kafka::KafkaAdapter;
use crate::noop_sink::NoopAdapter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Builds a fresh, uninitialized adapter.
pub type AdapterConstructor = Arc<dyn Fn() -> Box<dyn LogAdapter> + Send + Sync>;

/// Name → constructor table used to build adapters from configuration.
///
/// Every [`get`](AdapterRegistry::get) runs the constructor again, so two
/// loggers configured with the same name never share buffers or
/// connections. Registering an existing name replaces its constructor.
#[derive(Default)]
pub struct AdapterRegistry {
    constructors: RwLock<HashMap<String, AdapterConstructor>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with `kafka`, `elasticsearch`, `file` and `noop`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("kafka", || Box::new(KafkaAdapter::kafka()));
        registry.register("elasticsearch", || Box::new(ElasticsearchAdapter::elasticsearch()));
        registry.register("file", || Box::new(FileAdapter::file()));
        registry.register("noop", || Box::new(NoopAdapter::default()));
        registry
    }

    /// Process-wide registry, preloaded with the builtins. Only the global
    /// convenience API uses it implicitly.
    pub fn global() -> &'static AdapterRegistry {
        static GLOBAL: OnceLock<AdapterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(AdapterRegistry::with_builtins)
    }

    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn LogAdapter> + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self
            .constructors
            .write()
            .insert(name.clone(), Arc::new(constructor))
            .is_some();
        if replaced {
            tracing::debug!(adapter = %name, "replaced registered adapter constructor");
        }
    }

    /// A new instance for `name`, or `None` if nothing is registered.
    pub fn get(&self, name: &str) -> Option<Box<dyn LogAdapter>> {
        // Run the constructor outside the lock.
        let constructor = self.constructors.read().get(name).cloned()?;
        Some(constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }
}
