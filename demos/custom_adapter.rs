use async_trait::async_trait;
use fanout_log_sink::{
    AdapterError, AdapterOptions, AdapterRegistry, LogAdapter, LogEntry, Logger, LoggerConfig,
};

/// Example of integrating a completely custom destination by
/// implementing [`LogAdapter`] directly. Imagine this talks to some
/// proprietary store for which this crate has no built-in adapter.
struct StdoutJsonAdapter {
    prefix: String,
}

#[async_trait]
impl LogAdapter for StdoutJsonAdapter {
    fn name(&self) -> &str {
        "stdout-json"
    }

    async fn init(&mut self, options: &AdapterOptions) -> Result<(), AdapterError> {
        if let Some(prefix) = options.get("prefix").and_then(|v| v.as_str()) {
            self.prefix = prefix.to_string();
        }
        Ok(())
    }

    async fn process(&self, entry: LogEntry) -> Result<(), AdapterError> {
        println!("{} {}", self.prefix, serde_json::to_string(&entry)?);
        Ok(())
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = AdapterRegistry::with_builtins();
    registry.register("stdout-json", || {
        Box::new(StdoutJsonAdapter {
            prefix: "[custom]".to_string(),
        })
    });

    let mut options = AdapterOptions::new();
    options.insert("prefix".to_string(), "[my-store]".into());
    let config = LoggerConfig::default().with_adapter("stdout-json", options);

    let logger = Logger::new(config, &registry).await?;
    logger.info("custom adapter example started");
    logger.error("simulated error sent via custom adapter");
    logger.close().await?;
    Ok(())
}
