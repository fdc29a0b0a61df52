use async_trait::async_trait;
use fanout_log_sink::memory::MemoryBatches;
use fanout_log_sink::{
    AdapterError, AdapterOptions, AdapterRegistry, LogAdapter, LogEntry, Logger, LoggerConfig, LoggerError,
};
use serde_json::json;
use std::time::{Duration, Instant};

fn memory_registry(batches: &MemoryBatches) -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    let shared = batches.clone();
    registry.register("memory", move || Box::new(shared.adapter()));
    registry
}

fn options(value: serde_json::Value) -> AdapterOptions {
    match value {
        serde_json::Value::Object(map) => map,
        _ => AdapterOptions::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn batches_flush_on_size_and_interval() {
    let batches = MemoryBatches::default();
    let registry = memory_registry(&batches);
    let config = LoggerConfig::default().with_adapter(
        "memory",
        options(json!({ "batch_size": 3, "flush_interval": 0.1 })),
    );
    let logger = Logger::new(config, &registry).await.unwrap();

    logger.info("one");
    logger.info("two");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(batches.batch_sizes().is_empty());

    tokio::time::sleep(Duration::from_millis(140)).await;
    assert_eq!(batches.batch_sizes(), vec![2]);

    logger.info("three");
    logger.info("four");
    logger.info("five");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(batches.batch_sizes(), vec![2, 3]);

    logger.close().await.unwrap();
    assert!(batches.is_closed());
    assert_eq!(batches.entries().len(), 5);
}

struct Stuck;

#[async_trait]
impl LogAdapter for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }
    async fn init(&mut self, _options: &AdapterOptions) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn process(&self, _entry: LogEntry) -> Result<(), AdapterError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
    async fn flush(&self) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[tokio::test]
async fn stuck_adapter_never_delays_the_caller() {
    let batches = MemoryBatches::default();
    let registry = memory_registry(&batches);
    registry.register("stuck", || Box::new(Stuck));

    let config = LoggerConfig::default()
        .with_dispatch_timeout(Duration::from_millis(50))
        .with_adapter("stuck", AdapterOptions::new())
        .with_adapter("memory", options(json!({ "batch_size": 1 })));
    let logger = Logger::new(config, &registry).await.unwrap();

    let start = Instant::now();
    for i in 0..100 {
        logger.error(format_args!("entry {i}"));
    }
    assert!(start.elapsed() < Duration::from_secs(1));

    logger.close().await.unwrap();
    let stats = logger.dispatcher().stats();
    assert_eq!(stats.timed_out, 100);
    assert_eq!(batches.entries().len(), 100);
}

#[tokio::test]
async fn failing_adapter_init_fails_the_logger() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file-not-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let config = LoggerConfig::default().with_adapter(
        "file",
        options(json!({ "path": blocker.to_string_lossy() })),
    );
    let err = Logger::new(config, &AdapterRegistry::with_builtins())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, LoggerError::AdapterInit { ref name, .. } if name == "file"));
}

#[tokio::test]
async fn builtin_adapters_are_built_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggerConfig::default()
        .with_kafka_adapter(options(json!({ "brokers": ["b1:9092"], "topic": "app-logs" })))
        .with_elasticsearch_adapter(options(json!({ "transport": "log" })))
        .with_adapter("file", options(json!({ "path": dir.path().join("adapter").to_string_lossy() })))
        .with_adapter("missing", AdapterOptions::new());
    let logger = Logger::new(config, &AdapterRegistry::with_builtins()).await.unwrap();

    assert_eq!(
        logger.dispatcher().adapter_names(),
        vec!["kafka", "elasticsearch", "file"]
    );

    logger.info("hello adapters");
    logger.close().await.unwrap();

    let removed = logger.remove_adapter("kafka");
    assert!(removed.is_none());
    let stats = logger.dispatcher().stats();
    assert_eq!(stats.delivered, 3);
}

#[tokio::test]
async fn removed_adapter_stops_receiving() {
    let batches = MemoryBatches::default();
    let registry = memory_registry(&batches);
    let config = LoggerConfig::default().with_adapter("memory", options(json!({ "batch_size": 1 })));
    let logger = Logger::new(config, &registry).await.unwrap();

    logger.info("kept");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let adapter = logger.remove_adapter("memory").unwrap();
    logger.info("not delivered");
    adapter.close().await.unwrap();
    logger.close().await.unwrap();

    let messages: Vec<_> = batches.entries().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["kept"]);
}
