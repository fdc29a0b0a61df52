use crate::adapter::{AdapterError, AdapterOptions};
use crate::batch::{BatchAdapter, BatchDestination, BatchSettings};
use crate::options;
use crate::record::LogEntry;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_TOPIC: &str = "logs";

/// Batching adapter publishing entries to a Kafka topic.
pub type KafkaAdapter = BatchAdapter<KafkaDestination>;

/// The wire client used to publish messages. The crate ships a
/// [`LoggingProducer`] that only traces what would be sent; plug a real
/// client in with [`KafkaDestination::with_producer`].
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn connect(&self, _brokers: &[String]) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    async fn produce(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Producer that emits every message as a debug event instead of
/// publishing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProducer;

#[async_trait]
impl MessageProducer for LoggingProducer {
    async fn produce(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            topic,
            key,
            payload = %String::from_utf8_lossy(payload),
            "kafka message"
        );
        Ok(())
    }
}

/// Kafka destination: one JSON message per entry, keyed by node id.
pub struct KafkaDestination {
    brokers: Vec<String>,
    topic: String,
    producer: Arc<dyn MessageProducer>,
}

impl Default for KafkaDestination {
    fn default() -> Self {
        KafkaDestination::with_producer(Arc::new(LoggingProducer))
    }
}

impl KafkaDestination {
    pub fn with_producer(producer: Arc<dyn MessageProducer>) -> Self {
        KafkaDestination {
            brokers: vec![DEFAULT_BROKER.to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            producer,
        }
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl KafkaAdapter {
    /// Uninitialized adapter with the logging producer.
    pub fn kafka() -> Self {
        BatchAdapter::new(KafkaDestination::default())
    }
}

#[async_trait]
impl BatchDestination for KafkaDestination {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn configure(&mut self, options: &AdapterOptions) -> Result<BatchSettings, AdapterError> {
        self.brokers = options::string_list_or(options, "brokers", &[DEFAULT_BROKER]);
        self.topic = options::string_or(options, "topic", DEFAULT_TOPIC);

        self.producer
            .connect(&self.brokers)
            .await
            .map_err(|e| AdapterError::Connect {
                adapter: self.name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(BatchSettings::new(
            options::count_or(options, "batch_size", 100),
            options::seconds_or(options, "flush_timeout", Duration::from_secs(5)),
        ))
    }

    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), AdapterError> {
        for entry in batch {
            let payload = serde_json::to_vec(entry)?;
            self.producer
                .produce(&self.topic, entry.node_id.as_deref(), &payload)
                .await
                .map_err(|source| AdapterError::Send {
                    adapter: self.name().to_string(),
                    count: batch.len(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LogAdapter;
    use crate::level::Level;
    use chrono::Local;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(String, Option<String>, serde_json::Value)>>);

    #[async_trait]
    impl MessageProducer for Recorded {
        async fn produce(
            &self,
            topic: &str,
            key: Option<&str>,
            payload: &[u8],
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            let value = serde_json::from_slice(payload)?;
            self.0.lock().push((topic.to_string(), key.map(str::to_string), value));
            Ok(())
        }
    }

    #[tokio::test]
    async fn init_reads_options() {
        let mut adapter = KafkaAdapter::kafka();
        let options = json!({
            "brokers": ["localhost:9092", "localhost:9093"],
            "topic": "test-logs",
            "batch_size": 200.0,
            "flush_timeout": 10.0,
        });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        assert_eq!(adapter.destination().brokers(), ["localhost:9092", "localhost:9093"]);
        assert_eq!(adapter.destination().topic(), "test-logs");
        assert_eq!(adapter.settings().batch_size, 200);
        assert_eq!(adapter.settings().flush_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn malformed_options_use_defaults() {
        let mut adapter = KafkaAdapter::kafka();
        let options = json!({ "brokers": "not-a-list-but-ok", "topic": 7, "batch_size": "x" });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        assert_eq!(adapter.destination().brokers(), ["not-a-list-but-ok"]);
        assert_eq!(adapter.destination().topic(), DEFAULT_TOPIC);
        assert_eq!(adapter.settings().batch_size, 100);
        assert_eq!(adapter.settings().flush_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn publishes_one_message_per_entry_in_order() {
        let producer = Arc::new(Recorded::default());
        let mut adapter = BatchAdapter::new(KafkaDestination::with_producer(producer.clone()));
        let options = json!({ "topic": "audit", "batch_size": 2 });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        let mut first = LogEntry::new(Level::Error, Local::now(), "test error");
        first.node_id = Some("node-002".to_string());
        adapter.process(first).await.unwrap();
        adapter
            .process(LogEntry::new(Level::Info, Local::now(), "second"))
            .await
            .unwrap();

        let sent = producer.0.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "audit");
        assert_eq!(sent[0].1.as_deref(), Some("node-002"));
        assert_eq!(sent[0].2["message"], "test error");
        assert_eq!(sent[0].2["level"], "error");
        assert_eq!(sent[1].2["message"], "second");
    }
}
