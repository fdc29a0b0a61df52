use crate::adapter::{AdapterError, AdapterOptions};
use crate::batch::{BatchAdapter, BatchDestination, BatchSettings};
use crate::options;
use crate::record::LogEntry;
use async_trait::async_trait;
use chrono::Local;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "http://localhost:9200";

/// Batching adapter indexing entries into Elasticsearch / OpenSearch.
pub type ElasticsearchAdapter = BatchAdapter<ElasticsearchDestination>;

/// Credentials and endpoints a [`BulkTransport`] posts to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkTarget {
    pub hosts: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Carries one NDJSON `_bulk` body to the cluster.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn bulk(&self, target: &BulkTarget, body: String) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Transport that traces the bulk body instead of posting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTransport;

#[async_trait]
impl BulkTransport for LoggingTransport {
    async fn bulk(&self, target: &BulkTarget, body: String) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(hosts = ?target.hosts, %body, "elasticsearch bulk request");
        Ok(())
    }
}

/// Posts the bulk body over HTTP, trying each host in turn.
#[cfg(feature = "http")]
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn post(&self, host: &str, target: &BulkTarget, body: String) -> Result<(), Box<dyn Error + Send + Sync>> {
        let url = format!("{}/_bulk", host.trim_end_matches('/'));
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        if let Some(user) = &target.username {
            request = request.basic_auth(user, target.password.as_deref());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(format!("bulk insert to {} failed with status {}: {}", host, status, text).into());
        }

        // A 200 response can still carry per-item failures.
        let reply: serde_json::Value = resp.json().await?;
        if reply.get("errors").and_then(serde_json::Value::as_bool) == Some(true) {
            return Err(format!("bulk insert to {} reported item errors", host).into());
        }
        Ok(())
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl BulkTransport for HttpTransport {
    async fn bulk(&self, target: &BulkTarget, body: String) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        for host in &target.hosts {
            match self.post(host, target, body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "bulk host failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| "no elasticsearch hosts configured".into()))
    }
}

/// Elasticsearch destination writing each batch as one `_bulk` request.
pub struct ElasticsearchDestination {
    target: BulkTarget,
    index: String,
    transport: Arc<dyn BulkTransport>,
    fixed_transport: bool,
}

impl Default for ElasticsearchDestination {
    fn default() -> Self {
        ElasticsearchDestination {
            target: BulkTarget {
                hosts: vec![DEFAULT_HOST.to_string()],
                ..BulkTarget::default()
            },
            index: default_index(),
            transport: Arc::new(LoggingTransport),
            fixed_transport: false,
        }
    }
}

/// `logs-YYYY.MM.DD` for today.
fn default_index() -> String {
    format!("logs-{}", Local::now().format("%Y.%m.%d"))
}

impl ElasticsearchDestination {
    /// Use `transport` regardless of the `transport` option.
    pub fn with_transport(transport: Arc<dyn BulkTransport>) -> Self {
        ElasticsearchDestination {
            transport,
            fixed_transport: true,
            ..Self::default()
        }
    }

    pub fn target(&self) -> &BulkTarget {
        &self.target
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn choose_transport(&mut self, kind: &str) {
        if self.fixed_transport {
            return;
        }
        match kind {
            #[cfg(feature = "http")]
            "http" => self.transport = Arc::new(HttpTransport::new()),
            "log" => self.transport = Arc::new(LoggingTransport),
            other => {
                tracing::debug!(transport = other, "unsupported elasticsearch transport, using log");
                self.transport = Arc::new(LoggingTransport);
            }
        }
    }

    /// Render a batch as an NDJSON bulk body.
    pub fn bulk_body(&self, batch: &[LogEntry]) -> Result<String, serde_json::Error> {
        let action = serde_json::json!({ "index": { "_index": self.index } }).to_string();
        let mut body = String::new();
        for entry in batch {
            body.push_str(&action);
            body.push('\n');
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }
        Ok(body)
    }
}

impl ElasticsearchAdapter {
    /// Uninitialized adapter; the transport is picked by `init`.
    pub fn elasticsearch() -> Self {
        BatchAdapter::new(ElasticsearchDestination::default())
    }
}

#[async_trait]
impl BatchDestination for ElasticsearchDestination {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn configure(&mut self, options: &AdapterOptions) -> Result<BatchSettings, AdapterError> {
        self.target = BulkTarget {
            hosts: options::string_list_or(options, "hosts", &[DEFAULT_HOST]),
            username: options::string(options, "username"),
            password: options::string(options, "password"),
        };
        self.index = options::string(options, "index").unwrap_or_else(default_index);
        let transport = options::string_or(options, "transport", "log");
        self.choose_transport(&transport);

        Ok(BatchSettings::new(
            options::count_or(options, "bulk_size", 200),
            options::seconds_or(options, "flush_interval", Duration::from_secs(10)),
        ))
    }

    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), AdapterError> {
        let body = self.bulk_body(batch)?;
        self.transport
            .bulk(&self.target, body)
            .await
            .map_err(|source| AdapterError::Send {
                adapter: self.name().to_string(),
                count: batch.len(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LogAdapter;
    use crate::level::Level;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Captured(Mutex<Vec<String>>);

    #[async_trait]
    impl BulkTransport for Captured {
        async fn bulk(&self, _target: &BulkTarget, body: String) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.0.lock().push(body);
            Ok(())
        }
    }

    #[tokio::test]
    async fn init_reads_options() {
        let mut adapter = ElasticsearchAdapter::elasticsearch();
        let options = json!({
            "hosts": ["http://localhost:9200", "http://localhost:9201"],
            "index": "test-logs",
            "username": "elastic",
            "password": "password123",
            "bulk_size": 500.0,
            "flush_interval": 15.0,
        });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        let dest = adapter.destination();
        assert_eq!(dest.target().hosts, ["http://localhost:9200", "http://localhost:9201"]);
        assert_eq!(dest.index(), "test-logs");
        assert_eq!(dest.target().username.as_deref(), Some("elastic"));
        assert_eq!(dest.target().password.as_deref(), Some("password123"));
        assert_eq!(adapter.settings().batch_size, 500);
        assert_eq!(adapter.settings().flush_interval, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn defaults_derive_index_from_date() {
        let mut adapter = ElasticsearchAdapter::elasticsearch();
        adapter.init(&AdapterOptions::new()).await.unwrap();

        let dest = adapter.destination();
        assert_eq!(dest.target().hosts, [DEFAULT_HOST]);
        assert_eq!(dest.index(), format!("logs-{}", Local::now().format("%Y.%m.%d")));
        assert_eq!(adapter.settings().batch_size, 200);
        assert_eq!(adapter.settings().flush_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn batch_becomes_one_bulk_body() {
        let transport = Arc::new(Captured::default());
        let mut adapter = BatchAdapter::new(ElasticsearchDestination::with_transport(transport.clone()));
        let options = json!({ "index": "app", "bulk_size": 2 });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        let entry = LogEntry::new(Level::Info, Local::now(), "test message").with_property("key", "value");
        adapter.process(entry.clone()).await.unwrap();
        adapter.process(entry).await.unwrap();

        let bodies = transport.0.lock();
        assert_eq!(bodies.len(), 1);
        let lines: Vec<&str> = bodies[0].lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"index":{"_index":"app"}}"#);
        let doc: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["message"], "test message");
        assert_eq!(doc["properties"]["key"], "value");
    }
}
