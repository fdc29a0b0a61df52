use crate::adapter::{AdapterError, AdapterOptions};
use crate::batch::{BatchAdapter, BatchDestination, BatchSettings};
use crate::clock::{Clock, SystemClock};
use crate::options;
use crate::record::LogEntry;
use crate::rotator::RotatingFileSink;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PATH: &str = "./logs/adapter";

/// Batching adapter appending entries as JSON lines to its own rotating
/// file tree, separate from the logger's encoded output.
pub type FileAdapter = BatchAdapter<FileDestination>;

pub struct FileDestination {
    clock: Arc<dyn Clock>,
    sink: Option<RotatingFileSink>,
}

impl Default for FileDestination {
    fn default() -> Self {
        FileDestination::with_clock(Arc::new(SystemClock))
    }
}

impl FileDestination {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        FileDestination { clock, sink: None }
    }

    pub fn sink(&self) -> Option<&RotatingFileSink> {
        self.sink.as_ref()
    }
}

impl FileAdapter {
    pub fn file() -> Self {
        BatchAdapter::new(FileDestination::default())
    }
}

#[async_trait]
impl BatchDestination for FileDestination {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn configure(&mut self, options: &AdapterOptions) -> Result<BatchSettings, AdapterError> {
        let path = options::string_or(options, "path", DEFAULT_PATH);
        self.sink = Some(RotatingFileSink::with_clock(path, Arc::clone(&self.clock))?);

        Ok(BatchSettings::new(
            options::count_or(options, "batch_size", 100),
            options::seconds_or(options, "flush_interval", Duration::from_secs(5)),
        ))
    }

    async fn send_batch(&self, batch: &[LogEntry]) -> Result<(), AdapterError> {
        let sink = self.sink.as_ref().ok_or_else(|| AdapterError::Connect {
            adapter: self.name().to_string(),
            reason: "file adapter used before init".to_string(),
        })?;

        let lines = batch
            .iter()
            .map(|entry| {
                let mut line = serde_json::to_vec(entry)?;
                line.push(b'\n');
                Ok(line)
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        // File writes block; keep them off the async workers.
        let sink = sink.clone();
        let written = tokio::task::spawn_blocking(move || {
            lines.iter().try_for_each(|line| sink.write(line).map(|_| ()))
        })
        .await
        .map_err(|e| AdapterError::Send {
            adapter: self.name().to_string(),
            count: batch.len(),
            source: Box::new(e),
        })?;
        Ok(written?)
    }

    async fn close(&self) -> Result<(), AdapterError> {
        match &self.sink {
            Some(sink) => Ok(sink.close()?),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LogAdapter;
    use crate::clock::ManualClock;
    use crate::level::Level;
    use chrono::{Local, TimeZone};
    use serde_json::json;

    #[tokio::test]
    async fn writes_json_lines_into_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let mut adapter = BatchAdapter::new(FileDestination::with_clock(Arc::new(clock)));
        let options = json!({ "path": dir.path().to_str().unwrap(), "batch_size": 2 });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        adapter.process(LogEntry::new(Level::Warn, now, "one")).await.unwrap();
        adapter.process(LogEntry::new(Level::Warn, now, "two")).await.unwrap();
        adapter.close().await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("2024-02").join("02-29.log")).unwrap();
        let messages: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<LogEntry>(l).unwrap().message)
            .collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn large_batches_land_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = FileAdapter::file();
        let options = json!({ "path": dir.path().to_str().unwrap(), "batch_size": 500 });
        adapter.init(options.as_object().unwrap()).await.unwrap();

        let now = Local::now();
        for i in 0..1000 {
            adapter.process(LogEntry::new(Level::Info, now, format!("line {i}"))).await.unwrap();
        }
        adapter.close().await.unwrap();
        assert_eq!(adapter.stats().batches_sent, 2);

        let path = adapter.destination().sink().unwrap().current_path();
        assert!(path.is_none());
        let (_, file) = crate::rotator::day_path(dir.path(), now.date_naive());
        let content = std::fs::read_to_string(file).unwrap();
        let messages: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<LogEntry>(l).unwrap().message)
            .collect();
        let expected: Vec<String> = (0..1000).map(|i| format!("line {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[tokio::test]
    async fn unusable_path_fails_init() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut adapter = FileAdapter::file();
        let options = json!({ "path": file.path().to_str().unwrap() });
        assert!(adapter.init(options.as_object().unwrap()).await.is_err());
    }
}
