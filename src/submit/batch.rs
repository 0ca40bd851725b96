//! Sequential bulk submission
//!
//! Rows are sent one request at a time, each awaited before the next. A
//! failed row is recorded and the loop moves on; there is no fail-fast and
//! no automatic retry. Once started, a loop runs to completion.

use super::sink::RecordSink;
use crate::ingest::ValidRow;
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// One item that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitFailure {
    /// Row label (`row N`) or record id
    pub item: String,
    /// Error text from the sink
    pub message: String,
}

/// Outcome of a bulk loop
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    /// Endpoint written to
    pub endpoint: String,
    /// Items written successfully
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Items not sent because of dry-run mode
    pub skipped: usize,
    /// Failure details, in submission order
    pub failures: Vec<SubmitFailure>,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Elapsed time
    #[serde(serialize_with = "serialize_seconds", rename = "duration_seconds")]
    pub duration: Duration,
}

fn serialize_seconds<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl SubmitReport {
    fn start(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// True when nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Aggregate one-liner, e.g. `"12 succeeded, 1 failed"`
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded, self.failed)
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Submit Summary ===");
        println!("Endpoint:        {}", self.endpoint);
        println!("Succeeded:       {}", self.succeeded);
        println!("Failed:          {}", self.failed);
        if self.skipped > 0 {
            println!("Skipped:         {} (dry run)", self.skipped);
        }
        println!("Duration:        {}", humantime::format_duration(round_millis(self.duration)));

        if !self.failures.is_empty() {
            println!("\nFailures: {}", self.failures.len());
            for failure in &self.failures {
                println!("  {} - {}", failure.item, failure.message);
            }
        }
    }
}

fn round_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// Sends validated rows to a collection endpoint
pub struct BulkSubmitter<'a> {
    sink: &'a dyn RecordSink,
    endpoint: String,
    progress: Option<&'a ProgressReporter>,
    dry_run: bool,
}

impl<'a> BulkSubmitter<'a> {
    /// Submitter writing to `endpoint` through `sink`
    pub fn new(sink: &'a dyn RecordSink, endpoint: impl Into<String>) -> Self {
        Self {
            sink,
            endpoint: endpoint.into(),
            progress: None,
            dry_run: false,
        }
    }

    /// Report progress per item
    pub fn with_progress(mut self, progress: &'a ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Count rows without sending them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Create one record per row, strictly in order
    pub async fn submit_all(&self, rows: &[ValidRow]) -> SubmitReport {
        let start = Instant::now();
        let mut report = SubmitReport::start(&self.endpoint);
        self.begin(rows.len(), "Submitting rows");

        for row in rows {
            let label = format!("row {}", row.line());
            if self.dry_run {
                report.skipped += 1;
                self.advance(&label);
                continue;
            }

            match self.sink.create(&self.endpoint, &row.payload).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint, line = row.line(), error = %e, "row rejected by API");
                    report.failed += 1;
                    report.failures.push(SubmitFailure {
                        item: label.clone(),
                        message: e.to_string(),
                    });
                }
            }
            self.advance(&label);
        }

        report.duration = start.elapsed();
        self.finish(&report);
        report
    }

    /// Delete records by id, strictly in order
    pub async fn delete_selected(&self, ids: &[String]) -> SubmitReport {
        let start = Instant::now();
        let mut report = SubmitReport::start(&self.endpoint);
        self.begin(ids.len(), "Deleting records");

        for id in ids {
            if self.dry_run {
                report.skipped += 1;
                self.advance(id);
                continue;
            }

            match self.sink.delete(&self.endpoint, id).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint, id = %id, error = %e, "delete failed");
                    report.failed += 1;
                    report.failures.push(SubmitFailure {
                        item: id.clone(),
                        message: e.to_string(),
                    });
                }
            }
            self.advance(id);
        }

        report.duration = start.elapsed();
        self.finish(&report);
        report
    }

    fn begin(&self, total: usize, status: &str) {
        if let Some(progress) = self.progress {
            progress.set_total_items(total as u64);
            progress.set_status(status);
        }
    }

    fn advance(&self, label: &str) {
        if let Some(progress) = self.progress {
            progress.set_current_item(label);
            progress.increment_items(1);
        }
    }

    fn finish(&self, report: &SubmitReport) {
        tracing::info!(
            endpoint = %self.endpoint,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "bulk loop finished"
        );
        if let Some(progress) = self.progress {
            if report.is_success() {
                progress.finish_success(&report.summary());
            } else {
                progress.finish_error(&report.summary());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SecLoadError};
    use crate::ingest::CsvRow;
    use crate::submit::Record;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Sink that stores records and fails any record whose `name` starts with "bad"
    #[derive(Default)]
    struct MemorySink {
        created: Mutex<Vec<Record>>,
        deleted: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MemorySink {
        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn list(&self, _endpoint: &str) -> Result<Vec<Value>> {
            Ok(self.created.lock().unwrap().iter().cloned().map(Value::Object).collect())
        }

        async fn create(&self, _endpoint: &str, record: &Record) -> Result<Value> {
            self.enter().await;
            let name = record["name"].as_str().unwrap_or_default();
            if name.starts_with("bad") {
                return Err(SecLoadError::Api {
                    status: 400,
                    message: format!("{} rejected", name),
                });
            }
            self.created.lock().unwrap().push(record.clone());
            Ok(Value::Object(record.clone()))
        }

        async fn update(&self, _endpoint: &str, _id: &str, record: &Record) -> Result<Value> {
            Ok(Value::Object(record.clone()))
        }

        async fn delete(&self, _endpoint: &str, id: &str) -> Result<()> {
            self.enter().await;
            if id == "404" {
                return Err(SecLoadError::Api {
                    status: 404,
                    message: "Not Found".to_string(),
                });
            }
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn valid_rows(names: &[&str]) -> Vec<ValidRow> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut payload = Record::new();
                payload.insert("name".to_string(), json!(name));
                ValidRow {
                    row: CsvRow::new(i + 1, vec![("name".to_string(), name.to_string())]),
                    payload,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_valid_rows_succeed() {
        let sink = MemorySink::default();
        let rows = valid_rows(&["a", "b", "c", "d"]);
        let report = BulkSubmitter::new(&sink, "assets").submit_all(&rows).await;

        assert_eq!(report.succeeded, rows.len());
        assert_eq!(report.failed, 0);
        assert!(report.is_success());
        assert_eq!(report.summary(), "4 succeeded, 0 failed");

        let names: Vec<Value> = sink.created.lock().unwrap().iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c"), json!("d")]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_row() {
        let sink = MemorySink::default();
        let rows = valid_rows(&["bad-1", "ok-1", "bad-2", "ok-2"]);
        let progress = ProgressReporter::disabled();
        let report = BulkSubmitter::new(&sink, "assets")
            .with_progress(&progress)
            .submit_all(&rows)
            .await;

        assert_eq!(report.summary(), "2 succeeded, 2 failed");
        assert_eq!(report.failures[0].item, "row 1");
        assert!(report.failures[1].message.contains("bad-2 rejected"));
        assert_eq!(sink.created.lock().unwrap().len(), 2);
        assert_eq!(progress.summary().items_done, 4);
    }

    #[tokio::test]
    async fn test_requests_are_serialized() {
        let sink = MemorySink::default();
        let rows = valid_rows(&["a", "b", "c", "d", "e", "f"]);
        BulkSubmitter::new(&sink, "alerts").submit_all(&rows).await;
        assert_eq!(sink.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let sink = MemorySink::default();
        let rows = valid_rows(&["a", "b"]);
        let report = BulkSubmitter::new(&sink, "iocs").dry_run(true).submit_all(&rows).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.succeeded, 0);
        assert!(sink.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_selected_continues_past_failures() {
        let sink = MemorySink::default();
        let ids = vec!["1".to_string(), "404".to_string(), "3".to_string()];
        let report = BulkSubmitter::new(&sink, "alerts").delete_selected(&ids).await;
        assert_eq!(report.summary(), "2 succeeded, 1 failed");
        assert_eq!(report.failures[0].item, "404");
        assert_eq!(*sink.deleted.lock().unwrap(), vec!["1".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_report_serializes_seconds() {
        let mut report = SubmitReport::start("assets");
        report.duration = Duration::from_millis(1500);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["duration_seconds"], json!(1.5));
        assert_eq!(value["endpoint"], json!("assets"));
    }
}
