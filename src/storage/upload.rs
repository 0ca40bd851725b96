//! Upload with bounded retry
//!
//! Each attempt stores the bytes and then resolves the download URL; a
//! failure in either step re-runs the whole attempt. Attempts are separated
//! by a fixed delay (no exponential backoff). After the last attempt the
//! caller gets [`SecLoadError::UploadFailed`] naming the attempt count and
//! the last provider error code.

use super::object_store::{ObjectStore, ProgressFn, UploadProgress};
use crate::error::{IoResultExt, Result, SecLoadError};
use crate::progress::ProgressReporter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default number of attempts per upload
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Attempt count and delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub max_attempts: u32,
    /// Fixed pause after a failed attempt
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Custom policy; `max_attempts` must be positive
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(SecLoadError::config("upload attempts must be at least 1"));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedObject {
    /// Original file name
    pub file_name: String,
    /// Object path, `{folder}/{uuid}.{ext}`
    pub path: String,
    /// Download URL
    pub url: String,
    /// Object size
    pub bytes: u64,
    /// Hex SHA-256 of the content
    pub sha256: String,
    /// Content type sent to the provider
    pub content_type: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// One file that could not be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    /// Local path
    pub file: PathBuf,
    /// Terminal error text
    pub message: String,
}

/// Outcome of uploading several files
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Stored objects, in input order
    pub uploaded: Vec<UploadedObject>,
    /// Files that gave up
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// True when every file was stored
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Aggregate one-liner
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.uploaded.len(), self.failures.len())
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let bytes: u64 = self.uploaded.iter().map(|o| o.bytes).sum();
        println!("\n=== Upload Summary ===");
        println!("Uploaded:        {}", self.uploaded.len());
        println!("Failed:          {}", self.failures.len());
        println!("Bytes:           {}", humansize::format_size(bytes, humansize::BINARY));

        for object in &self.uploaded {
            println!("  {} -> {}", object.file_name, object.url);
        }
        if !self.failures.is_empty() {
            println!("\nFailures: {}", self.failures.len());
            for failure in &self.failures {
                println!("  {} - {}", failure.file.display(), failure.message);
            }
        }
    }
}

/// Object path for a new upload: `{folder}/{id}.{ext}`, or `{folder}/{id}`
/// when the file name has no extension
pub fn object_path(folder: &str, file_name: &str, id: Uuid) -> String {
    let folder = folder.trim_matches('/');
    match extension_of(file_name) {
        Some(ext) => format!("{}/{}.{}", folder, id, ext),
        None => format!("{}/{}", folder, id),
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Content type from a file extension
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("csv") => "text/csv",
        Some("txt") | Some("log") => "text/plain",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Uploads blobs to an [`ObjectStore`] with fixed-delay retry
pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    policy: RetryPolicy,
    progress: Option<Arc<ProgressReporter>>,
    max_size: Option<u64>,
}

impl<'a> Uploader<'a> {
    /// Uploader with the default policy (3 attempts, 1 s apart)
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            progress: None,
            max_size: None,
        }
    }

    /// Override the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Feed byte and file progress into a reporter
    pub fn with_progress(mut self, progress: Arc<ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Refuse files larger than `max_size` bytes
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Upload one blob under `folder`.
    ///
    /// `on_progress` receives `(transferred, total)` for the running attempt;
    /// a retried attempt starts again from zero.
    pub async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        data: &[u8],
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadedObject> {
        if folder.trim_matches('/').is_empty() {
            return Err(SecLoadError::config("upload folder must not be empty"));
        }
        let size = data.len() as u64;
        if let Some(limit) = self.max_size {
            if size > limit {
                return Err(SecLoadError::config(format!(
                    "{} is {} which exceeds the {} limit",
                    file_name,
                    humansize::format_size(size, humansize::BINARY),
                    humansize::format_size(limit, humansize::BINARY)
                )));
            }
        }

        let path = object_path(folder, file_name, Uuid::new_v4());
        let content_type = content_type_for(file_name);
        if let Some(progress) = &self.progress {
            progress.add_total_bytes(size);
            progress.set_current_item(file_name);
        }

        let mut last_error = None;
        for attempt in 1..=self.policy.max_attempts {
            let sent = Arc::new(AtomicU64::new(0));
            let callback = self.attempt_callback(Arc::clone(&sent), on_progress.clone());

            match self.attempt(&path, data, content_type, callback).await {
                Ok(url) => {
                    tracing::info!(store = self.store.name(), %path, attempt, "upload complete");
                    return Ok(UploadedObject {
                        file_name: file_name.to_string(),
                        path,
                        url,
                        bytes: size,
                        sha256: hex::encode(Sha256::digest(data)),
                        content_type: content_type.to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        store = self.store.name(),
                        %path,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        code = %e.provider_code(),
                        error = %e,
                        "upload attempt failed"
                    );
                    if let Some(progress) = &self.progress {
                        progress.rewind_bytes(sent.load(Ordering::Relaxed));
                    }
                    last_error = Some(e);
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        let (code, message) = match last_error {
            Some(e) => (e.provider_code(), e.to_string()),
            None => ("unknown".to_string(), "no attempt was made".to_string()),
        };
        Err(SecLoadError::UploadFailed {
            attempts: self.policy.max_attempts,
            code,
            message,
        })
    }

    /// Read a local file and upload it
    pub async fn upload_path(&self, folder: &str, path: &Path) -> Result<UploadedObject> {
        let data = tokio::fs::read(path).await.with_path(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.upload(folder, &file_name, &data, None).await
    }

    /// Upload files one after another, isolating failures per file
    pub async fn upload_all(&self, folder: &str, paths: &[PathBuf]) -> UploadReport {
        let mut report = UploadReport::default();
        if let Some(progress) = &self.progress {
            progress.set_total_items(paths.len() as u64);
            progress.set_status("Uploading files");
        }

        for path in paths {
            match self.upload_path(folder, path).await {
                Ok(object) => report.uploaded.push(object),
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "upload gave up");
                    report.failures.push(UploadFailure {
                        file: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            if let Some(progress) = &self.progress {
                progress.increment_items(1);
            }
        }

        if let Some(progress) = &self.progress {
            if report.is_success() {
                progress.finish_success(&report.summary());
            } else {
                progress.finish_error(&report.summary());
            }
        }
        report
    }

    async fn attempt(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
        callback: ProgressFn,
    ) -> Result<String> {
        self.store.put(path, data, content_type, callback).await?;
        self.store.resolve_url(path).await
    }

    fn attempt_callback(&self, sent: Arc<AtomicU64>, user: Option<ProgressFn>) -> ProgressFn {
        let reporter = self.progress.clone();
        Arc::new(move |update: UploadProgress| {
            let previous = sent.swap(update.transferred, Ordering::Relaxed);
            if let Some(reporter) = &reporter {
                reporter.increment_bytes(update.transferred.saturating_sub(previous));
            }
            if let Some(user) = &user {
                user(update);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum FailAt {
        Put,
        Resolve,
    }

    /// Store that fails the first `failures` attempts at a chosen step
    struct FlakyStore {
        failures: u32,
        step: FailAt,
        puts: AtomicU32,
        resolves: AtomicU32,
        paths: Mutex<Vec<String>>,
    }

    impl FlakyStore {
        fn new(failures: u32, step: FailAt) -> Self {
            Self {
                failures,
                step,
                puts: AtomicU32::new(0),
                resolves: AtomicU32::new(0),
                paths: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn put(&self, path: &str, data: &[u8], _content_type: &str, progress: ProgressFn) -> Result<()> {
            let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
            self.paths.lock().unwrap().push(path.to_string());
            progress(UploadProgress {
                transferred: data.len() as u64 / 2,
                total: data.len() as u64,
            });
            if matches!(self.step, FailAt::Put) && n <= self.failures {
                return Err(SecLoadError::storage("storage/retry-limit-exceeded", "transfer interrupted"));
            }
            progress(UploadProgress {
                transferred: data.len() as u64,
                total: data.len() as u64,
            });
            Ok(())
        }

        async fn resolve_url(&self, path: &str) -> Result<String> {
            let n = self.resolves.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(self.step, FailAt::Resolve) && n <= self.failures {
                return Err(SecLoadError::storage("storage/object-not-found", "no metadata yet"));
            }
            Ok(format!("https://cdn.example.com/{}", path))
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, Duration::ZERO).unwrap()
    }

    #[test]
    fn test_default_policy_is_three_attempts_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert!(RetryPolicy::new(0, Duration::ZERO).is_err());
    }

    #[test]
    fn test_object_path_pattern() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            object_path("/evidence/", "Report.PDF", id),
            "evidence/67e55044-10b1-426f-9247-bb680e5fe0c8.pdf"
        );
        assert_eq!(
            object_path("evidence", "README", id),
            "evidence/67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
        assert_eq!(content_type_for("scan.PNG"), "image/png");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let store = FlakyStore::new(2, FailAt::Put);
        let object = Uploader::new(&store)
            .with_policy(fast())
            .upload("evidence", "scan.png", b"0123456789", None)
            .await
            .unwrap();

        assert_eq!(object.attempts, 3);
        assert_eq!(object.bytes, 10);
        assert!(object.path.starts_with("evidence/") && object.path.ends_with(".png"));
        assert_eq!(object.url, format!("https://cdn.example.com/{}", object.path));
        assert_eq!(
            object.sha256,
            "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882"
        );
        // every attempt targets the same object
        let paths = store.paths.lock().unwrap();
        assert!(paths.iter().all(|p| p == &object.path));
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_three_attempts() {
        let store = FlakyStore::new(u32::MAX, FailAt::Put);
        let err = Uploader::new(&store)
            .with_policy(fast())
            .upload("evidence", "scan.png", b"data", None)
            .await
            .unwrap_err();

        assert_eq!(store.puts.load(Ordering::SeqCst), 3);
        match &err {
            SecLoadError::UploadFailed { attempts, code, .. } => {
                assert_eq!(*attempts, 3);
                assert_eq!(code, "storage/retry-limit-exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_url_failure_reruns_whole_upload() {
        let store = FlakyStore::new(u32::MAX, FailAt::Resolve);
        let err = Uploader::new(&store)
            .with_policy(fast())
            .upload("evidence", "a.txt", b"data", None)
            .await
            .unwrap_err();

        assert_eq!(store.puts.load(Ordering::SeqCst), 3);
        assert_eq!(store.resolves.load(Ordering::SeqCst), 3);
        assert_eq!(err.provider_code(), "storage/object-not-found");
    }

    #[tokio::test]
    async fn test_fixed_delay_between_attempts() {
        let store = FlakyStore::new(u32::MAX, FailAt::Put);
        let policy = RetryPolicy::new(3, Duration::from_millis(20)).unwrap();
        let start = std::time::Instant::now();
        let _ = Uploader::new(&store)
            .with_policy(policy)
            .upload("evidence", "a.txt", b"data", None)
            .await;
        // two pauses: after attempts 1 and 2, none after the last
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_progress_callback_and_reporter_rewind() {
        let store = FlakyStore::new(1, FailAt::Put);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressFn = Arc::new(move |p: UploadProgress| sink.lock().unwrap().push((p.transferred, p.total)));
        let reporter = Arc::new(ProgressReporter::disabled());

        Uploader::new(&store)
            .with_policy(fast())
            .with_progress(Arc::clone(&reporter))
            .upload("evidence", "a.bin", &[0u8; 8], Some(callback))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(4, 8), (4, 8), (8, 8)]);
        let summary = reporter.summary();
        assert_eq!(summary.bytes_done, 8);
        assert_eq!(summary.total_bytes, 8);
    }

    #[tokio::test]
    async fn test_rejects_empty_folder_and_oversize() {
        let store = FlakyStore::new(0, FailAt::Put);
        let uploader = Uploader::new(&store).with_max_size(Some(2));
        assert!(uploader.upload("/", "a.txt", b"a", None).await.is_err());
        assert!(uploader.upload("evidence", "a.txt", b"abc", None).await.is_err());
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bucket");
        let good = dir.path().join("good.csv");
        std::fs::write(&good, "a,b\n1,2\n").unwrap();
        let missing = dir.path().join("missing.pdf");

        let store = LocalStore::new(&root);
        let report = Uploader::new(&store)
            .with_policy(fast())
            .upload_all("reports", &[missing.clone(), good])
            .await;

        assert_eq!(report.summary(), "1 succeeded, 1 failed");
        assert_eq!(report.failures[0].file, missing);
        let stored = root.join(&report.uploaded[0].path);
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "a,b\n1,2\n");
    }
}
