//! Filesystem-backed object store
//!
//! Writes objects under a root directory and hands back `file://` URLs.
//! Useful offline and for exercising the upload path without credentials.

use super::object_store::{ObjectStore, ProgressFn, UploadProgress};
use crate::error::{IoResultExt, Result, SecLoadError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Store objects under `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file for an object path, refusing anything that escapes the root
    pub fn file_for(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || relative.as_os_str().is_empty() {
            return Err(SecLoadError::storage(
                "storage/invalid-argument",
                format!("invalid object path '{}'", path),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, path: &str, data: &[u8], _content_type: &str, progress: ProgressFn) -> Result<()> {
        let target = self.file_for(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.with_path(parent)?;
        }

        let total = data.len() as u64;
        let mut file = tokio::fs::File::create(&target).await.with_path(&target)?;
        let mut written = 0u64;
        for chunk in data.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await.with_path(&target)?;
            written += chunk.len() as u64;
            progress(UploadProgress {
                transferred: written,
                total,
            });
        }
        if data.is_empty() {
            progress(UploadProgress { transferred: 0, total: 0 });
        }
        file.flush().await.with_path(&target)?;
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String> {
        let target = self.file_for(path)?;
        if !tokio::fs::try_exists(&target).await.with_path(&target)? {
            return Err(SecLoadError::storage(
                "storage/object-not-found",
                format!("{} does not exist", target.display()),
            ));
        }
        let absolute = std::path::absolute(&target).with_path(&target)?;
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|_| SecLoadError::storage("storage/no-download-url", format!("no URL for {}", absolute.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_put_creates_parents_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let data = vec![1u8; CHUNK_SIZE + 10];
        store
            .put(
                "evidence/2024/a.bin",
                &data,
                "application/octet-stream",
                Arc::new(move |p: UploadProgress| sink.lock().unwrap().push(p.transferred)),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("evidence/2024/a.bin")).unwrap(), data);
        assert_eq!(*seen.lock().unwrap(), vec![CHUNK_SIZE as u64, data.len() as u64]);
    }

    #[tokio::test]
    async fn test_resolve_url_is_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store
            .put("docs/a.txt", b"x", "text/plain", crate::storage::no_progress())
            .await
            .unwrap();

        let url = store.resolve_url("docs/a.txt").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/docs/a.txt"));

        let err = store.resolve_url("docs/missing.txt").await.unwrap_err();
        assert_eq!(err.provider_code(), "storage/object-not-found");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let store = LocalStore::new("/tmp/bucket");
        assert!(store.file_for("../etc/passwd").is_err());
        assert!(store.file_for("a/./b").is_ok());
        assert!(store.file_for("").is_err());
        assert_eq!(store.file_for("/a/b.txt").unwrap(), PathBuf::from("/tmp/bucket/a/b.txt"));
    }
}
