//! Object store abstraction
//!
//! An upload is two provider calls: store the bytes, then resolve a URL the
//! dashboard can link to. Either can fail independently.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Bytes transferred so far for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes sent in the current attempt
    pub transferred: u64,
    /// Object size
    pub total: u64,
}

impl UploadProgress {
    /// Completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.transferred as f64 / self.total as f64 * 100.0
        }
    }
}

/// Progress callback, invoked as bytes are handed to the provider
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// A callback that ignores progress
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Remote object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Store `data` at `path`, replacing any existing object
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<()>;

    /// URL at which the stored object can be fetched
    async fn resolve_url(&self, path: &str) -> Result<String>;
}

/// Split `data` into chunks for streaming, reporting progress as each chunk
/// is yielded
pub(crate) fn chunked_with_progress(
    data: &[u8],
    chunk_size: usize,
    progress: ProgressFn,
) -> impl futures::Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    let total = data.len() as u64;
    let chunks: Vec<Vec<u8>> = data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(UploadProgress {
            transferred: sent,
            total,
        });
        Ok(chunk)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex;

    #[test]
    fn test_percentage() {
        let p = UploadProgress {
            transferred: 25,
            total: 100,
        };
        assert_eq!(p.percentage(), 25.0);
        let empty = UploadProgress {
            transferred: 0,
            total: 0,
        };
        assert_eq!(empty.percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_chunked_stream_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p: UploadProgress| sink.lock().unwrap().push(p.transferred));

        let data = vec![7u8; 10];
        let chunks: Vec<_> = chunked_with_progress(&data, 4, progress).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![4, 8, 10]);
    }
}
