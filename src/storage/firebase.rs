//! Firebase Storage over its REST interface
//!
//! Objects are written with a media upload and fetched through a token URL
//! read back from the object's metadata. Status codes are mapped onto the
//! `storage/*` codes the web SDK reports so log lines look the same from
//! either client.

use super::object_store::{chunked_with_progress, ObjectStore, ProgressFn};
use crate::error::{Result, SecLoadError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Public Firebase Storage REST base
pub const DEFAULT_API_BASE: &str = "https://firebasestorage.googleapis.com/v0";

const CHUNK_SIZE: usize = 256 * 1024;

/// Firebase Storage bucket settings
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Bucket name, e.g. `my-project.appspot.com`
    pub bucket: String,
    /// REST base URL
    pub api_base: String,
    /// Firebase ID token or OAuth access token
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl FirebaseConfig {
    /// Settings for `bucket` against the public endpoint
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Point at another endpoint (emulator, test server)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the auth token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Firebase Storage implementation of [`ObjectStore`]
pub struct FirebaseStore {
    http: Client,
    config: FirebaseConfig,
    objects: Url,
}

impl FirebaseStore {
    /// Build the store
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(SecLoadError::config("storage bucket must not be empty"));
        }
        let mut objects = Url::parse(&config.api_base)
            .map_err(|e| SecLoadError::config(format!("invalid storage URL '{}': {}", config.api_base, e)))?;
        objects
            .path_segments_mut()
            .map_err(|_| SecLoadError::config("storage URL cannot be a base"))?
            .pop_if_empty()
            .extend(["b", config.bucket.as_str(), "o"]);

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("secload/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config,
            objects,
        })
    }

    fn object_url(&self, path: &str) -> Url {
        let mut url = self.objects.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            // the whole path is one segment, so '/' is percent-encoded
            segments.push(path);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.header("Authorization", format!("Firebase {}", token)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SecLoadError::storage("storage/network", e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SecLoadError::storage(status_code(status), error_message(status, &body)))
    }
}

/// Map an HTTP status onto a Firebase storage error code
pub fn status_code(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "storage/unauthenticated",
        403 => "storage/unauthorized",
        404 => "storage/object-not-found",
        408 => "storage/retry-limit-exceeded",
        429 => "storage/quota-exceeded",
        _ => "storage/unknown",
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if !body.trim().is_empty() => body.trim().chars().take(200).collect(),
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl ObjectStore for FirebaseStore {
    fn name(&self) -> &str {
        "firebase"
    }

    async fn put(&self, path: &str, data: &[u8], content_type: &str, progress: ProgressFn) -> Result<()> {
        let mut url = self.objects.clone();
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path);

        let body = reqwest::Body::wrap_stream(chunked_with_progress(data, CHUNK_SIZE, progress));
        tracing::debug!(bucket = %self.config.bucket, %path, bytes = data.len(), "media upload");
        self.send(
            self.http
                .post(url)
                .header("Content-Type", content_type)
                .body(body),
        )
        .await?;
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String> {
        let url = self.object_url(path);
        let response = self.send(self.http.get(url.clone())).await?;
        let metadata: ObjectMetadata = response
            .json()
            .await
            .map_err(|e| SecLoadError::storage("storage/unknown", format!("invalid metadata: {}", e)))?;

        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
            .ok_or_else(|| SecLoadError::storage("storage/no-download-url", format!("{} has no download token", path)))?;

        let mut download = url;
        download
            .query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(download.to_string())
    }
}
