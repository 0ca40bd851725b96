//! Native AWS S3 SDK integration
//!
//! S3 (or an S3-compatible endpoint such as MinIO) as an [`ObjectStore`].
//! Objects are written with a single `PutObject`; the returned URL is a
//! presigned GET. Retries are left to the uploader, so the SDK's own retry
//! layer is limited to one attempt.

use super::object_store::{ObjectStore, ProgressFn, UploadProgress};
use crate::error::{Result, SecLoadError};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;

/// Default lifetime of a presigned download URL: 7 days, the S3 maximum.
const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the native S3 client.
#[derive(Debug, Clone)]
pub struct NativeS3Config {
    /// Bucket objects are written to
    pub bucket: String,
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// Custom endpoint URL for S3-compatible services (MinIO, Wasabi)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for some S3-compatible services)
    pub force_path_style: bool,
    /// Access key ID (optional, falls back to AWS credential chain)
    pub access_key_id: Option<String>,
    /// Secret access key (optional, falls back to AWS credential chain)
    pub secret_access_key: Option<String>,
    /// Lifetime of presigned download URLs
    pub url_expiry: Duration,
}

impl NativeS3Config {
    /// Defaults for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            url_expiry: DEFAULT_URL_EXPIRY,
        }
    }
}

/// S3 implementation of [`ObjectStore`]
pub struct NativeS3Store {
    client: aws_sdk_s3::Client,
    config: NativeS3Config,
}

impl NativeS3Store {
    /// Create a new S3 store from configuration.
    pub async fn new(config: NativeS3Config) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(SecLoadError::config("storage bucket must not be empty"));
        }

        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(1));

        // Set custom endpoint for S3-compatible services
        if let Some(ref endpoint) = config.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        // Set explicit credentials if provided
        if let (Some(ref key_id), Some(ref secret)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let creds = aws_credential_types::Credentials::new(
                key_id,
                secret,
                None, // session token
                None, // expiry
                "secload-static",
            );
            aws_config_builder = aws_config_builder.credentials_provider(creds);
        }

        let aws_config = aws_config_builder.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config);
        if config.force_path_style {
            s3_config = s3_config.force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(s3_config.build());
        Ok(Self { client, config })
    }
}

/// Error code from SDK metadata, or a fallback when the service sent none
fn sdk_error<E: ProvideErrorMetadata + std::fmt::Display>(err: &E, operation: &str) -> SecLoadError {
    let code = err.code().unwrap_or("storage/unknown").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} failed: {}", operation, err));
    SecLoadError::storage(code, message)
}

#[async_trait]
impl ObjectStore for NativeS3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put(&self, path: &str, data: &[u8], content_type: &str, progress: ProgressFn) -> Result<()> {
        let total = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error(&e, "PutObject"))?;

        // single request; progress is reported once it completes
        progress(UploadProgress {
            transferred: total,
            total,
        });
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String> {
        let presigning = PresigningConfig::expires_in(self.config.url_expiry)
            .map_err(|e| SecLoadError::config(format!("invalid URL expiry: {}", e)))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| sdk_error(&e, "GetObject presign"))?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NativeS3Config::new("evidence");
        assert_eq!(config.bucket, "evidence");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.url_expiry, DEFAULT_URL_EXPIRY);
        assert!(!config.force_path_style);
    }

    #[tokio::test]
    async fn test_rejects_empty_bucket() {
        assert!(NativeS3Store::new(NativeS3Config::new("")).await.is_err());
    }

    #[tokio::test]
    async fn test_presigned_url_with_static_credentials() {
        let mut config = NativeS3Config::new("evidence");
        config.endpoint_url = Some("http://127.0.0.1:9000".to_string());
        config.force_path_style = true;
        config.access_key_id = Some("minio".to_string());
        config.secret_access_key = Some("minio123".to_string());

        let store = NativeS3Store::new(config).await.unwrap();
        let url = store.resolve_url("reports/a.pdf").await.unwrap();
        assert!(url.starts_with("http://127.0.0.1:9000/evidence/reports/a.pdf?"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
