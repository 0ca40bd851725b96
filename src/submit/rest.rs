//! REST API client
//!
//! `GET/POST {base}/{endpoint}` and `PUT/DELETE {base}/{endpoint}/{id}`,
//! with an optional bearer token. Requests are never retried here; callers
//! decide what a failure means.

use super::sink::{Record, RecordSink};
use crate::error::{Result, SecLoadError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Longest error body kept in an API error message
const MAX_ERROR_BODY: usize = 200;

/// REST client configuration
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// API base URL, e.g. `https://dashboard.example.com/api`
    pub base_url: Url,
    /// Bearer token
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RestConfig {
    /// Parse the base URL and apply defaults
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SecLoadError::config(format!("invalid API URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(SecLoadError::config(format!(
                "API URL must be http(s): {}",
                base_url
            )));
        }
        Ok(Self {
            base_url,
            token: None,
            timeout: Duration::from_secs(30),
        })
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP implementation of [`RecordSink`]
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    config: RestConfig,
}

impl RestClient {
    /// Build the client
    pub fn new(config: RestConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("secload/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Base URL requests are made against
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// URL of a collection, or of one record when `id` is given
    pub fn url_for(&self, endpoint: &str, id: Option<&str>) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SecLoadError::config("API URL cannot be a base"))?;
            segments.pop_if_empty();
            segments.extend(endpoint.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            truncate(body.trim(), MAX_ERROR_BODY)
        };
        Err(SecLoadError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json_body(response: Response) -> Result<Value> {
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| SecLoadError::Http(format!("invalid JSON response: {}", e)))
    }
}

#[async_trait]
impl RecordSink for RestClient {
    async fn list(&self, endpoint: &str) -> Result<Vec<Value>> {
        let url = self.url_for(endpoint, None)?;
        let response = self.send(self.http.get(url)).await?;
        match Self::json_body(response).await? {
            Value::Array(items) => Ok(items),
            Value::Object(mut object) => match object.remove("data").or_else(|| object.remove("items")) {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(SecLoadError::Http(
                    "list response has no data array".to_string(),
                )),
            },
            Value::Null => Ok(Vec::new()),
            _ => Err(SecLoadError::Http("list response is not an array".to_string())),
        }
    }

    async fn create(&self, endpoint: &str, record: &Record) -> Result<Value> {
        let url = self.url_for(endpoint, None)?;
        tracing::debug!(%url, "create record");
        let response = self.send(self.http.post(url).json(record)).await?;
        Self::json_body(response).await
    }

    async fn update(&self, endpoint: &str, id: &str, record: &Record) -> Result<Value> {
        let url = self.url_for(endpoint, Some(id))?;
        tracing::debug!(%url, "update record");
        let response = self.send(self.http.put(url).json(record)).await?;
        Self::json_body(response).await
    }

    async fn delete(&self, endpoint: &str, id: &str) -> Result<()> {
        let url = self.url_for(endpoint, Some(id))?;
        tracing::debug!(%url, "delete record");
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, put},
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_api() -> String {
        async fn create(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer s3cret") {
                return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
            }
            if body["hostname"] == "reject-me" {
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": "hostname taken"})));
            }
            let mut stored = body.clone();
            stored["id"] = json!("a1");
            (StatusCode::CREATED, Json(stored))
        }

        async fn list() -> Json<Value> {
            Json(json!({"data": [{"id": "a1"}, {"id": "a2"}]}))
        }

        async fn replace(Path(id): Path<String>, Json(mut body): Json<Value>) -> Json<Value> {
            body["id"] = json!(id);
            Json(body)
        }

        async fn remove(Path(id): Path<String>) -> StatusCode {
            if id == "missing" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::NO_CONTENT
            }
        }

        let app = Router::new()
            .route("/api/assets", get(list).post(create))
            .route("/api/assets/:id", put(replace).delete(remove));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/api", addr)
    }

    fn client(base: &str, token: Option<&str>) -> RestClient {
        let config = RestConfig::new(base)
            .unwrap()
            .with_token(token.map(str::to_string));
        RestClient::new(config).unwrap()
    }

    fn record(hostname: &str) -> Record {
        let mut record = Record::new();
        record.insert("hostname".to_string(), json!(hostname));
        record
    }

    #[test]
    fn test_url_building() {
        let client = client("https://dash.example.com/api/", None);
        assert_eq!(
            client.url_for("/assets/", None).unwrap().as_str(),
            "https://dash.example.com/api/assets"
        );
        assert_eq!(
            client.url_for("assets", Some("a b/c")).unwrap().as_str(),
            "https://dash.example.com/api/assets/a%20b%2Fc"
        );
    }

    #[test]
    fn test_config_rejects_non_http() {
        assert!(RestConfig::new("ftp://example.com").is_err());
        assert!(RestConfig::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_create_sends_bearer_and_returns_body() {
        let base = spawn_api().await;
        let created = client(&base, Some("s3cret"))
            .create("assets", &record("web-01"))
            .await
            .unwrap();
        assert_eq!(created["id"], json!("a1"));
        assert_eq!(created["hostname"], json!("web-01"));
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_api_error() {
        let base = spawn_api().await;
        let err = client(&base, Some("s3cret"))
            .create("assets", &record("reject-me"))
            .await
            .unwrap_err();
        match err {
            SecLoadError::Api { status, message } => {
                assert_eq!(status, 422);
                assert!(message.contains("hostname taken"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = client(&base, None).create("assets", &record("web-01")).await.unwrap_err();
        assert!(matches!(err, SecLoadError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_list_update_delete() {
        let base = spawn_api().await;
        let client = client(&base, None);

        let items = client.list("assets").await.unwrap();
        assert_eq!(items.len(), 2);

        let updated = client.update("assets", "a2", &record("web-02")).await.unwrap();
        assert_eq!(updated["id"], json!("a2"));

        client.delete("assets", "a1").await.unwrap();
        let err = client.delete("assets", "missing").await.unwrap_err();
        assert!(matches!(err, SecLoadError::Api { status: 404, .. }));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
