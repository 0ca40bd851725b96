//! Record sink abstraction
//!
//! The REST API is an external collaborator. Everything that writes records
//! goes through [`RecordSink`] so bulk loops can be exercised without a
//! server.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// JSON object sent as a record body
pub type Record = Map<String, Value>;

/// CRUD operations on a collection endpoint
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// List records of a collection
    async fn list(&self, endpoint: &str) -> Result<Vec<Value>>;

    /// Create one record; returns the stored representation
    async fn create(&self, endpoint: &str, record: &Record) -> Result<Value>;

    /// Replace one record
    async fn update(&self, endpoint: &str, id: &str, record: &Record) -> Result<Value>;

    /// Delete one record
    async fn delete(&self, endpoint: &str, id: &str) -> Result<()>;
}
