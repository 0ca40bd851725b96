//! Collection schemas
//!
//! A [`CollectionSchema`] names a REST collection, the CSV columns it
//! accepts, and the columns that together identify a record.

use super::field::FieldSpec;
use crate::error::{IoResultExt, Result, SecLoadError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Schema of one security-reporting collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name used on the command line
    pub name: String,
    /// REST endpoint path, relative to the API base URL
    pub endpoint: String,
    /// Accepted columns
    pub fields: Vec<FieldSpec>,
    /// Columns whose combined values must be unique within one file
    #[serde(default)]
    pub composite_key: Vec<String>,
}

impl CollectionSchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            fields: Vec::new(),
            composite_key: Vec::new(),
        }
    }

    /// Append a field
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Set the composite key
    pub fn key(mut self, columns: &[&str]) -> Self {
        self.composite_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Look up a field by header name
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of required fields, in declaration order
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Check the schema is self-consistent
    pub fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SecLoadError::Schema("collection name is empty".to_string()));
        }
        if self.endpoint.trim_matches('/').is_empty() {
            return Err(SecLoadError::Schema(format!(
                "collection '{}' has no endpoint",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(SecLoadError::Schema(format!(
                "collection '{}' declares no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SecLoadError::Schema(format!(
                    "field '{}' declared twice in '{}'",
                    field.name, self.name
                )));
            }
        }

        for column in &self.composite_key {
            if self.get(column).is_none() {
                return Err(SecLoadError::Schema(format!(
                    "composite key column '{}' is not a field of '{}'",
                    column, self.name
                )));
            }
        }

        Ok(())
    }

    /// Parse and check a schema from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(text)?;
        schema.check()?;
        Ok(schema)
    }

    /// Load a schema from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        Self::from_json_str(&text).map_err(|e| e.with_context(format!("schema {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldKind;

    fn sample() -> CollectionSchema {
        CollectionSchema::new("hosts", "hosts")
            .field(FieldSpec::required("hostname", FieldKind::Text))
            .field(FieldSpec::new("ip", FieldKind::IpAddress))
            .field(FieldSpec::required("bu", FieldKind::Text))
            .key(&["hostname", "bu"])
    }

    #[test]
    fn test_required_fields_in_order() {
        assert_eq!(sample().required_fields(), vec!["hostname", "bu"]);
        assert!(sample().check().is_ok());
    }

    #[test]
    fn test_check_rejects_unknown_key_column() {
        let schema = sample().key(&["serial"]);
        assert!(matches!(schema.check(), Err(SecLoadError::Schema(_))));
    }

    #[test]
    fn test_check_rejects_duplicate_field() {
        let schema = sample().field(FieldSpec::new("bu", FieldKind::Text));
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        std::fs::write(
            &path,
            r#"{
                "name": "hosts",
                "endpoint": "/hosts",
                "fields": [
                    {"name": "hostname", "required": true},
                    {"name": "ip", "kind": "ip_address"}
                ],
                "composite_key": ["hostname"]
            }"#,
        )
        .unwrap();

        let schema = CollectionSchema::load(&path).unwrap();
        assert_eq!(schema.required_fields(), vec!["hostname"]);
        assert_eq!(schema.get("ip").unwrap().kind, FieldKind::IpAddress);
    }

    #[test]
    fn test_load_missing_file_carries_path() {
        let err = CollectionSchema::load(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(err.path().is_some());
    }
}
