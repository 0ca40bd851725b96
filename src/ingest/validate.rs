//! Row validation against a collection schema
//!
//! One [`Validator`] replaces per-page validation code: required headers,
//! required values, type coercion and duplicate keys come from the
//! [`CollectionSchema`]; anything collection-specific is a caller predicate.
//!
//! Invalid rows are dropped from the submission candidates and reported with
//! a reason. Valid rows keep their file order.

use super::row::{CsvRow, ParsedCsv};
use crate::error::{Result, SecLoadError};
use crate::schema::CollectionSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of validating a single row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowValidation {
    /// Row is acceptable
    pub valid: bool,
    /// Reason when not valid
    pub error: Option<String>,
}

impl RowValidation {
    /// Accept the row
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// Reject the row
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }
}

/// Caller-supplied per-row check
pub type RowPredicate = Arc<dyn Fn(&CsvRow) -> RowValidation + Send + Sync>;

/// A row that passed validation, with its API payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidRow {
    /// Source row
    pub row: CsvRow,
    /// Typed JSON object sent to the API
    pub payload: Map<String, Value>,
}

impl ValidRow {
    /// Data row number in the source file
    pub fn line(&self) -> usize {
        self.row.line
    }
}

/// A row excluded from submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Data row number in the source file
    pub line: usize,
    /// Why it was rejected
    pub reason: String,
}

/// Validation result for one file
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Submission candidates, in file order
    pub valid: Vec<ValidRow>,
    /// Excluded rows, in file order
    pub rejected: Vec<RejectedRow>,
}

impl IngestReport {
    /// Total rows examined
    pub fn total(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }

    /// True when no row was rejected
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Validation Summary ===");
        println!("Rows examined:   {}", self.total());
        println!("Valid:           {}", self.valid.len());
        println!("Rejected:        {}", self.rejected.len());

        if !self.rejected.is_empty() {
            println!("\nRejected rows:");
            for rejected in &self.rejected {
                println!("  row {} - {}", rejected.line, rejected.reason);
            }
        }
    }
}

/// Schema-driven row validator
#[derive(Clone)]
pub struct Validator {
    schema: CollectionSchema,
    predicate: Option<RowPredicate>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("schema", &self.schema.name)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Validator {
    /// Validator for a schema with no extra predicate
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            predicate: None,
        }
    }

    /// Attach a caller predicate, run after type coercion
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CsvRow) -> RowValidation + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Attach a shared predicate
    pub fn with_shared_predicate(mut self, predicate: RowPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Schema this validator enforces
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Validate a parsed file.
    ///
    /// Fails as a whole only when the file has no header row or lacks a
    /// required header; every other problem is reported per row.
    pub fn validate(&self, parsed: &ParsedCsv) -> Result<IngestReport> {
        if parsed.headers.is_empty() {
            return Err(SecLoadError::EmptyFile);
        }

        let missing: Vec<String> = self
            .schema
            .required_fields()
            .into_iter()
            .filter(|name| !parsed.has_header(name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SecLoadError::MissingHeaders { missing });
        }

        let unknown: Vec<&str> = parsed
            .headers
            .iter()
            .filter(|h| !h.is_empty() && self.schema.get(h).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            tracing::debug!(collection = %self.schema.name, ?unknown, "ignoring columns not in schema");
        }

        let mut report = IngestReport::default();
        let mut seen_keys = HashSet::new();

        for row in &parsed.rows {
            match self.validate_row(row) {
                Ok(payload) => {
                    if let Some(key) = self.composite_key(row) {
                        if !seen_keys.insert(key.clone()) {
                            report.rejected.push(RejectedRow {
                                line: row.line,
                                reason: format!(
                                    "duplicate key ({}) = ({})",
                                    self.schema.composite_key.join(", "),
                                    key.join(", ")
                                ),
                            });
                            continue;
                        }
                    }
                    report.valid.push(ValidRow {
                        row: row.clone(),
                        payload,
                    });
                }
                Err(reason) => report.rejected.push(RejectedRow {
                    line: row.line,
                    reason,
                }),
            }
        }

        tracing::info!(
            collection = %self.schema.name,
            valid = report.valid.len(),
            rejected = report.rejected.len(),
            "validated csv"
        );
        Ok(report)
    }

    /// Validate one row, returning its payload or the rejection reason
    pub fn validate_row(&self, row: &CsvRow) -> std::result::Result<Map<String, Value>, String> {
        let mut payload = Map::new();

        for field in &self.schema.fields {
            match row.non_empty(&field.name) {
                Some(raw) => match field.kind.coerce(raw) {
                    Some(value) => {
                        payload.insert(field.json_key().to_string(), value);
                    }
                    None => {
                        return Err(SecLoadError::invalid_field(
                            &field.name,
                            raw.trim(),
                            field.kind.describe(),
                        )
                        .to_string())
                    }
                },
                None if field.required => {
                    return Err(format!("missing required value for '{}'", field.name))
                }
                None => {}
            }
        }

        if let Some(predicate) = &self.predicate {
            let verdict = predicate(row);
            if !verdict.valid {
                return Err(verdict
                    .error
                    .unwrap_or_else(|| "rejected by row check".to_string()));
            }
        }

        Ok(payload)
    }

    fn composite_key(&self, row: &CsvRow) -> Option<Vec<String>> {
        if self.schema.composite_key.is_empty() {
            return None;
        }
        Some(
            self.schema
                .composite_key
                .iter()
                .map(|column| {
                    row.get(column)
                        .map(|v| v.trim().to_lowercase())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }
}
