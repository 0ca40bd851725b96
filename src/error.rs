//! Error types for SecLoad
//!
//! This module defines all error types used throughout the crate,
//! providing detailed error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for SecLoad operations
#[derive(Error, Debug)]
pub enum SecLoadError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Malformed delimited text
    #[error("CSV error: {0}")]
    Csv(String),

    /// The input had no header row
    #[error("CSV file is empty")]
    EmptyFile,

    /// Required headers are absent from the header row
    #[error("Missing required headers: {}", missing.join(", "))]
    MissingHeaders {
        /// Header names not found, in schema order
        missing: Vec<String>,
    },

    /// A field value could not be coerced to its declared type
    #[error("Invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidField {
        /// Column name
        field: String,
        /// Raw cell text
        value: String,
        /// Description of the accepted form
        expected: String,
    },

    /// Collection schema is inconsistent
    #[error("Schema error: {0}")]
    Schema(String),

    /// No schema registered under this name
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The REST API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or status reason
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Object store rejected or failed a single operation
    #[error("Storage error [{code}]: {message}")]
    Storage {
        /// Provider error code, e.g. `storage/unauthorized`
        code: String,
        /// Provider message
        message: String,
    },

    /// Upload gave up after exhausting its attempts
    #[error("Upload failed after {attempts} attempts (last error code: {code}): {message}")]
    UploadFailed {
        /// Attempts made
        attempts: u32,
        /// Provider code of the last failure
        code: String,
        /// Message of the last failure
        message: String,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done
        context: String,
        /// Wrapped error
        #[source]
        source: Box<SecLoadError>,
    },
}

impl SecLoadError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a storage error carrying a provider error code
    pub fn storage(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Http(_) | Self::Storage { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Provider error code for diagnostics, if the error carries one
    pub fn provider_code(&self) -> String {
        match self {
            Self::Storage { code, .. } | Self::UploadFailed { code, .. } => code.clone(),
            Self::Api { status, .. } => status.to_string(),
            Self::Http(_) => "network".to_string(),
            Self::Io { source, .. } => format!("io/{:?}", source.kind()).to_lowercase(),
            Self::WithContext { source, .. } => source.provider_code(),
            _ => "unknown".to_string(),
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::NotFound(path) => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for SecLoad operations
pub type Result<T> = std::result::Result<T, SecLoadError>;

impl From<std::io::Error> for SecLoadError {
    fn from(err: std::io::Error) -> Self {
        SecLoadError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<csv::Error> for SecLoadError {
    fn from(err: csv::Error) -> Self {
        SecLoadError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for SecLoadError {
    fn from(err: serde_json::Error) -> Self {
        SecLoadError::Schema(err.to_string())
    }
}

impl From<reqwest::Error> for SecLoadError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SecLoadError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SecLoadError::Http(err.to_string()),
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| SecLoadError::io(path, e))
    }
}
