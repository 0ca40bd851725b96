//! # secload - Security Data Ingestion for the Dashboard API
//!
//! secload turns CSV exports (asset inventories, compliance scores, threat
//! breakdowns, alerts, IOCs, vulnerabilities) into records in the security
//! dashboard's REST API, and uploads evidence files to object storage.
//!
//! ## Features
//!
//! - **Schema-driven validation**: required headers, typed columns and
//!   duplicate keys per collection, plus collection-specific row checks
//! - **Partial-failure tolerance**: bad rows are reported, good rows go on
//! - **Sequential submission**: one request at a time, "N succeeded, M failed"
//! - **Paging and selection**: sort, page and pick rows for bulk actions
//! - **Upload retry**: 3 attempts, 1 s apart, provider error codes logged
//!
//! ## Quick Start
//!
//! ```no_run
//! use secload::prelude::*;
//!
//! # async fn run() -> secload::Result<()> {
//! let registry = SchemaRegistry::builtin();
//! let parsed = CsvParser::new().parse_path(std::path::Path::new("assets.csv"))?;
//! let report = registry.get("assets")?.validator().validate(&parsed)?;
//!
//! let client = RestClient::new(RestConfig::new("https://dash.example.com/api")?)?;
//! let outcome = BulkSubmitter::new(&client, "assets").submit_all(&report.valid).await;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Uploading Evidence
//!
//! ```no_run
//! use secload::storage::{LocalStore, Uploader};
//!
//! # async fn run() -> secload::Result<()> {
//! let store = LocalStore::new("/var/lib/secload/bucket");
//! let object = Uploader::new(&store)
//!     .upload("evidence", "scan.png", b"...", None)
//!     .await?;
//! println!("{} -> {}", object.path, object.url);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod progress;
pub mod schema;
pub mod storage;
pub mod submit;

// Re-export commonly used types
pub use config::{CliArgs, LoadConfig};
pub use error::{Result, SecLoadError};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use secload::prelude::*;
    //! ```

    pub use crate::error::{Result, SecLoadError};
    pub use crate::ingest::{
        CsvParser, CsvRow, IngestReport, RowTable, RowValidation, Selection, SortDirection, ValidRow, Validator,
    };
    pub use crate::progress::ProgressReporter;
    pub use crate::schema::{CollectionSchema, FieldKind, FieldSpec, SchemaRegistry};
    pub use crate::storage::{FirebaseConfig, FirebaseStore, LocalStore, ObjectStore, RetryPolicy, Uploader};
    pub use crate::submit::{BulkSubmitter, RecordSink, RestClient, RestConfig, SubmitReport};
}
