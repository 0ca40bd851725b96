//! Configuration settings for secload
//!
//! Defines CLI arguments, the JSON config file, and the merged runtime
//! settings. Precedence: command-line flag, then environment variable,
//! then config file, then built-in default.

use crate::error::{IoResultExt, Result, SecLoadError};
use crate::ingest::DEFAULT_PAGE_SIZE;
use crate::storage::{FirebaseConfig, DEFAULT_API_BASE};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// secload - CSV ingestion and evidence upload for the security dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "secload")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate and import security data into the dashboard API")]
#[command(long_about = r#"
secload validates CSV exports against a collection schema and imports the
valid rows into the security dashboard's REST API, one request at a time.
It also uploads evidence files to object storage with bounded retry.

Examples:
  secload collections                                   # List collection schemas
  secload validate assets.csv -c assets                 # Report valid/rejected rows
  secload preview alerts.csv -c alerts --sort severity  # Show one page
  secload import iocs.csv -c iocs --api-url https://dash/api
  secload upload report.pdf scans/ --folder evidence --bucket demo.appspot.com
"#)]
pub struct CliArgs {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Show progress bars
    #[arg(short = 'p', long, global = true)]
    pub progress: bool,

    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// JSON config file with defaults
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard API base URL
    #[arg(long, env = "SECLOAD_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the API and storage
    #[arg(long, env = "SECLOAD_API_TOKEN", hide_env_values = true, value_name = "TOKEN", global = true)]
    pub token: Option<String>,

    /// Storage bucket
    #[arg(long, env = "SECLOAD_BUCKET", value_name = "NAME", global = true)]
    pub bucket: Option<String>,

    /// Per-request timeout (e.g. 30s, 2m)
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION", global = true)]
    pub timeout: Option<Duration>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Which schema to validate against
#[derive(clap::Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Built-in collection name
    #[arg(short = 'c', long, value_name = "NAME", required_unless_present = "schema")]
    pub collection: Option<String>,

    /// Custom collection schema (JSON)
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Field delimiter
    #[arg(short = 'd', long, default_value = ",", value_name = "CHAR")]
    pub delimiter: char,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List built-in collection schemas
    #[command(name = "collections")]
    Collections,

    /// Validate a CSV file and report rejected rows
    #[command(name = "validate")]
    Validate {
        /// CSV file
        file: PathBuf,
        /// Collection or schema file to validate against
        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Show one page of the valid rows
    #[command(name = "preview")]
    Preview {
        /// CSV file
        file: PathBuf,
        /// Collection or schema file to validate against
        #[command(flatten)]
        schema: SchemaArgs,
        /// Page to show, starting at 1
        #[arg(long, default_value = "1", value_name = "N")]
        page: usize,
        /// Rows per page
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
        /// Column to sort by
        #[arg(long, value_name = "COLUMN")]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Validate a CSV file and create one record per valid row
    #[command(name = "import")]
    Import {
        /// CSV file
        file: PathBuf,
        /// Collection or schema file to validate against
        #[command(flatten)]
        schema: SchemaArgs,
        /// Validate and count, but send nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Upload files to object storage
    #[command(name = "upload")]
    Upload {
        /// Files or directories to upload
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        /// Destination folder in the bucket
        #[arg(short = 'f', long, value_name = "FOLDER")]
        folder: String,
        /// Storage backend
        #[arg(long, value_enum, default_value = "firebase")]
        store: StoreKind,
        /// Root directory for the local backend
        #[arg(long, value_name = "DIR")]
        local_root: Option<PathBuf>,
        /// Refuse files larger than this (e.g. 25M)
        #[arg(long, value_parser = parse_size, value_name = "SIZE")]
        max_size: Option<u64>,
        /// Include hidden files when expanding directories
        #[arg(long)]
        include_hidden: bool,
    },

    /// Delete records from a collection by id
    #[command(name = "delete")]
    Delete {
        /// Built-in collection name
        #[arg(short = 'c', long, value_name = "NAME")]
        collection: String,
        /// Record ids
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
        /// List what would be deleted, but send nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Object storage backend
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Firebase Storage REST
    #[default]
    Firebase,
    /// Amazon S3 or compatible (needs the `native_s3` feature)
    S3,
    /// Local directory
    Local,
}

/// Defaults read from `--config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Dashboard API base URL
    pub api_url: Option<String>,
    /// Bearer token
    pub api_token: Option<String>,
    /// Storage bucket
    pub bucket: Option<String>,
    /// Firebase Storage REST base
    pub storage_api_base: Option<String>,
    /// Region for the S3 backend
    pub region: Option<String>,
    /// Endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Rows per preview page
    pub page_size: Option<usize>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&text)
            .map_err(|e| SecLoadError::config(format!("{}: {}", path.display(), e)))
    }
}

/// Runtime configuration derived from CLI args and the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    /// Dashboard API base URL
    pub api_url: Option<String>,
    /// Bearer token
    pub token: Option<String>,
    /// Storage bucket
    pub bucket: Option<String>,
    /// Firebase Storage REST base
    pub storage_api_base: String,
    /// Region for the S3 backend
    pub region: String,
    /// Endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Rows per preview page
    pub page_size: usize,
    /// Request timeout
    pub timeout: Duration,
    /// Verbosity level
    pub verbose: u8,
    /// Quiet mode
    pub quiet: bool,
    /// Show progress bars
    pub progress: bool,
    /// Report format
    pub output_format: OutputFormat,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            bucket: None,
            storage_api_base: DEFAULT_API_BASE.to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(30),
            verbose: 0,
            quiet: false,
            progress: false,
            output_format: OutputFormat::Text,
        }
    }
}

impl LoadConfig {
    /// Create config from CLI arguments, reading `--config` when given
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// Merge CLI arguments over file defaults
    pub fn merge(args: &CliArgs, file: FileConfig) -> Result<Self> {
        let defaults = Self::default();
        let page_size = file.page_size.unwrap_or(defaults.page_size);
        if page_size == 0 {
            return Err(SecLoadError::config("page_size must be at least 1"));
        }

        Ok(Self {
            api_url: args.api_url.clone().or(file.api_url),
            token: args.token.clone().or(file.api_token),
            bucket: args.bucket.clone().or(file.bucket),
            storage_api_base: file.storage_api_base.unwrap_or(defaults.storage_api_base),
            region: file.region.unwrap_or(defaults.region),
            endpoint_url: file.endpoint_url,
            page_size,
            timeout: args
                .timeout
                .or(file.timeout_secs.map(Duration::from_secs))
                .unwrap_or(defaults.timeout),
            verbose: args.verbose,
            quiet: args.quiet,
            progress: args.progress && !args.quiet,
            output_format: args.output_format,
        })
    }

    /// API URL, or a config error naming the flag
    pub fn require_api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .ok_or_else(|| SecLoadError::config("API URL required (--api-url or SECLOAD_API_URL)"))
    }

    /// Bucket, or a config error naming the flag
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| SecLoadError::config("storage bucket required (--bucket or SECLOAD_BUCKET)"))
    }

    /// Firebase Storage settings for this run
    pub fn firebase_config(&self) -> Result<FirebaseConfig> {
        Ok(FirebaseConfig::new(self.require_bucket()?)
            .with_api_base(self.storage_api_base.clone())
            .with_token(self.token.clone())
            .with_timeout(self.timeout))
    }

    /// Human-readable settings, token masked
    pub fn describe(&self) -> Vec<String> {
        vec![
            "=== Configuration ===".to_string(),
            format!("API URL:     {}", self.api_url.as_deref().unwrap_or("(unset)")),
            format!("Token:       {}", if self.token.is_some() { "(set)" } else { "(unset)" }),
            format!("Bucket:      {}", self.bucket.as_deref().unwrap_or("(unset)")),
            format!("Storage API: {}", self.storage_api_base),
            format!("Page size:   {}", self.page_size),
            format!("Timeout:     {}", humantime::format_duration(self.timeout)),
        ]
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(['G', 'B']), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(['M', 'B']), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(['K', 'B']), 1024u64)
    } else {
        // Assume bytes if no suffix
        (size.trim_end_matches('B'), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;
    if num < 0.0 {
        return Err(format!("Negative size: {}", size));
    }

    Ok((num * multiplier as f64) as u64)
}
