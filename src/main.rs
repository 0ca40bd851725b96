//! secload CLI - Security Data Ingestion Utility
//!
//! Validates CSV exports, imports them into the dashboard API and uploads
//! evidence files to object storage.

use clap::Parser;
use console::style;
use secload::config::{CliArgs, Commands, LoadConfig, OutputFormat, SchemaArgs, StoreKind};
use secload::error::{Result, SecLoadError};
use secload::ingest::{CsvParser, IngestReport, ParsedCsv, RowTable, SortDirection, TableRow, ValidRow};
use secload::progress::ProgressReporter;
use secload::schema::{Collection, CollectionSchema, SchemaRegistry};
use secload::storage::{collect_files, FirebaseStore, LocalStore, ObjectStore, Uploader};
use secload::submit::{BulkSubmitter, RestClient, RestConfig, SubmitReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Widest cell printed by `preview`
const MAX_CELL_WIDTH: usize = 32;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_logging(&args);

    // Handle result
    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &CliArgs) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,secload={}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Returns `Ok(false)` when the command ran but some rows or files failed
fn run(args: CliArgs) -> Result<bool> {
    let config = LoadConfig::from_cli(&args)?;

    // Print configuration if verbose
    if config.verbose > 1 {
        print_config(&config);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SecLoadError::config(format!("Failed to create runtime: {}", e)))?;

    let registry = SchemaRegistry::builtin();
    match &args.command {
        Commands::Collections => cmd_collections(&registry, &config),
        Commands::Validate { file, schema } => cmd_validate(&registry, &config, file, schema),
        Commands::Preview {
            file,
            schema,
            page,
            page_size,
            sort,
            desc,
        } => cmd_preview(
            &registry,
            &config,
            file,
            schema,
            PreviewOptions {
                page: *page,
                page_size: page_size.unwrap_or(config.page_size),
                sort: sort.as_deref(),
                descending: *desc,
            },
        ),
        Commands::Import { file, schema, dry_run } => {
            rt.block_on(cmd_import(&registry, &config, file, schema, *dry_run))
        }
        Commands::Upload {
            paths,
            folder,
            store,
            local_root,
            max_size,
            include_hidden,
        } => rt.block_on(cmd_upload(
            &config,
            paths,
            folder,
            *store,
            local_root.as_deref(),
            *max_size,
            *include_hidden,
        )),
        Commands::Delete {
            collection,
            ids,
            dry_run,
        } => rt.block_on(cmd_delete(&registry, &config, collection, ids, *dry_run)),
    }
}

fn cmd_collections(registry: &SchemaRegistry, config: &LoadConfig) -> Result<bool> {
    if config.output_format == OutputFormat::Json {
        let schemas: Vec<&CollectionSchema> = registry.iter().map(|c| &c.schema).collect();
        print_json(&schemas)?;
        return Ok(true);
    }

    for collection in registry.iter() {
        let schema = &collection.schema;
        println!("{} (/{})", style(&schema.name).bold(), schema.endpoint);
        println!("  required: {}", schema.required_fields().join(", "));
        let optional: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| !f.required)
            .map(|f| f.name.as_str())
            .collect();
        if !optional.is_empty() {
            println!("  optional: {}", optional.join(", "));
        }
        if !schema.composite_key.is_empty() {
            println!("  key:      {}", schema.composite_key.join(" + "));
        }
    }
    Ok(true)
}

fn load_collection(registry: &SchemaRegistry, args: &SchemaArgs) -> Result<Collection> {
    if let Some(path) = &args.schema {
        return Ok(Collection::new(CollectionSchema::load(path)?));
    }
    let name = args
        .collection
        .as_deref()
        .ok_or_else(|| SecLoadError::config("--collection or --schema required"))?;
    Ok(registry.get(name)?.clone())
}

fn parse_csv(file: &Path, delimiter: char) -> Result<ParsedCsv> {
    if !delimiter.is_ascii() {
        return Err(SecLoadError::config(format!("delimiter '{}' is not ASCII", delimiter)));
    }
    CsvParser::new().with_delimiter(delimiter as u8).parse_path(file)
}

fn validate_file(
    registry: &SchemaRegistry,
    file: &Path,
    args: &SchemaArgs,
) -> Result<(Collection, ParsedCsv, IngestReport)> {
    let collection = load_collection(registry, args)?;
    let parsed = parse_csv(file, args.delimiter)?;
    let report = collection.validator().validate(&parsed)?;
    Ok((collection, parsed, report))
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    collection: &'a str,
    total: usize,
    valid: usize,
    rejected: &'a [secload::ingest::RejectedRow],
}

fn cmd_validate(registry: &SchemaRegistry, config: &LoadConfig, file: &Path, args: &SchemaArgs) -> Result<bool> {
    let (collection, _, report) = validate_file(registry, file, args)?;

    match config.output_format {
        OutputFormat::Json => print_json(&ValidationOutput {
            collection: &collection.schema.name,
            total: report.total(),
            valid: report.valid.len(),
            rejected: &report.rejected,
        })?,
        OutputFormat::Text if !config.quiet => report.print_summary(),
        OutputFormat::Text => {}
    }
    Ok(report.is_clean())
}

struct PreviewOptions<'a> {
    page: usize,
    page_size: usize,
    sort: Option<&'a str>,
    descending: bool,
}

fn cmd_preview(
    registry: &SchemaRegistry,
    config: &LoadConfig,
    file: &Path,
    args: &SchemaArgs,
    options: PreviewOptions<'_>,
) -> Result<bool> {
    let (collection, parsed, report) = validate_file(registry, file, args)?;
    let rejected = report.rejected.len();

    let mut table = RowTable::new(report.valid, options.page_size)?;
    if let Some(column) = options.sort {
        let direction = if options.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        table.sort_by(column, direction);
    }
    table.set_page(options.page.saturating_sub(1));

    if config.output_format == OutputFormat::Json {
        let payloads: Vec<_> = table.current_rows().iter().map(|r| &r.payload).collect();
        print_json(&payloads)?;
        return Ok(true);
    }

    let columns: Vec<&str> = collection
        .schema
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .filter(|name| parsed.has_header(name))
        .collect();
    print_table(&columns, table.current_rows());
    println!(
        "\nPage {} of {} ({} valid rows, {} rejected)",
        if table.page_count() == 0 { 0 } else { table.current_page() + 1 },
        table.page_count(),
        table.len(),
        rejected
    );
    Ok(true)
}

fn print_table(columns: &[&str], rows: &[ValidRow]) {
    let clip = |text: &str| -> String {
        if text.chars().count() > MAX_CELL_WIDTH {
            let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
            format!("{}…", cut)
        } else {
            text.to_string()
        }
    };

    let widths: Vec<usize> = columns
        .iter()
        .map(|column| {
            rows.iter()
                .map(|r| clip(r.cell(column).unwrap_or("")).chars().count())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect();
    println!("{:>5}  {}", style("row").bold(), style(header.join("  ")).bold());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", clip(row.cell(c).unwrap_or("")), width = *w))
            .collect();
        println!("{:>5}  {}", row.line(), cells.join("  "));
    }
}

fn rest_client(config: &LoadConfig) -> Result<RestClient> {
    let rest = RestConfig::new(config.require_api_url()?)?
        .with_token(config.token.clone())
        .with_timeout(config.timeout);
    RestClient::new(rest)
}

fn progress_reporter(config: &LoadConfig) -> ProgressReporter {
    if config.progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    }
}

async fn cmd_import(
    registry: &SchemaRegistry,
    config: &LoadConfig,
    file: &Path,
    args: &SchemaArgs,
    dry_run: bool,
) -> Result<bool> {
    let (collection, _, report) = validate_file(registry, file, args)?;
    let client = rest_client(config)?;

    if dry_run && !config.quiet && config.output_format == OutputFormat::Text {
        println!("=== Dry Run Mode ===");
        println!("No records will be created.");
        println!();
    }

    let progress = progress_reporter(config);
    let outcome = BulkSubmitter::new(&client, collection.schema.endpoint.as_str())
        .with_progress(&progress)
        .dry_run(dry_run)
        .submit_all(&report.valid)
        .await;

    print_outcome(config, Some(&report), &outcome)?;
    Ok(report.is_clean() && outcome.is_success())
}

async fn cmd_delete(
    registry: &SchemaRegistry,
    config: &LoadConfig,
    collection: &str,
    ids: &[String],
    dry_run: bool,
) -> Result<bool> {
    let collection = registry.get(collection)?;
    let client = rest_client(config)?;
    let progress = progress_reporter(config);

    let outcome = BulkSubmitter::new(&client, collection.schema.endpoint.as_str())
        .with_progress(&progress)
        .dry_run(dry_run)
        .delete_selected(ids)
        .await;

    print_outcome(config, None, &outcome)?;
    Ok(outcome.is_success())
}

#[derive(Serialize)]
struct ImportOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<&'a [secload::ingest::RejectedRow]>,
    submit: &'a SubmitReport,
}

fn print_outcome(config: &LoadConfig, report: Option<&IngestReport>, outcome: &SubmitReport) -> Result<()> {
    match config.output_format {
        OutputFormat::Json => print_json(&ImportOutput {
            rejected: report.map(|r| r.rejected.as_slice()),
            submit: outcome,
        }),
        OutputFormat::Text => {
            if !config.quiet {
                if let Some(report) = report.filter(|r| !r.is_clean()) {
                    report.print_summary();
                }
                outcome.print_summary();
            }
            Ok(())
        }
    }
}

async fn open_store(
    config: &LoadConfig,
    kind: StoreKind,
    local_root: Option<&Path>,
) -> Result<Box<dyn ObjectStore>> {
    match kind {
        StoreKind::Firebase => {
            Ok(Box::new(FirebaseStore::new(config.firebase_config()?)?))
        }
        StoreKind::Local => {
            let root = local_root.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("uploads"));
            Ok(Box::new(LocalStore::new(root)))
        }
        #[cfg(feature = "native_s3")]
        StoreKind::S3 => {
            use secload::storage::native_s3::{NativeS3Config, NativeS3Store};
            let mut s3 = NativeS3Config::new(config.require_bucket()?);
            s3.region = config.region.clone();
            s3.endpoint_url = config.endpoint_url.clone();
            s3.force_path_style = config.endpoint_url.is_some();
            Ok(Box::new(NativeS3Store::new(s3).await?))
        }
        #[cfg(not(feature = "native_s3"))]
        StoreKind::S3 => Err(SecLoadError::config(
            "S3 support not compiled in (rebuild with --features native_s3)",
        )),
    }
}

async fn cmd_upload(
    config: &LoadConfig,
    paths: &[PathBuf],
    folder: &str,
    kind: StoreKind,
    local_root: Option<&Path>,
    max_size: Option<u64>,
    include_hidden: bool,
) -> Result<bool> {
    if folder.trim_matches('/').is_empty() {
        return Err(SecLoadError::config("upload folder must not be empty"));
    }
    let files = collect_files(paths, include_hidden)?;
    if files.is_empty() {
        return Err(SecLoadError::config("no files to upload"));
    }

    let store = open_store(config, kind, local_root).await?;
    tracing::info!(store = store.name(), files = files.len(), %folder, "starting upload");

    let progress = Arc::new(progress_reporter(config));
    let report = Uploader::new(store.as_ref())
        .with_progress(Arc::clone(&progress))
        .with_max_size(max_size)
        .upload_all(folder, &files)
        .await;

    match config.output_format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text if !config.quiet => report.print_summary(),
        OutputFormat::Text => {}
    }
    if config.verbose > 0 && !config.quiet {
        progress.summary().print();
    }
    Ok(report.is_success())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SecLoadError::config(format!("failed to render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_config(config: &LoadConfig) {
    for line in config.describe() {
        eprintln!("{}", line);
    }
    eprintln!();
}
