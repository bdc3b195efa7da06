//! pdf-harvester main entry point
//!
//! This is the command-line interface for downloading and processing PDFs.

use anyhow::Context;
use clap::{ArgGroup, Parser};
use pdf_harvester::config::{load_config_with_hash, Config};
use pdf_harvester::output::{
    load_statistics, print_batch_report, print_documents, print_statistics,
};
use pdf_harvester::storage::{DocumentFilter, Storage, StoreHandle};
use pdf_harvester::{BatchReport, Coordinator, DocumentStatus, Manifest};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// pdf-harvester: resilient PDF acquisition and metadata extraction
///
/// Downloads the PDFs listed in a JSON manifest (or picks up a directory of
/// PDFs), extracts their text, ranks keywords, and records every document's
/// progress in SQLite so interrupted batches resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "pdf-harvester")]
#[command(version)]
#[command(about = "Resilient PDF acquisition and metadata extraction", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["manifest", "directory", "stats", "list"])
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Download and process the documents listed in this JSON manifest
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Process every PDF already present in this directory
    #[arg(long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// List stored documents and exit
    #[arg(long)]
    list: bool,

    /// Only list documents with this status (pending, processing, completed, error)
    #[arg(long, requires = "list", value_parser = parse_status)]
    status: Option<DocumentStatus>,

    /// Only list documents with this keyword
    #[arg(long, requires = "list")]
    keyword: Option<String>,

    /// Validate config and manifest and show the planned downloads without fetching
    #[arg(long, requires = "manifest")]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn parse_status(value: &str) -> Result<DocumentStatus, String> {
    DocumentStatus::from_db_string(&value.to_lowercase())
        .ok_or_else(|| format!("unknown status '{}'", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        handle_stats(&config)
    } else if cli.list {
        handle_list(&config, cli.status, cli.keyword)
    } else if let Some(manifest_path) = &cli.manifest {
        let manifest = Manifest::load(manifest_path)
            .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

        if cli.dry_run {
            handle_dry_run(&config, &manifest);
            Ok(())
        } else {
            handle_manifest(config, manifest).await
        }
    } else if let Some(directory) = &cli.directory {
        handle_directory(config, directory).await
    } else {
        Ok(())
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pdf_harvester=info,warn"),
            1 => EnvFilter::new("pdf_harvester=debug,info"),
            2 => EnvFilter::new("pdf_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<StoreHandle> {
    let path = Path::new(&config.storage.database_path);
    StoreHandle::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: shows what would be downloaded
fn handle_dry_run(config: &Config, manifest: &Manifest) {
    println!("=== pdf-harvester Dry Run ===\n");

    println!("Fetcher:");
    println!("  Max attempts: {}", config.fetcher.max_attempts);
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!(
        "  Certificate fallback: {}",
        if config.fetcher.certificate_fallback { "on" } else { "off" }
    );
    println!("  Trusted domains: {}", config.fetcher.trusted_domains.len());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Downloads: {}", config.storage.download_dir);

    println!("\nPlanned downloads ({}):", manifest.len());
    for entry in manifest.entries() {
        println!(
            "  {} <- {}",
            entry.filename(config.pipeline.filename_scheme),
            entry.url
        );
    }

    println!("\n✓ Configuration and manifest are valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = open_store(config)?;
    let stats = store.with(|storage| Ok(load_statistics(&*storage)))?;
    print_statistics(&stats);

    store.close()?;
    Ok(())
}

/// Handles the --list mode: prints documents matching the filters
fn handle_list(
    config: &Config,
    status: Option<DocumentStatus>,
    keyword: Option<String>,
) -> anyhow::Result<()> {
    let filter = DocumentFilter {
        status,
        keyword,
        ..DocumentFilter::default()
    };

    let store = open_store(config)?;
    let documents = store.with(|storage| storage.query_documents(&filter))?;
    print_documents(&documents);

    store.close()?;
    Ok(())
}

async fn handle_manifest(config: Config, manifest: Manifest) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let coordinator = Coordinator::new(config, store.clone())?;

    let report =
        run_with_interrupt(&coordinator, coordinator.process_manifest(&manifest)).await?;
    finish(coordinator, store, &report)
}

async fn handle_directory(config: Config, directory: &Path) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let coordinator = Coordinator::new(config, store.clone())?;

    let report =
        run_with_interrupt(&coordinator, coordinator.process_directory(directory)).await?;
    finish(coordinator, store, &report)
}

/// Runs a batch, cancelling dispatch of further documents on Ctrl-C
async fn run_with_interrupt<F>(
    coordinator: &Coordinator,
    batch: F,
) -> anyhow::Result<BatchReport>
where
    F: std::future::Future<Output = pdf_harvester::Result<BatchReport>>,
{
    let cancel = coordinator.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing documents already in progress");
            cancel.cancel();
        }
    });

    let result = batch.await;
    watcher.abort();

    Ok(result?)
}

fn finish(
    coordinator: Coordinator,
    store: StoreHandle,
    report: &BatchReport,
) -> anyhow::Result<()> {
    print_batch_report(report);

    drop(coordinator);
    store.close()?;
    Ok(())
}
