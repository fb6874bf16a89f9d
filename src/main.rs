//! Stanza-Crawl main entry point
//!
//! This is the command-line interface for the Stanza-Crawl anthology crawler.

use anyhow::{bail, Context};
use clap::Parser;
use stanza_crawl::config::{apply_overrides, load_config_with_hash, Config, Overrides};
use stanza_crawl::crawler::{run_crawl, CrawlMode};
use stanza_crawl::output::{load_statistics, print_statistics, print_summary};
use stanza_crawl::storage::{SqliteCheckpointStore, INDEX_FILE_NAME};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Stanza-Crawl: an ordered anthology crawler
///
/// Stanza-Crawl walks a wiki category tree, reconstructs the ordered
/// structure of every collection it finds, and writes one validated record
/// per poem to a compressed NDJSON stream, with a SQLite index that lets an
/// interrupted crawl resume where it stopped.
#[derive(Parser, Debug)]
#[command(name = "stanza-crawl")]
#[command(version)]
#[command(about = "An ordered anthology crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "stanza.toml")]
    config: PathBuf,

    /// Seed category; repeat to crawl several (replaces the configured seeds)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Joint cap on concurrent fetches
    #[arg(long, value_name = "N")]
    workers: Option<u32>,

    /// Stop after this many content pages
    #[arg(long, value_name = "N")]
    limit: Option<u64>,

    /// Directory for the record stream and the index database
    #[arg(long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Skip pages already recorded in the index
    #[arg(long)]
    resume: bool,

    /// With --resume, crawl pages whose earlier fetch failed again
    #[arg(long, requires = "resume")]
    retry_failures: bool,

    /// Classify pages and extract structures without writing records
    #[arg(long, conflicts_with_all = ["stats", "resume"])]
    dry_run: bool,

    /// Write an exploration tree per seed category under <output-dir>/logs/tree-logs
    #[arg(long, conflicts_with = "stats")]
    tree_log: bool,

    /// Show statistics from the index database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;

    let overrides = Overrides {
        categories: cli.categories.clone(),
        workers: cli.workers,
        limit: cli.limit,
        output_dir: cli.output_dir.clone(),
    };
    let config = apply_overrides(config, &overrides).context("invalid command-line override")?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let mode = CrawlMode {
        resume: cli.resume,
        retry_failures: cli.retry_failures,
        dry_run: cli.dry_run,
        tree_log: cli.tree_log,
    };
    handle_crawl(&config, &config_hash, mode).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("stanza_crawl=info,warn"),
            1 => EnvFilter::new("stanza_crawl=debug,info"),
            2 => EnvFilter::new("stanza_crawl=trace,debug"),
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

/// Handles the --stats mode: shows statistics from the index database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let index_path = Path::new(&config.output.output_dir).join(INDEX_FILE_NAME);
    if !index_path.exists() {
        bail!("no index database at {}", index_path.display());
    }

    println!("Database: {}\n", index_path.display());
    let store = SqliteCheckpointStore::new(&index_path)
        .with_context(|| format!("failed to open {}", index_path.display()))?;
    let stats = load_statistics(&store).context("failed to read index statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the crawl and dry-run modes
async fn handle_crawl(config: &Config, config_hash: &str, mode: CrawlMode) -> anyhow::Result<()> {
    if mode.resume {
        tracing::info!("Resuming from the index in {}", config.output.output_dir);
    }
    tracing::info!("Seed categories: {}", config.seeds.join(", "));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            interrupt.cancel();
        }
    });

    let stats = run_crawl(config, config_hash, mode, cancel)
        .await
        .context("crawl failed")?;

    print_summary(&stats);
    Ok(())
}
