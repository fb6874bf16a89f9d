//! Crawl coordinator - wiring between configuration and the scheduler
//!
//! This module prepares everything a run needs, including:
//! - Creating the output directory
//! - Opening the index database and the record stream
//! - Building the MediaWiki client
//! - Handing the seeds to the scheduler

use crate::config::Config;
use crate::crawler::scheduler::{Scheduler, SchedulerOptions};
use crate::output::{SinkWriter, OUTPUT_FILE_NAME, TREE_LOG_DIR};
use crate::source::{MediaWikiClient, RemoteSource};
use crate::state::CrawlStats;
use crate::storage::{CheckpointStore, SqliteCheckpointStore, INDEX_FILE_NAME};
use crate::StanzaError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mode flags taken from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlMode {
    pub resume: bool,
    pub retry_failures: bool,
    /// Nothing durable is written: the index lives in memory and no stream is opened
    pub dry_run: bool,
    /// Write per-seed exploration trees under the output directory
    pub tree_log: bool,
}

/// Runs a crawl against the configured MediaWiki endpoint
///
/// # Arguments
///
/// * `config` - The crawler configuration, overrides already applied
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `mode` - Resume, retry and dry-run flags
/// * `cancel` - Interrupt signal; in-flight pages still commit
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    mode: CrawlMode,
    cancel: CancellationToken,
) -> Result<CrawlStats, StanzaError> {
    let timeout = Duration::from_secs(config.crawler.fetch_timeout_secs);
    let client = MediaWikiClient::new(&config.source, timeout)?;
    tracing::info!("Using MediaWiki endpoint {}", config.source.api_endpoint);

    crawl_source(Arc::new(client), config, config_hash, mode, cancel).await
}

/// Runs a crawl against any remote source
pub async fn crawl_source(
    source: Arc<dyn RemoteSource>,
    config: &Config,
    config_hash: &str,
    mode: CrawlMode,
    cancel: CancellationToken,
) -> Result<CrawlStats, StanzaError> {
    let (store, sink) = open_outputs(config, mode)?;

    let mut options =
        SchedulerOptions::from_config(&config.crawler, &config.source.category_prefix, config_hash);
    options.resume = mode.resume;
    options.retry_failures = mode.retry_failures;
    options.dry_run = mode.dry_run;
    options.tree_log_dir = mode
        .tree_log
        .then(|| Path::new(&config.output.output_dir).join(TREE_LOG_DIR));

    let mut scheduler = Scheduler::new(source, store, sink, &config.crawler, options, cancel);
    scheduler.run(&config.seeds).await
}

fn open_outputs(
    config: &Config,
    mode: CrawlMode,
) -> Result<(Box<dyn CheckpointStore>, Option<SinkWriter>), StanzaError> {
    if mode.dry_run {
        tracing::info!("Dry run: index kept in memory, no records written");
        let store: Box<dyn CheckpointStore> = Box::new(SqliteCheckpointStore::new_in_memory()?);
        return Ok((store, None));
    }

    let output_dir = Path::new(&config.output.output_dir);
    std::fs::create_dir_all(output_dir).map_err(|e| {
        StanzaError::Fatal(format!(
            "cannot create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let index_path = output_dir.join(INDEX_FILE_NAME);
    let store: Box<dyn CheckpointStore> = Box::new(SqliteCheckpointStore::new(&index_path)?);
    tracing::info!("Index database: {}", index_path.display());

    let stream_path = output_dir.join(OUTPUT_FILE_NAME);
    let sink = SinkWriter::open(&stream_path)?;
    tracing::info!("Record stream: {}", stream_path.display());

    Ok((store, Some(sink)))
}
