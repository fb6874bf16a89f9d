//! Statistics from the index database and the end-of-run summary
//!
//! `load_statistics` reads what the checkpoint store has accumulated across
//! all runs; `print_summary` reports the counters of the run that just ended.

use crate::state::{CrawlStats, Outcome};
use crate::storage::{CheckpointStore, RunRecord};
use crate::StanzaError;
use std::collections::HashMap;

/// Accumulated index statistics
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    /// Total number of checkpointed pages
    pub total_pages: u64,

    /// Count of pages by outcome
    pub pages_by_outcome: HashMap<Outcome, u64>,

    /// Number of records in the index
    pub total_records: u64,

    /// Number of stored collection structures
    pub total_collections: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl IndexStatistics {
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.pages_by_outcome.get(&outcome).copied().unwrap_or(0)
    }

    /// Pages whose outcome is an error
    pub fn errors(&self) -> u64 {
        Outcome::all()
            .iter()
            .filter(|o| o.is_error())
            .map(|o| self.count(*o))
            .sum()
    }
}

/// Loads statistics from the checkpoint store
pub fn load_statistics(store: &dyn CheckpointStore) -> Result<IndexStatistics, StanzaError> {
    let pages_by_outcome = store.outcome_counts()?;
    let total_pages = pages_by_outcome.values().sum();

    Ok(IndexStatistics {
        total_pages,
        pages_by_outcome,
        total_records: store.count_records()?,
        total_collections: store.count_collections()?,
        latest_run: store.latest_run()?,
    })
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints index statistics to stdout
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Checkpointed pages: {}", stats.total_pages);
    println!("  Indexed records: {}", stats.total_records);
    println!("  Collections: {}", stats.total_collections);
    println!();

    println!("Pages by Outcome:");
    let mut outcome_counts: Vec<_> = stats.pages_by_outcome.iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (outcome, count) in outcome_counts {
        println!(
            "  {}: {} ({:.1}%)",
            outcome,
            count,
            percentage(*count, stats.total_pages)
        );
    }
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  Id: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Config hash: {}", run.config_hash);
        println!();
    }

    let processed = stats.count(Outcome::Processed);
    println!(
        "Success Rate: {:.1}% ({} / {} pages processed)",
        percentage(processed, stats.total_pages),
        processed,
        stats.total_pages
    );
}

/// Prints the counters of one finished run
pub fn print_summary(stats: &CrawlStats) {
    println!("=== Crawl Summary ===\n");

    println!("Discovery:");
    println!("  Categories listed: {}", stats.categories_listed);
    println!("  Collections: {}", stats.collections);
    println!("  Content items: {}", stats.content_items);
    println!("  Already processed: {}", stats.already_processed);
    println!();

    println!("Outcomes:");
    for outcome in Outcome::all() {
        println!("  {}: {}", outcome, stats.count(outcome));
    }
    println!();

    println!("Records emitted: {}", stats.records_emitted);
    if stats.anomalies > 0 {
        println!("Structural anomalies: {}", stats.anomalies);
    }
    if stats.abandoned > 0 {
        println!("Abandoned work items: {}", stats.abandoned);
    }
}
