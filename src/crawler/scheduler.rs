//! Crawl scheduler
//!
//! This module owns the crawl state and drives both phases:
//! - Exploration: category listings and classification of their members,
//!   with structure extraction for collections
//! - Content: one record per collection membership for every content page
//!
//! Tasks run concurrently in a `JoinSet` bounded by the worker count. Every
//! result comes back to the scheduler loop, which is the only writer of the
//! crawl state, the checkpoint store and the sink.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchFailure, Fetcher};
use crate::crawler::tasks::{self, Built, Explored, TaskResult};
use crate::extract::ExtractedCollection;
use crate::output::{write_tree_logs, ExplorationTree, SinkWriter};
use crate::record::{validate, CandidateRecord, ContentRecord, Placement};
use crate::source::{category_title, Category, MemberKind, PageId, RemoteSource};
use crate::state::{ContentJob, CrawlState, CrawlStats, Outcome, Prepared, WorkItem};
use crate::storage::{CheckpointEntry, CheckpointStore, IndexedRecord, RunStatus};
use crate::StanzaError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Terminal pages between two progress reports
const PROGRESS_INTERVAL: u64 = 50;

/// Run-level switches for one crawl
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Seed the visited set from the checkpoint store
    pub resume: bool,
    /// Delete `failed` checkpoints before seeding the visited set
    pub retry_failures: bool,
    /// Classify and extract structures only; build no records
    pub dry_run: bool,
    /// Stop after this many content pages reach an outcome
    pub limit: Option<u64>,
    pub max_workers: usize,
    pub max_depth: usize,
    /// Namespace prefix for bare seed names
    pub category_prefix: String,
    /// Stored with the run for later comparison
    pub config_hash: String,
    /// Where to write per-seed exploration trees, when requested
    pub tree_log_dir: Option<PathBuf>,
}

impl SchedulerOptions {
    pub fn from_config(config: &CrawlerConfig, category_prefix: &str, config_hash: &str) -> Self {
        Self {
            resume: false,
            retry_failures: false,
            dry_run: false,
            limit: config.limit,
            max_workers: config.max_workers.max(1) as usize,
            max_depth: config.max_nesting_depth as usize,
            category_prefix: category_prefix.to_string(),
            config_hash: config_hash.to_string(),
            tree_log_dir: None,
        }
    }
}

/// Drives a crawl from seed categories to checkpointed records
pub struct Scheduler {
    fetcher: Arc<Fetcher>,
    store: Box<dyn CheckpointStore>,
    sink: Option<SinkWriter>,
    state: CrawlState,
    tree: Option<ExplorationTree>,
    options: SchedulerOptions,
    /// External interrupt, shared with the caller
    cancel: CancellationToken,
    /// Stops dispatch; cancelled by the interrupt or by the item limit
    dispatch: CancellationToken,
    run_id: i64,
    content_dispatched: u64,
    content_finished: u64,
    started: Instant,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// `sink` may be `None` only for a dry run.
    pub fn new(
        source: Arc<dyn RemoteSource>,
        store: Box<dyn CheckpointStore>,
        sink: Option<SinkWriter>,
        config: &CrawlerConfig,
        options: SchedulerOptions,
        cancel: CancellationToken,
    ) -> Self {
        let dispatch = cancel.child_token();
        let fetcher = Arc::new(Fetcher::new(source, config, dispatch.clone()));

        Self {
            fetcher,
            store,
            sink,
            state: CrawlState::new(),
            tree: None,
            options,
            cancel,
            dispatch,
            run_id: 0,
            content_dispatched: 0,
            content_finished: 0,
            started: Instant::now(),
        }
    }

    /// Runs the crawl over the given seed categories
    ///
    /// Page-level problems are checkpointed as outcomes. An `Err` means the
    /// run itself could not continue; the run is then marked failed.
    pub async fn run(&mut self, seeds: &[String]) -> Result<CrawlStats, StanzaError> {
        self.run_id = self.store.create_run(&self.options.config_hash)?;
        self.started = Instant::now();
        tracing::info!("Starting crawl run {}", self.run_id);

        match self.crawl(seeds).await {
            Ok(()) => {
                let status = if self.cancel.is_cancelled() {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Completed
                };
                self.store.finish_run(self.run_id, status)?;
                tracing::info!(
                    "Crawl run {} {} in {:?}: {} records emitted",
                    self.run_id,
                    status.to_db_string(),
                    self.started.elapsed(),
                    self.state.stats.records_emitted
                );
                Ok(self.state.stats.clone())
            }
            Err(e) => {
                if let Err(finish_err) = self.store.finish_run(self.run_id, RunStatus::Failed) {
                    tracing::error!("Failed to mark run {} as failed: {}", self.run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn crawl(&mut self, seeds: &[String]) -> Result<(), StanzaError> {
        self.load_visited()?;

        let seed_titles: Vec<String> = seeds
            .iter()
            .map(|seed| category_title(seed, &self.options.category_prefix))
            .collect();
        for title in &seed_titles {
            self.state.frontier.push_category(title);
        }
        if self.options.tree_log_dir.is_some() {
            self.tree = Some(ExplorationTree::new(&seed_titles));
        }

        self.explore(seed_titles.first().map(String::as_str)).await?;

        self.state.stats.content_items = self.state.content.len() as u64;
        if self.options.dry_run {
            tracing::info!(
                "Dry run: {} content pages discovered, no records built",
                self.state.content.len()
            );
        } else {
            self.build_records().await?;
        }

        if let Some(sink) = self.sink.take() {
            sink.finish()?;
        }
        self.write_tree_log();
        Ok(())
    }

    fn note(&mut self, record: impl FnOnce(&mut ExplorationTree)) {
        if let Some(tree) = self.tree.as_mut() {
            record(tree);
        }
    }

    fn write_tree_log(&mut self) {
        let (Some(tree), Some(dir)) = (self.tree.take(), self.options.tree_log_dir.as_ref()) else {
            return;
        };
        match write_tree_logs(&tree, dir) {
            Ok(paths) => {
                tracing::info!("Wrote {} exploration trees to {}", paths.len(), dir.display())
            }
            Err(e) => {
                tracing::warn!("Failed to write exploration trees to {}: {}", dir.display(), e)
            }
        }
    }

    fn load_visited(&mut self) -> Result<(), StanzaError> {
        if !self.options.resume {
            return Ok(());
        }

        if self.options.retry_failures {
            let cleared = self.store.clear_failures()?;
            tracing::info!("Cleared {} failed checkpoints for retry", cleared);
        }

        let processed = self.store.iter_processed()?;
        tracing::info!("Resuming with {} pages already processed", processed.len());
        self.state = CrawlState::with_visited(processed);
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.options
            .limit
            .is_some_and(|limit| self.content_finished >= limit)
    }

    /// Exploration has found enough content pages to satisfy the limit
    fn exploration_saturated(&self) -> bool {
        self.options
            .limit
            .is_some_and(|limit| self.state.content.len() as u64 >= limit)
    }

    // ===== Exploration phase =====

    async fn explore(&mut self, first_seed: Option<&str>) -> Result<(), StanzaError> {
        let mut in_flight = JoinSet::new();

        loop {
            while in_flight.len() < self.options.max_workers
                && !self.dispatch.is_cancelled()
                && !self.exploration_saturated()
            {
                let Some(item) = self.state.frontier.pop() else {
                    break;
                };
                self.spawn_exploration(&mut in_flight, item);
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let result = joined
                .map_err(|e| StanzaError::Fatal(format!("exploration task failed: {}", e)))?;
            self.commit(result, first_seed)?;
        }

        let abandoned = self.state.frontier.abandon();
        if abandoned > 0 {
            tracing::info!("Abandoned {} unexplored frontier items", abandoned);
            self.state.stats.abandoned += abandoned as u64;
        }
        Ok(())
    }

    fn spawn_exploration(&self, in_flight: &mut JoinSet<TaskResult>, item: WorkItem) {
        let fetcher = self.fetcher.clone();
        match item {
            WorkItem::Category(title) => {
                tracing::debug!("Listing {}", title);
                in_flight.spawn(tasks::list_category(fetcher, title));
            }
            WorkItem::Page { id, title } => {
                in_flight.spawn(tasks::explore_page(
                    fetcher,
                    id,
                    title,
                    self.options.max_depth,
                    !self.options.dry_run,
                ));
            }
        }
    }

    fn commit(&mut self, result: TaskResult, first_seed: Option<&str>) -> Result<(), StanzaError> {
        match result {
            TaskResult::Listed { title, result } => match result {
                Ok(category) => self.admit_members(category),
                Err(FetchFailure::Cancelled) => Ok(()),
                Err(failure) if first_seed == Some(title.as_str()) => Err(StanzaError::Fatal(
                    format!("cannot list seed category {}: {}", title, failure),
                )),
                Err(failure) => {
                    tracing::warn!("Failed to list {}: {}", title, failure);
                    self.note(|tree| tree.classify(&title, "unlisted", failure.to_string()));
                    Ok(())
                }
            },
            TaskResult::Explored { id, title, result } => match result {
                Ok(Explored::Collection { extracted, reason }) => {
                    self.note(|tree| tree.classify(&title, "collection", reason));
                    self.commit_collection(extracted)
                }
                Ok(Explored::Content { prepared, reason }) => {
                    self.note(|tree| tree.classify(&title, "content_item", reason));
                    self.state.content.add_page(id, &title);
                    if let Some(prepared) = prepared {
                        self.state.content.add_prepared(id, prepared);
                    }
                    Ok(())
                }
                Ok(Explored::Unclassified(reason)) => {
                    tracing::debug!("Unclassified page {}: {}", title, reason);
                    self.note(|tree| tree.classify(&title, "unclassified", reason));
                    self.checkpoint(id, &title, Outcome::Unclassified, Some(reason.to_string()))
                }
                Ok(Explored::Interrupted) => Ok(()),
                Err(failure) => {
                    if let Some(outcome) = failure.outcome() {
                        let reason = failure.to_string();
                        self.note(|tree| tree.classify(&title, outcome.to_db_string(), reason));
                    }
                    self.checkpoint_failure(id, &title, &failure)
                }
            },
            TaskResult::Built { job, result } => self.commit_content(job, result),
        }
    }

    fn admit_members(&mut self, category: Category) -> Result<(), StanzaError> {
        self.state.stats.categories_listed += 1;
        tracing::debug!(
            "Listed {} with {} members",
            category.title,
            category.members.len()
        );

        let listed = category.members.len();
        self.note(|tree| tree.classify(&category.title, "category", format!("{} members", listed)));

        for member in category.members {
            self.note(|tree| {
                tree.discover(&category.title, &member.title);
            });
            match member.kind {
                MemberKind::Subcategory => {
                    self.state.frontier.push_category(&member.title);
                }
                MemberKind::Page if self.state.is_visited(member.id) => {
                    if self.state.frontier.mark_seen(member.id) {
                        self.state.stats.already_processed += 1;
                        self.note(|tree| tree.classify(&member.title, "already processed", ""));
                        self.restore_memberships(member.id)?;
                    }
                }
                MemberKind::Page => {
                    self.state.frontier.push_page(member.id, &member.title);
                }
            }
        }
        Ok(())
    }

    /// Re-creates the placements of a collection checkpointed by an earlier run
    fn restore_memberships(&mut self, collection: PageId) -> Result<(), StanzaError> {
        let Some(extracted) = self.store.load_collection(collection)? else {
            return Ok(());
        };
        let pending = self.place_members(&extracted);
        if pending > 0 {
            tracing::info!(
                "Restored {} pending members of {}",
                pending,
                extracted.title
            );
        }
        self.state.set_structure(extracted.page_id, extracted.structure);
        Ok(())
    }

    fn commit_collection(&mut self, extracted: ExtractedCollection) -> Result<(), StanzaError> {
        tracing::info!(
            "Collection {}: {} entries, {} content items",
            extracted.title,
            extracted.structure.entries().len(),
            extracted.structure.content_count()
        );

        let mut entry = CheckpointEntry::new(
            extracted.page_id,
            &extracted.title,
            Outcome::Processed,
            self.run_id,
        );
        if !extracted.anomalies.is_empty() {
            let anomalies: Vec<String> =
                extracted.anomalies.iter().map(|a| a.to_string()).collect();
            entry = entry.with_detail(anomalies.join("; "));
        }
        self.store.commit_collection(&entry, &extracted)?;

        self.state.stats.collections += 1;
        self.state.stats.anomalies += extracted.anomalies.len() as u64;
        self.note(|tree| {
            for member in &extracted.members {
                tree.discover(&extracted.title, &member.title);
                let reason = format!("order {}", member.order_index);
                tree.classify(&member.title, "content_item", reason);
            }
        });
        self.place_members(&extracted);
        self.state.mark_visited(extracted.page_id);
        self.state.set_structure(extracted.page_id, extracted.structure);
        self.terminal(Outcome::Processed);
        Ok(())
    }

    /// Queues a placement for every member not processed yet; returns how many
    fn place_members(&mut self, extracted: &ExtractedCollection) -> usize {
        let anchor = extracted.anchor_order();
        let mut placed = 0;
        for member in &extracted.members {
            if self.state.is_visited(member.page_id) {
                if self.state.frontier.mark_seen(member.page_id) {
                    self.state.stats.already_processed += 1;
                }
                continue;
            }
            // Exploring the member again would only repeat its classification
            self.state.frontier.mark_seen(member.page_id);
            let placement = Placement {
                collection_page_id: extracted.page_id,
                collection_title: extracted.title.clone(),
                section_title: member.section_title.clone(),
                poem_order: member.order_index,
                carries_structure: anchor == Some(member.order_index),
            };
            if self
                .state
                .content
                .add_placement(member.page_id, &member.title, placement)
            {
                placed += 1;
            }
        }
        placed
    }

    // ===== Content phase =====

    async fn build_records(&mut self) -> Result<(), StanzaError> {
        tracing::info!(
            "Exploration finished, building records for {} content pages",
            self.state.content.len()
        );
        let mut in_flight = JoinSet::new();

        loop {
            while in_flight.len() < self.options.max_workers && !self.dispatch.is_cancelled() {
                if self
                    .options
                    .limit
                    .is_some_and(|limit| self.content_dispatched >= limit)
                {
                    break;
                }
                let Some(job) = self.state.content.pop() else {
                    break;
                };
                self.content_dispatched += 1;
                in_flight.spawn(tasks::build_content(self.fetcher.clone(), job));
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let result =
                joined.map_err(|e| StanzaError::Fatal(format!("content task failed: {}", e)))?;
            self.commit(result, None)?;

            if self.limit_reached() && !self.dispatch.is_cancelled() {
                tracing::info!("Item limit of {} reached", self.content_finished);
                self.dispatch.cancel();
            }
        }

        let abandoned = self.state.content.abandon();
        if abandoned > 0 {
            tracing::info!("Abandoned {} queued content pages", abandoned);
            self.state.stats.abandoned += abandoned as u64;
        }
        Ok(())
    }

    fn commit_content(
        &mut self,
        job: ContentJob,
        result: Result<Built, FetchFailure>,
    ) -> Result<(), StanzaError> {
        let finished = match result {
            Ok(Built::Prepared(prepared)) => {
                self.emit_records(&job, prepared)?;
                true
            }
            Ok(Built::NotContent(kind)) => {
                tracing::debug!("{} no longer classifies as content ({})", job.title, kind);
                self.checkpoint(
                    job.page_id,
                    &job.title,
                    Outcome::Unclassified,
                    Some(format!("reclassified as {}", kind)),
                )?;
                true
            }
            Err(FetchFailure::Cancelled) => false,
            Err(failure) => {
                self.checkpoint_failure(job.page_id, &job.title, &failure)?;
                true
            }
        };

        if finished {
            self.content_finished += 1;
        }
        Ok(())
    }

    /// One candidate per membership, or a single standalone candidate
    fn candidates(&self, job: &ContentJob, prepared: &Prepared) -> Vec<CandidateRecord> {
        let standalone =
            CandidateRecord::new(job.page_id, prepared.metadata.clone(), prepared.body.clone());
        if job.placements.is_empty() {
            return vec![standalone];
        }

        job.placements
            .iter()
            .map(|placement| {
                let structure = if placement.carries_structure {
                    self.state.structure(placement.collection_page_id).cloned()
                } else {
                    None
                };
                standalone.clone().with_placement(placement, structure)
            })
            .collect()
    }

    fn emit_records(&mut self, job: &ContentJob, prepared: Prepared) -> Result<(), StanzaError> {
        let mut records: Vec<ContentRecord> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();
        for candidate in self.candidates(job, &prepared) {
            match validate(candidate) {
                Ok(record) => records.push(record),
                Err(rejected) => reasons.push(rejected.to_string()),
            }
        }

        if records.is_empty() {
            tracing::warn!("Rejected {}: {}", job.title, reasons.join("; "));
            return self.checkpoint(
                job.page_id,
                &job.title,
                Outcome::FailedValidation,
                Some(reasons.join("; ")),
            );
        }

        let indexed: Vec<IndexedRecord> = records.iter().map(IndexedRecord::from).collect();
        let emitted = records.len() as u64;
        if let Some(sink) = self.sink.as_mut() {
            for record in records {
                sink.emit(record)?;
            }
            sink.flush()?;
        }

        let mut entry =
            CheckpointEntry::new(job.page_id, &job.title, Outcome::Processed, self.run_id);
        if !reasons.is_empty() {
            tracing::warn!(
                "{} of {} placements of {} rejected",
                reasons.len(),
                job.placements.len(),
                job.title
            );
            entry = entry.with_detail(reasons.join("; "));
        }
        self.store.commit_content(&entry, &indexed)?;

        tracing::debug!("Emitted {} records for {}", emitted, job.title);
        self.state.stats.records_emitted += emitted;
        self.state.mark_visited(job.page_id);
        self.terminal(Outcome::Processed);
        Ok(())
    }

    // ===== Checkpoints =====

    fn checkpoint(
        &mut self,
        id: PageId,
        title: &str,
        outcome: Outcome,
        detail: Option<String>,
    ) -> Result<(), StanzaError> {
        let mut entry = CheckpointEntry::new(id, title, outcome, self.run_id);
        if let Some(detail) = detail {
            entry = entry.with_detail(detail);
        }
        if !self.store.record(&entry)? {
            tracing::debug!("{} already carried an outcome", title);
        }
        tracing::debug!("{} -> {}", title, outcome);
        self.state.mark_visited(id);
        self.terminal(outcome);
        Ok(())
    }

    fn checkpoint_failure(
        &mut self,
        id: PageId,
        title: &str,
        failure: &FetchFailure,
    ) -> Result<(), StanzaError> {
        match failure.outcome() {
            Some(outcome) => self.checkpoint(id, title, outcome, Some(failure.to_string())),
            None => Ok(()),
        }
    }

    fn terminal(&mut self, outcome: Outcome) {
        self.state.stats.record(outcome);

        let terminal = self.state.stats.terminal();
        if terminal % PROGRESS_INTERVAL == 0 {
            let rate = terminal as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages done, {} in frontier, {} content pages queued, {:.2} pages/sec",
                terminal,
                self.state.frontier.len(),
                self.state.content.len(),
                rate
            );
        }
    }
}
