//! In-memory crawl state
//!
//! `CrawlState` lives for one crawl invocation and is owned by the scheduler,
//! which is its only writer. Nothing here survives the run; the checkpoint
//! store is the durable side.

use crate::record::{Body, CollectionStructure, Metadata, Placement};
use crate::source::PageId;
use crate::state::Outcome;
use std::collections::{HashMap, HashSet, VecDeque};

/// A unit of exploration work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A category listing, addressed by full title
    Category(String),
    /// A category member page to fetch and classify
    Page { id: PageId, title: String },
}

/// Set-backed exploration queue
///
/// Each category title and page identifier is admitted at most once per run,
/// however many parents reference it.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<WorkItem>,
    seen_categories: HashSet<String>,
    seen_pages: HashSet<PageId>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a category unless it was already admitted
    pub fn push_category(&mut self, title: &str) -> bool {
        if !self.seen_categories.insert(title.to_string()) {
            return false;
        }
        self.queue.push_back(WorkItem::Category(title.to_string()));
        true
    }

    /// Enqueues a page unless it was already admitted
    pub fn push_page(&mut self, id: PageId, title: &str) -> bool {
        if !self.seen_pages.insert(id) {
            return false;
        }
        self.queue.push_back(WorkItem::Page {
            id,
            title: title.to_string(),
        });
        true
    }

    /// Admits a page without queueing it, so later listings will not explore it
    pub fn mark_seen(&mut self, id: PageId) -> bool {
        self.seen_pages.insert(id)
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        self.queue.pop_front()
    }

    /// Drops all queued work, returning how many items were abandoned
    pub fn abandon(&mut self) -> usize {
        let abandoned = self.queue.len();
        self.queue.clear();
        abandoned
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Metadata and body computed while a content page was already in hand
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub title: String,
    pub metadata: Metadata,
    pub body: Body,
}

/// A content page waiting for the content phase
#[derive(Debug, Clone, PartialEq)]
pub struct ContentJob {
    pub page_id: PageId,
    pub title: String,
    /// One entry per collection membership; empty for a standalone page
    pub placements: Vec<Placement>,
    pub prepared: Option<Prepared>,
}

/// Content pages keyed by identifier, in discovery order
#[derive(Debug, Default)]
pub struct ContentQueue {
    order: VecDeque<PageId>,
    jobs: HashMap<PageId, ContentJob>,
}

impl ContentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, page_id: PageId, title: &str) -> &mut ContentJob {
        let order = &mut self.order;
        self.jobs.entry(page_id).or_insert_with(|| {
            order.push_back(page_id);
            ContentJob {
                page_id,
                title: title.to_string(),
                placements: Vec::new(),
                prepared: None,
            }
        })
    }

    /// Registers a content page, merging into an existing job
    pub fn add_page(&mut self, page_id: PageId, title: &str) {
        self.entry(page_id, title);
    }

    /// Attaches already-extracted data to a job
    pub fn add_prepared(&mut self, page_id: PageId, prepared: Prepared) {
        let title = prepared.title.clone();
        self.entry(page_id, &title).prepared = Some(prepared);
    }

    /// Adds a collection membership; a second membership in the same
    /// collection is ignored
    pub fn add_placement(&mut self, page_id: PageId, title: &str, placement: Placement) -> bool {
        let job = self.entry(page_id, title);
        if job
            .placements
            .iter()
            .any(|p| p.collection_page_id == placement.collection_page_id)
        {
            return false;
        }
        job.placements.push(placement);
        true
    }

    pub fn pop(&mut self) -> Option<ContentJob> {
        let page_id = self.order.pop_front()?;
        self.jobs.remove(&page_id)
    }

    pub fn abandon(&mut self) -> usize {
        let abandoned = self.order.len();
        self.order.clear();
        self.jobs.clear();
        abandoned
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.jobs.contains_key(&page_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub failed_validation: u64,
    pub unclassified: u64,
    /// Pages passed over because an earlier run already checkpointed them
    pub already_processed: u64,
    pub categories_listed: u64,
    pub collections: u64,
    pub content_items: u64,
    pub records_emitted: u64,
    pub anomalies: u64,
    /// Queued work dropped when the run stopped early
    pub abandoned: u64,
}

impl CrawlStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Processed => self.processed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::FailedValidation => self.failed_validation += 1,
            Outcome::Unclassified => self.unclassified += 1,
        }
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Processed => self.processed,
            Outcome::Skipped => self.skipped,
            Outcome::Failed => self.failed,
            Outcome::FailedValidation => self.failed_validation,
            Outcome::Unclassified => self.unclassified,
        }
    }

    /// Pages that reached a terminal outcome in this run
    pub fn terminal(&self) -> u64 {
        Outcome::all().iter().map(|o| self.count(*o)).sum()
    }
}

/// Process-wide state of one crawl
#[derive(Debug, Default)]
pub struct CrawlState {
    pub frontier: Frontier,
    pub content: ContentQueue,
    /// Mirror of the checkpoint store's processed set
    visited: HashSet<PageId>,
    /// Structures by collection, attached to order-zero records
    structures: HashMap<PageId, CollectionStructure>,
    pub stats: CrawlStats,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from identifiers already recorded by an earlier run
    pub fn with_visited(visited: impl IntoIterator<Item = PageId>) -> Self {
        Self {
            visited: visited.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_visited(&self, id: PageId) -> bool {
        self.visited.contains(&id)
    }

    pub fn mark_visited(&mut self, id: PageId) -> bool {
        self.visited.insert(id)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn set_structure(&mut self, collection: PageId, structure: CollectionStructure) {
        self.structures.insert(collection, structure);
    }

    pub fn structure(&self, collection: PageId) -> Option<&CollectionStructure> {
        self.structures.get(&collection)
    }
}
