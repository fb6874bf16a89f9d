//! Storage traits and error types
//!
//! This module defines the checkpoint store interface and its error type.

use crate::extract::ExtractedCollection;
use crate::source::PageId;
use crate::state::Outcome;
use crate::storage::{CheckpointEntry, IndexedRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Unknown outcome in checkpoint table: {0}")]
    UnknownOutcome(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable set of processed pages plus the index of emitted records
///
/// Checkpoints are insert-once: the first terminal outcome recorded for a
/// page is the one that is kept. Lookups by page id are index-backed.
pub trait CheckpointStore: Send {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its id
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stamps a run with its final status and finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Checkpoints =====

    /// Whether any outcome has been recorded for the page
    fn is_processed(&self, page_id: PageId) -> StorageResult<bool>;

    /// The recorded outcome for the page, if any
    fn outcome(&self, page_id: PageId) -> StorageResult<Option<Outcome>>;

    /// Records a terminal outcome; returns false if the page already had one
    fn record(&mut self, entry: &CheckpointEntry) -> StorageResult<bool>;

    /// All page ids with a recorded outcome
    fn iter_processed(&self) -> StorageResult<Vec<PageId>>;

    /// Records a content page's outcome together with its emitted records,
    /// atomically
    fn commit_content(
        &mut self,
        entry: &CheckpointEntry,
        records: &[IndexedRecord],
    ) -> StorageResult<bool>;

    /// Records a collection's outcome together with its extracted structure,
    /// atomically
    fn commit_collection(
        &mut self,
        entry: &CheckpointEntry,
        extracted: &ExtractedCollection,
    ) -> StorageResult<bool>;

    /// Loads a previously extracted collection
    fn load_collection(&self, page_id: PageId) -> StorageResult<Option<ExtractedCollection>>;

    /// Deletes `failed` checkpoints so those pages are crawled again
    fn clear_failures(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    /// Number of checkpoints per outcome
    fn outcome_counts(&self) -> StorageResult<HashMap<Outcome, u64>>;

    /// Number of indexed records
    fn count_records(&self) -> StorageResult<u64>;

    /// Number of stored collection structures
    fn count_collections(&self) -> StorageResult<u64>;
}
