//! Storage module for the checkpoint store and record index
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Insert-once checkpoints gating re-processing on resume
//! - The denormalized index of emitted records
//! - Extracted collection structures for resuming memberships
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCheckpointStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::record::ContentRecord;
use crate::source::PageId;
use crate::state::Outcome;
use chrono::Utc;

/// File name of the index inside the output directory
pub const INDEX_FILE_NAME: &str = "poems_index.sqlite";

/// A terminal outcome for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub page_id: PageId,
    pub title: String,
    pub outcome: Outcome,
    /// RFC 3339 timestamp
    pub processed_at: String,
    pub run_id: i64,
    pub detail: Option<String>,
}

impl CheckpointEntry {
    /// Creates an entry stamped with the current time
    pub fn new(page_id: PageId, title: &str, outcome: Outcome, run_id: i64) -> Self {
        Self {
            page_id,
            title: title.to_string(),
            outcome,
            processed_at: Utc::now().to_rfc3339(),
            run_id,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Placement columns of an emitted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub page_id: PageId,
    pub collection_page_id: Option<PageId>,
    pub poem_order: Option<u32>,
    pub section_title: Option<String>,
}

impl From<&ContentRecord> for IndexedRecord {
    fn from(record: &ContentRecord) -> Self {
        Self {
            page_id: record.page_id,
            collection_page_id: record.collection_page_id,
            poem_order: record.poem_order,
            section_title: record.section_title.clone(),
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
