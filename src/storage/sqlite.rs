//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::extract::ExtractedCollection;
use crate::source::PageId;
use crate::state::Outcome;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{CheckpointEntry, IndexedRecord, RunRecord, RunStatus};
use crate::StanzaError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

/// SQLite checkpoint store
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Creates a new SqliteCheckpointStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCheckpointStore)` - Successfully opened/created database
    /// * `Err(StanzaError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, StanzaError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, StanzaError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_sql_id(id: PageId) -> i64 {
    id.0 as i64
}

fn from_sql_id(id: i64) -> PageId {
    PageId(id as u64)
}

fn insert_checkpoint(tx: &Transaction<'_>, entry: &CheckpointEntry) -> StorageResult<bool> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO checkpoints (page_id, title, outcome, processed_at, run_id, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            to_sql_id(entry.page_id),
            entry.title,
            entry.outcome.to_db_string(),
            entry.processed_at,
            entry.run_id,
            entry.detail,
        ],
    )?;
    Ok(inserted > 0)
}

fn read_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl CheckpointStore for SqliteCheckpointStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                read_run,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Checkpoints =====

    fn is_processed(&self, page_id: PageId) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM checkpoints WHERE page_id = ?1",
                params![to_sql_id(page_id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn outcome(&self, page_id: PageId) -> StorageResult<Option<Outcome>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT outcome FROM checkpoints WHERE page_id = ?1",
                params![to_sql_id(page_id)],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| Outcome::from_db_string(&s).ok_or(StorageError::UnknownOutcome(s)))
            .transpose()
    }

    fn record(&mut self, entry: &CheckpointEntry) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        let inserted = insert_checkpoint(&tx, entry)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn iter_processed(&self) -> StorageResult<Vec<PageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT page_id FROM checkpoints ORDER BY page_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(from_sql_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn commit_content(
        &mut self,
        entry: &CheckpointEntry,
        records: &[IndexedRecord],
    ) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO records (page_id, collection_page_id, poem_order, section_title, run_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    to_sql_id(record.page_id),
                    record.collection_page_id.map(to_sql_id),
                    record.poem_order,
                    record.section_title,
                    entry.run_id,
                ])?;
            }
        }
        let inserted = insert_checkpoint(&tx, entry)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn commit_collection(
        &mut self,
        entry: &CheckpointEntry,
        extracted: &ExtractedCollection,
    ) -> StorageResult<bool> {
        let json = serde_json::to_string(extracted)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collections (page_id, title, extracted_json, anomaly_count, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                to_sql_id(extracted.page_id),
                extracted.title,
                json,
                extracted.anomalies.len() as i64,
                entry.processed_at,
            ],
        )?;
        let inserted = insert_checkpoint(&tx, entry)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn load_collection(&self, page_id: PageId) -> StorageResult<Option<ExtractedCollection>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT extracted_json FROM collections WHERE page_id = ?1",
                params![to_sql_id(page_id)],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn clear_failures(&mut self) -> StorageResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM checkpoints WHERE outcome = ?1",
            params![Outcome::Failed.to_db_string()],
        )?;
        Ok(deleted)
    }

    // ===== Statistics =====

    fn outcome_counts(&self) -> StorageResult<HashMap<Outcome, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT outcome, COUNT(*) FROM checkpoints GROUP BY outcome")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (raw, count) = row?;
            let outcome = Outcome::from_db_string(&raw).ok_or(StorageError::UnknownOutcome(raw))?;
            counts.insert(outcome, count as u64);
        }
        Ok(counts)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_collections(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
