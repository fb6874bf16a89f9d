//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the index database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One terminal outcome per page, never updated
CREATE TABLE IF NOT EXISTS checkpoints (
    page_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    outcome TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_outcome ON checkpoints(outcome);

-- Denormalized placement of every emitted record
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL,
    collection_page_id INTEGER,
    poem_order INTEGER,
    section_title TEXT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    UNIQUE(page_id, collection_page_id)
);

-- NULLs are distinct under UNIQUE, so standalone records need their own key
CREATE UNIQUE INDEX IF NOT EXISTS idx_records_standalone
    ON records(page_id) WHERE collection_page_id IS NULL;

CREATE INDEX IF NOT EXISTS idx_records_page ON records(page_id);
CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection_page_id, poem_order);

-- Extracted collection structures, for re-deriving memberships on resume
CREATE TABLE IF NOT EXISTS collections (
    page_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    extracted_json TEXT NOT NULL,
    anomaly_count INTEGER NOT NULL DEFAULT 0,
    extracted_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
