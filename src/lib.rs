//! Stanza-Crawl: an ordered anthology crawler for wiki-style content sources
//!
//! This crate crawls a category tree of collection pages and content pages,
//! reconstructs the ordered structure of each collection, extracts validated
//! records with their placement context, and persists them to a compressed
//! record stream plus a SQLite index that doubles as the resume checkpoint.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod record;
pub mod source;
pub mod state;
pub mod storage;
pub mod wikitext;

use thiserror::Error;

/// Main error type for Stanza-Crawl operations
///
/// Only run-level failures travel through this type. Problems with a single
/// page become a checkpointed [`state::Outcome`] instead.
#[derive(Debug, Error)]
pub enum StanzaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote source error: {0}")]
    Source(#[from] source::FetchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fatal: {0}")]
    Fatal(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Stanza-Crawl operations
pub type Result<T> = std::result::Result<T, StanzaError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlStats, Scheduler};
pub use record::{CollectionStructure, ContentRecord, Entry};
pub use source::{PageId, RemoteSource};
pub use state::Outcome;
