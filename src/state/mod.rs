//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Outcome`: the terminal outcome recorded for every page
//! - `CrawlState`: the scheduler-owned frontier, visited set, content queue and counters

mod crawl_state;
mod outcome;

// Re-export main types
pub use crawl_state::{
    ContentJob, ContentQueue, CrawlState, CrawlStats, Frontier, Prepared, WorkItem,
};
pub use outcome::Outcome;
