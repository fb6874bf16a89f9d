//! Crawler module for fetching and scheduling
//!
//! This module contains the core crawling logic, including:
//! - Retrying fetches with backoff under bounded permits
//! - The two-phase crawl scheduler
//! - Wiring of configuration, index, record stream and source

mod coordinator;
mod fetcher;
mod scheduler;
mod tasks;

pub use crate::state::CrawlStats;
pub use coordinator::{crawl_source, run_crawl, CrawlMode};
pub use fetcher::{FetchClass, FetchFailure, Fetcher, RetryPolicy};
pub use scheduler::{Scheduler, SchedulerOptions};
