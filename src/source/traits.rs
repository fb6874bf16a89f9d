//! Remote source trait and fetch error taxonomy

use crate::source::{Category, Page, PageId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure signals from the remote source
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The source asked us to slow down
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeout, connection failure, 5xx
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The page or category does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response can never be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Server-requested delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for remote fetches
pub type FetchResult<T> = Result<T, FetchError>;

/// Read access to the remote content source
///
/// Implementations must be safe to call concurrently; the crawler bounds
/// concurrency and retries on its side.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Lists the members of a category (full namespaced title)
    async fn fetch_category(&self, title: &str) -> FetchResult<Category>;

    /// Fetches a page by its identifier
    async fn fetch_page(&self, id: PageId) -> FetchResult<Page>;

    /// Fetches a page by title, following redirects
    async fn fetch_page_by_title(&self, title: &str) -> FetchResult<Page>;
}
