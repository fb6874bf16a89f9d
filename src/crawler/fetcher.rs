//! Retrying fetcher over a remote source
//!
//! This module wraps every remote call the crawler makes, including:
//! - Permit acquisition from the exploration or content pool plus the joint pool
//! - A timeout on each attempt
//! - Exponential backoff for rate limits and transient failures
//! - Mapping the final failure onto a terminal outcome
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | RateLimited | Retry after the server's delay, or the backoff delay |
//! | Transient / attempt timeout | Retry with backoff |
//! | Retries exhausted | `failed` |
//! | NotFound / Malformed | Immediate `skipped` |
//! | Cancelled while waiting | Nothing recorded |

use crate::config::CrawlerConfig;
use crate::extract::{PageResolver, Resolution};
use crate::source::{Category, FetchError, FetchResult, Page, PageId, RemoteSource};
use crate::state::Outcome;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

/// Which permit pool a fetch draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchClass {
    /// Category listings, classification and lookahead fetches
    Exploration,
    /// Fetches that build a record
    Content,
}

/// Attempt bound, backoff curve and per-attempt timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            attempt_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_max, |delay| delay.min(self.backoff_max))
    }
}

/// Why a fetch produced no value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    /// A non-retryable signal from the source
    #[error("{0}")]
    Permanent(FetchError),

    /// Every attempt failed with a retryable signal
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: FetchError },

    /// The run was cancelled before the fetch could finish
    #[error("cancelled")]
    Cancelled,
}

impl FetchFailure {
    /// The outcome to checkpoint, or `None` when nothing should be recorded
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Permanent(_) => Some(Outcome::Skipped),
            Self::Exhausted { .. } => Some(Outcome::Failed),
            Self::Cancelled => None,
        }
    }
}

/// Bounded, retrying access to a `RemoteSource`
pub struct Fetcher {
    source: Arc<dyn RemoteSource>,
    joint: Semaphore,
    exploration: Semaphore,
    content: Semaphore,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        config: &CrawlerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            joint: Semaphore::new(config.max_workers.max(1) as usize),
            exploration: Semaphore::new(config.exploration_permits()),
            content: Semaphore::new(config.content_permits()),
            policy: RetryPolicy::from_config(config),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn fetch_category(&self, title: &str) -> Result<Category, FetchFailure> {
        self.with_retry(FetchClass::Exploration, title, || {
            self.source.fetch_category(title)
        })
        .await
    }

    pub async fn fetch_page(&self, id: PageId, class: FetchClass) -> Result<Page, FetchFailure> {
        let what = format!("page {}", id);
        self.with_retry(class, &what, || self.source.fetch_page(id))
            .await
    }

    pub async fn fetch_page_by_title(&self, title: &str) -> Result<Page, FetchFailure> {
        self.with_retry(FetchClass::Exploration, title, || {
            self.source.fetch_page_by_title(title)
        })
        .await
    }

    /// Holds a class permit and a joint permit for the duration of one attempt
    async fn permits(
        &self,
        class: FetchClass,
    ) -> Option<(SemaphorePermit<'_>, SemaphorePermit<'_>)> {
        let pool = match class {
            FetchClass::Exploration => &self.exploration,
            FetchClass::Content => &self.content,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            acquired = async {
                let class_permit = pool.acquire().await.ok()?;
                let joint_permit = self.joint.acquire().await.ok()?;
                Some((class_permit, joint_permit))
            } => acquired,
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        class: FetchClass,
        what: &str,
        mut operation: F,
    ) -> Result<T, FetchFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = {
                let Some(_permits) = self.permits(class).await else {
                    return Err(FetchFailure::Cancelled);
                };
                match tokio::time::timeout(self.policy.attempt_timeout, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Transient(format!(
                        "attempt timed out after {:?}",
                        self.policy.attempt_timeout
                    ))),
                }
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::debug!("Permanent failure fetching {}: {}", what, error);
                return Err(FetchFailure::Permanent(error));
            }

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    "Giving up on {} after {} attempts: {}",
                    what,
                    attempt,
                    error
                );
                return Err(FetchFailure::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = error
                .retry_after()
                .unwrap_or_else(|| self.policy.backoff(attempt));
            tracing::debug!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempt,
                what,
                error,
                delay
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchFailure::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl PageResolver for Fetcher {
    async fn resolve(&self, title: &str) -> Resolution {
        match self.fetch_page_by_title(title).await {
            Ok(page) => Resolution::Found(page),
            Err(FetchFailure::Permanent(FetchError::NotFound(_))) => Resolution::NotFound,
            Err(failure) => Resolution::Failed(failure.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results for `fetch_page`, one per call
    struct ScriptedSource {
        script: Mutex<VecDeque<FetchResult<Page>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(script: Vec<FetchResult<Page>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RemoteSource for ScriptedSource {
        async fn fetch_category(&self, title: &str) -> FetchResult<Category> {
            Err(FetchError::NotFound(title.to_string()))
        }

        async fn fetch_page(&self, _id: PageId) -> FetchResult<Page> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transient("script exhausted".to_string())))
        }

        async fn fetch_page_by_title(&self, title: &str) -> FetchResult<Page> {
            Err(FetchError::NotFound(title.to_string()))
        }
    }

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            max_workers: 2,
            exploration_workers: None,
            content_workers: Some(1),
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
            fetch_timeout_secs: 5,
            max_nesting_depth: 8,
            limit: None,
        }
    }

    fn fetcher(source: Arc<ScriptedSource>) -> Fetcher {
        Fetcher::new(source, &test_config(), CancellationToken::new())
    }

    fn page() -> Page {
        Page::new(1u64, "Ode", "", "<p>ode</p>")
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_millis(3000),
            attempt_timeout: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3000));
        assert_eq!(policy.backoff(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_failure_outcomes() {
        let permanent = FetchFailure::Permanent(FetchError::NotFound("x".to_string()));
        assert_eq!(permanent.outcome(), Some(Outcome::Skipped));
        let exhausted = FetchFailure::Exhausted {
            attempts: 3,
            last: FetchError::Transient("503".to_string()),
        };
        assert_eq!(exhausted.outcome(), Some(Outcome::Failed));
        assert_eq!(FetchFailure::Cancelled.outcome(), None);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Transient("503".to_string())),
            Err(FetchError::RateLimited {
                retry_after: Some(Duration::from_millis(1)),
            }),
            Ok(page()),
        ]));
        let fetcher = fetcher(source.clone());

        let fetched = fetcher.fetch_page(PageId(1), FetchClass::Content).await;
        assert_eq!(fetched.unwrap().title, "Ode");
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let fetcher = fetcher(source.clone());

        let failure = fetcher
            .fetch_page(PageId(1), FetchClass::Exploration)
            .await
            .unwrap_err();
        assert!(matches!(failure, FetchFailure::Exhausted { attempts: 3, .. }));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::Malformed(
            "bad json".to_string(),
        ))]));
        let fetcher = fetcher(source.clone());

        let failure = fetcher
            .fetch_page(PageId(1), FetchClass::Content)
            .await
            .unwrap_err();
        assert_eq!(failure.outcome(), Some(Outcome::Skipped));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(page())]));
        let cancel = CancellationToken::new();
        let fetcher = Fetcher::new(source.clone(), &test_config(), cancel.clone());
        cancel.cancel();

        let failure = fetcher
            .fetch_page(PageId(1), FetchClass::Content)
            .await
            .unwrap_err();
        assert_eq!(failure, FetchFailure::Cancelled);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolver_maps_not_found() {
        let fetcher = fetcher(Arc::new(ScriptedSource::new(vec![])));
        assert!(matches!(fetcher.resolve("Missing").await, Resolution::NotFound));
    }
}
