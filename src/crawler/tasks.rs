//! Work performed inside spawned crawl tasks
//!
//! Tasks only fetch and extract. They never touch the crawl state, the
//! checkpoint store or the sink; the scheduler commits what they return.

use crate::crawler::fetcher::{FetchClass, FetchFailure, Fetcher};
use crate::extract::{
    classify_with_reason, extract_body, extract_metadata, extract_structure, ExtractedCollection,
    PageKind,
};
use crate::source::{Category, Page, PageId};
use crate::state::{ContentJob, Prepared};
use std::sync::Arc;

/// What a finished task hands back to the scheduler
#[derive(Debug)]
pub(crate) enum TaskResult {
    Listed {
        title: String,
        result: Result<Category, FetchFailure>,
    },
    Explored {
        id: PageId,
        title: String,
        result: Result<Explored, FetchFailure>,
    },
    Built {
        job: ContentJob,
        result: Result<Built, FetchFailure>,
    },
}

/// A category member after its classification fetch
#[derive(Debug)]
pub(crate) enum Explored {
    Collection {
        extracted: ExtractedCollection,
        reason: &'static str,
    },
    /// A content page, with its extraction when one was requested
    Content {
        prepared: Option<Prepared>,
        reason: &'static str,
    },
    Unclassified(&'static str),
    /// The run was cancelled while lookahead fetches were in flight
    Interrupted,
}

/// A content page after its content-phase fetch
#[derive(Debug)]
pub(crate) enum Built {
    Prepared(Prepared),
    /// The page no longer classifies as a content item
    NotContent(PageKind),
}

fn prepare(page: &Page) -> Prepared {
    Prepared {
        title: page.title.clone(),
        metadata: extract_metadata(page),
        body: extract_body(&page.html),
    }
}

pub(crate) async fn list_category(fetcher: Arc<Fetcher>, title: String) -> TaskResult {
    let result = fetcher.fetch_category(&title).await;
    TaskResult::Listed { title, result }
}

pub(crate) async fn explore_page(
    fetcher: Arc<Fetcher>,
    id: PageId,
    title: String,
    max_depth: usize,
    extract_content: bool,
) -> TaskResult {
    let result = explore(&fetcher, id, max_depth, extract_content).await;
    TaskResult::Explored { id, title, result }
}

async fn explore(
    fetcher: &Fetcher,
    id: PageId,
    max_depth: usize,
    extract_content: bool,
) -> Result<Explored, FetchFailure> {
    let page = fetcher.fetch_page(id, FetchClass::Exploration).await?;
    let classification = classify_with_reason(&page);
    tracing::debug!(
        "Classified {} as {} ({})",
        page.title,
        classification.kind,
        classification.reason
    );

    let explored = match classification.kind {
        PageKind::Collection => {
            let extracted = extract_structure(&page, fetcher, max_depth).await;
            if fetcher.is_cancelled() {
                Explored::Interrupted
            } else {
                Explored::Collection {
                    extracted,
                    reason: classification.reason,
                }
            }
        }
        PageKind::ContentItem => Explored::Content {
            prepared: extract_content.then(|| prepare(&page)),
            reason: classification.reason,
        },
        PageKind::Unclassified => Explored::Unclassified(classification.reason),
    };
    Ok(explored)
}

pub(crate) async fn build_content(fetcher: Arc<Fetcher>, mut job: ContentJob) -> TaskResult {
    let result = match job.prepared.take() {
        Some(prepared) => Ok(Built::Prepared(prepared)),
        None => fetch_content(&fetcher, job.page_id).await,
    };
    TaskResult::Built { job, result }
}

async fn fetch_content(fetcher: &Fetcher, id: PageId) -> Result<Built, FetchFailure> {
    let page = fetcher.fetch_page(id, FetchClass::Content).await?;
    Ok(match classify_with_reason(&page).kind {
        PageKind::ContentItem => Built::Prepared(prepare(&page)),
        kind => Built::NotContent(kind),
    })
}
