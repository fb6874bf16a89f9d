//! Remote content source
//!
//! This module defines the data the crawler consumes from the wiki:
//! - `Category` listings that seed the frontier
//! - `Page` payloads (raw wikitext plus rendered HTML)
//! - The `RemoteSource` trait and its fetch error taxonomy
//! - `MediaWikiClient`, the HTTP implementation against the MediaWiki action API

mod mediawiki;
mod traits;

pub use mediawiki::{build_http_client, MediaWikiClient};
pub use traits::{FetchError, FetchResult, RemoteSource};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-assigned, stable page identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// What a category member is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// An ordinary page: a collection, a content item, or neither
    Page,
    /// A nested category
    Subcategory,
}

/// One entry of a category listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMember {
    pub id: PageId,
    pub title: String,
    pub kind: MemberKind,
}

/// A fetched category listing. Only used to seed the frontier.
#[derive(Debug, Clone)]
pub struct Category {
    /// Full title including the namespace prefix (e.g. `Category:Poems`)
    pub title: String,
    pub members: Vec<CategoryMember>,
}

impl Category {
    /// Display name without the namespace prefix
    pub fn display_name(&self) -> &str {
        self.title
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.title)
    }
}

/// A fetched page
///
/// Lives only for the duration of the pipeline stage that fetched it.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    /// MediaWiki namespace number (0 for main content)
    pub namespace: i64,
    pub wikitext: String,
    pub html: String,
    /// Category names without the namespace prefix
    pub categories: Vec<String>,
}

impl Page {
    /// Creates a main-namespace page with no categories
    pub fn new(id: impl Into<PageId>, title: &str, wikitext: &str, html: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            namespace: 0,
            wikitext: wikitext.to_string(),
            html: html.to_string(),
            categories: Vec::new(),
        }
    }
}

/// Adds `prefix:` to a bare category name; titles that already carry a
/// namespace are returned unchanged.
pub fn category_title(name: &str, prefix: &str) -> String {
    let name = name.trim();
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}
