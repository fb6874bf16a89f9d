//! Content-based page classification

use crate::source::Page;
use crate::wikitext::{self, parse_templates};
use scraper::{Html, Selector};
use std::fmt;

/// What a fetched page is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// An ordered anthology of content items and sub-collections
    Collection,
    /// A leaf page holding extractable text
    ContentItem,
    /// Neither; counted and skipped
    Unclassified,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collection => "collection",
            Self::ContentItem => "content_item",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{}", name)
    }
}

/// A classification decision with the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: PageKind,
    pub reason: &'static str,
}

impl Classification {
    const fn new(kind: PageKind, reason: &'static str) -> Self {
        Self { kind, reason }
    }
}

const DISAMBIGUATION_TEMPLATES: &[&str] = &["homonymie", "disambig", "homonymes"];

/// Wikitext templates that lay out a table of entries
const SUMMARY_TEMPLATES: &[&str] = &["sommaire", "table des matières", "tdm", "contents"];

/// Rendered constructs that lay out a table of entries
const SUMMARY_SELECTOR: &str = ".ws-summary, #ws-summary, .ws-toc, table.tdm";

/// The generic heading box MediaWiki adds to any page with enough sections
const HEADING_TOC_SELECTOR: &str = "#toc, .toc";

/// Rendered poem blocks
pub(crate) const POEM_SELECTOR: &str = "div.poem, span.poem, poem";

/// A paged heading box only marks a collection on a page that also carries
/// verse when it links at least this many pages
const MIN_COLLECTION_LINKS: usize = 6;

/// Author namespace number on Wikisource
const AUTHOR_NAMESPACE: i64 = 102;
const AUTHOR_NAMESPACE_FR: i64 = 104;

/// Classifies a page
pub fn classify(page: &Page) -> PageKind {
    classify_with_reason(page).kind
}

/// Classifies a page, reporting which rule decided
///
/// Rules apply in priority order: explicit table-of-entries markers make a
/// collection; a content-body marker with no table of entries makes a
/// content item; anything else is unclassified.
pub fn classify_with_reason(page: &Page) -> Classification {
    if page.namespace == AUTHOR_NAMESPACE
        || page.namespace == AUTHOR_NAMESPACE_FR
        || wikitext::is_excluded_namespace(&page.title)
    {
        return Classification::new(PageKind::Unclassified, "non-content namespace");
    }

    let templates = parse_templates(&page.wikitext);
    if templates.iter().any(|t| t.is_named(DISAMBIGUATION_TEMPLATES)) {
        return Classification::new(PageKind::Unclassified, "disambiguation page");
    }

    let document = Html::parse_document(&page.html);
    let has_poem = page.wikitext.contains("<poem") || matches_any(&document, POEM_SELECTOR);

    if templates.iter().any(|t| t.is_named(SUMMARY_TEMPLATES))
        || matches_any(&document, SUMMARY_SELECTOR)
    {
        return Classification::new(PageKind::Collection, "table of entries");
    }

    if matches_any(&document, HEADING_TOC_SELECTOR) {
        if !has_poem {
            return Classification::new(PageKind::Collection, "table of contents without verse");
        }
        if content_link_count(&document) >= MIN_COLLECTION_LINKS {
            return Classification::new(PageKind::Collection, "table of contents with many links");
        }
    }

    if has_poem {
        return Classification::new(PageKind::ContentItem, "poem body");
    }

    Classification::new(PageKind::Unclassified, "no structural or body marker")
}

fn matches_any(document: &Html, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

fn content_link_count(document: &Html) -> usize {
    let Ok(selector) = Selector::parse("a[href]") else {
        return 0;
    };
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| wikitext::title_from_href(href).is_some())
        .count()
}
