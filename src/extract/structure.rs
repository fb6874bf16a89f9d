//! Collection structure extraction
//!
//! Extraction runs in two steps:
//! - `scan_structure` walks the rendered HTML of one page in document order
//!   and yields headings and qualifying links. It is pure and synchronous.
//! - `extract_structure` resolves each link through a `PageResolver` and
//!   builds the flat entry sequence, recursing into nested collections.

use crate::extract::classifier::{classify, PageKind};
use crate::record::CollectionStructure;
use crate::source::{Page, PageId};
use crate::wikitext::{canonical_title, title_from_href};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// One structural element found on a collection page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    Heading(String),
    /// Canonical title of a linked page
    Link(String),
}

/// A content page's position within an extracted collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub page_id: PageId,
    pub title: String,
    pub order_index: u32,
    /// Nearest enclosing section title, innermost scope first
    pub section_title: Option<String>,
}

/// Irregular nesting found while expanding a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralAnomaly {
    /// A collection reached again from inside itself
    Cycle { page_id: PageId, title: String },
    /// Nesting deeper than the configured bound
    DepthExceeded {
        page_id: PageId,
        title: String,
        depth: usize,
    },
}

impl fmt::Display for StructuralAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { title, page_id } => {
                write!(f, "cycle back to {} ({})", title, page_id)
            }
            Self::DepthExceeded {
                title,
                page_id,
                depth,
            } => write!(f, "{} ({}) nested beyond depth {}", title, page_id, depth),
        }
    }
}

/// The result of expanding one collection page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCollection {
    pub page_id: PageId,
    pub title: String,
    pub structure: CollectionStructure,
    /// Emittable content items, in order
    pub members: Vec<Member>,
    pub anomalies: Vec<StructuralAnomaly>,
}

impl ExtractedCollection {
    /// Order index of the first emittable member
    ///
    /// This is 0 unless the collection opens with a cycle or depth leaf.
    pub fn anchor_order(&self) -> Option<u32> {
        self.members.iter().map(|member| member.order_index).min()
    }
}

/// Outcome of a lookahead fetch
#[derive(Debug)]
pub enum Resolution {
    Found(Page),
    NotFound,
    /// Resolution gave up (retries exhausted or a malformed response)
    Failed(String),
}

/// Lookahead access used by the extractor to inspect linked pages
#[async_trait]
pub trait PageResolver: Send + Sync {
    async fn resolve(&self, title: &str) -> Resolution;
}

/// Containers whose links are navigation, never entries
const IGNORED_LINK_CONTAINERS: &[&str] = &[
    "mw-editsection",
    "ws-noexport",
    "headertemplate",
    "reference",
    "references",
    "navbox",
    "printfooter",
    "catlinks",
];

fn has_class_or_id(element: &ElementRef<'_>, names: &[&str]) -> bool {
    let value = element.value();
    value.id().is_some_and(|id| names.contains(&id)) || value.classes().any(|c| names.contains(&c))
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn ancestors<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element.ancestors().filter_map(ElementRef::wrap)
}

/// Text of a heading without its edit-section links
fn heading_text(heading: &ElementRef<'_>) -> String {
    if let Ok(headline) = Selector::parse(".mw-headline") {
        if let Some(inner) = heading.select(&headline).next() {
            return collapse(&inner.text().collect::<String>());
        }
    }

    let text: String = heading
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let skipped = node.ancestors().filter_map(ElementRef::wrap).any(|el| {
                    el.value().classes().any(|c| c == "mw-editsection")
                });
                (!skipped).then(|| (&**text).to_string())
            }
            _ => None,
        })
        .collect();
    collapse(&text)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks a collection page's rendered HTML in document order
///
/// Headings inside the table-of-contents box are ignored. Links qualify when
/// they point to an internal content title other than `self_title`, outside
/// headings and navigation containers. Each title is reported once.
pub fn scan_structure(html: &str, self_title: &str) -> Vec<ScanItem> {
    let Ok(selector) = Selector::parse("h2, h3, h4, h5, h6, a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let self_title = canonical_title(self_title);
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for element in document.select(&selector) {
        let name = element.value().name();

        if is_heading(name) {
            if ancestors(&element).any(|a| has_class_or_id(&a, &["toc"])) {
                continue;
            }
            let text = heading_text(&element);
            if !text.is_empty() {
                items.push(ScanItem::Heading(text));
            }
            continue;
        }

        let nested = ancestors(&element).any(|a| {
            is_heading(a.value().name()) || has_class_or_id(&a, IGNORED_LINK_CONTAINERS)
        });
        if nested {
            continue;
        }

        let Some(title) = element.value().attr("href").and_then(title_from_href) else {
            continue;
        };
        if title == self_title || !seen.insert(title.clone()) {
            continue;
        }
        items.push(ScanItem::Link(title));
    }

    items
}

/// Mutable state threaded through one expansion
struct Expansion {
    structure: CollectionStructure,
    members: Vec<Member>,
    anomalies: Vec<StructuralAnomaly>,
    /// Collections on the current recursion path
    path: Vec<PageId>,
    placed: HashSet<PageId>,
    resolved_titles: HashSet<String>,
    max_depth: usize,
}

/// Expands a collection page into its flat, ordered structure
///
/// Nested collections are inlined at their link position with their own
/// section headers; their section scope ends with them. A collection already
/// on the recursion path, or one nested deeper than `max_depth`, becomes a
/// leaf reference and an anomaly.
pub async fn extract_structure<R>(
    collection: &Page,
    resolver: &R,
    max_depth: usize,
) -> ExtractedCollection
where
    R: PageResolver + ?Sized,
{
    let items = scan_structure(&collection.html, &collection.title);
    let mut expansion = Expansion {
        structure: CollectionStructure::new(),
        members: Vec::new(),
        anomalies: Vec::new(),
        path: vec![collection.id],
        placed: HashSet::new(),
        resolved_titles: HashSet::new(),
        max_depth,
    };

    expand(resolver, items, None, 1, &mut expansion).await;

    for anomaly in &expansion.anomalies {
        tracing::warn!("Structural anomaly in {}: {}", collection.title, anomaly);
    }

    ExtractedCollection {
        page_id: collection.id,
        title: collection.title.clone(),
        structure: expansion.structure,
        members: expansion.members,
        anomalies: expansion.anomalies,
    }
}

fn expand<'a, R>(
    resolver: &'a R,
    items: Vec<ScanItem>,
    inherited_section: Option<String>,
    depth: usize,
    state: &'a mut Expansion,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>
where
    R: PageResolver + ?Sized,
{
    Box::pin(async move {
        let mut section = inherited_section;

        for item in items {
            let title = match item {
                ScanItem::Heading(heading) => {
                    state.structure.push_section(heading.clone());
                    section = Some(heading);
                    continue;
                }
                ScanItem::Link(title) => title,
            };

            if !state.resolved_titles.insert(title.clone()) {
                continue;
            }

            let page = match resolver.resolve(&title).await {
                Resolution::Found(page) => page,
                Resolution::NotFound => {
                    tracing::debug!("Dropping link to missing page {}", title);
                    continue;
                }
                Resolution::Failed(reason) => {
                    tracing::warn!("Dropping unresolvable link {}: {}", title, reason);
                    continue;
                }
            };

            if state.placed.contains(&page.id) {
                continue;
            }

            match classify(&page) {
                PageKind::ContentItem => {
                    state.placed.insert(page.id);
                    let order_index = state.structure.push_content(page.id);
                    state.members.push(Member {
                        page_id: page.id,
                        title: page.title,
                        order_index,
                        section_title: section.clone(),
                    });
                }
                PageKind::Collection => {
                    if state.path.contains(&page.id) {
                        state.anomalies.push(StructuralAnomaly::Cycle {
                            page_id: page.id,
                            title: page.title,
                        });
                        state.placed.insert(page.id);
                        state.structure.push_content(page.id);
                        continue;
                    }
                    if depth >= state.max_depth {
                        state.anomalies.push(StructuralAnomaly::DepthExceeded {
                            page_id: page.id,
                            title: page.title,
                            depth,
                        });
                        state.placed.insert(page.id);
                        state.structure.push_content(page.id);
                        continue;
                    }

                    let child_items = scan_structure(&page.html, &page.title);
                    tracing::debug!(
                        "Inlining nested collection {} ({} items)",
                        page.title,
                        child_items.len()
                    );
                    state.path.push(page.id);
                    expand(resolver, child_items, section.clone(), depth + 1, state).await;
                    state.path.pop();
                }
                PageKind::Unclassified => {
                    tracing::debug!("Dropping link to unclassified page {}", page.title);
                }
            }
        }
    })
}
