//! Output record model
//!
//! This module contains the types that flow from extraction to the sink:
//! - `Entry` and `CollectionStructure`, the ordered shape of a collection
//! - `Placement`, the position of a content item inside one collection
//! - `CandidateRecord`, an unvalidated record as assembled by the crawler
//! - `ContentRecord`, the validated unit written to the output stream

mod validation;

pub use validation::{validate, Rejected};

use crate::source::PageId;
use serde::{Deserialize, Serialize};

/// One element of a collection's ordered structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    /// A section heading; consumes no order slot
    SectionHeader { title: String },
    /// A reference to a content item at a zero-based position
    ContentRef { page_id: PageId, order_index: u32 },
}

impl Entry {
    pub fn section(title: impl Into<String>) -> Self {
        Self::SectionHeader {
            title: title.into(),
        }
    }

    pub fn content(page_id: impl Into<PageId>, order_index: u32) -> Self {
        Self::ContentRef {
            page_id: page_id.into(),
            order_index,
        }
    }
}

/// The ordered entry sequence of one collection
///
/// `order_index` values are assigned by `push_content` and are always
/// `0, 1, 2, ...` in push order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionStructure {
    entries: Vec<Entry>,
}

impl CollectionStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_section(&mut self, title: impl Into<String>) {
        self.entries.push(Entry::section(title));
    }

    /// Appends a content reference and returns the index it was given
    pub fn push_content(&mut self, page_id: PageId) -> u32 {
        let order_index = self.content_count() as u32;
        self.entries.push(Entry::content(page_id, order_index));
        order_index
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Content references in order, as `(page_id, order_index)`
    pub fn content_refs(&self) -> impl Iterator<Item = (PageId, u32)> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::ContentRef {
                page_id,
                order_index,
            } => Some((*page_id, *order_index)),
            Entry::SectionHeader { .. } => None,
        })
    }

    /// Whether the structure references `page_id` at `order_index`
    pub fn places(&self, page_id: PageId, order_index: u32) -> bool {
        self.content_refs()
            .any(|(id, index)| id == page_id && index == order_index)
    }

    pub fn content_count(&self) -> usize {
        self.content_refs().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a content item sits within one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub collection_page_id: PageId,
    pub collection_title: String,
    pub section_title: Option<String>,
    pub poem_order: u32,
    /// This is the lowest-ordered emittable member; its record carries the structure
    pub carries_structure: bool,
}

/// Bibliographic attributes of a content page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub license: Option<String>,
}

/// Structured text of a content page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Verses grouped by stanza
    pub stanzas: Vec<Vec<String>>,
    /// Verses joined by newlines, stanzas by blank lines
    pub text: String,
}

impl Body {
    pub fn from_stanzas(stanzas: Vec<Vec<String>>) -> Self {
        let text = stanzas
            .iter()
            .map(|stanza| stanza.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { stanzas, text }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A record as assembled from extraction, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub page_id: PageId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub license: Option<String>,
    pub body: Body,
    pub collection_page_id: Option<PageId>,
    pub collection_title: Option<String>,
    pub section_title: Option<String>,
    pub poem_order: Option<i64>,
    pub collection_structure: Option<CollectionStructure>,
}

impl CandidateRecord {
    /// A standalone candidate with no placement
    pub fn new(page_id: PageId, metadata: Metadata, body: Body) -> Self {
        Self {
            page_id,
            title: metadata.title,
            author: metadata.author,
            date: metadata.date,
            license: metadata.license,
            body,
            collection_page_id: None,
            collection_title: None,
            section_title: None,
            poem_order: None,
            collection_structure: None,
        }
    }

    pub fn with_placement(
        mut self,
        placement: &Placement,
        structure: Option<CollectionStructure>,
    ) -> Self {
        self.collection_page_id = Some(placement.collection_page_id);
        self.collection_title = Some(placement.collection_title.clone());
        self.section_title = placement.section_title.clone();
        self.poem_order = Some(i64::from(placement.poem_order));
        self.collection_structure = structure;
        self
    }
}

/// A validated record, serialized as one line of the output stream
///
/// Absent values serialize as `null`; no field is ever omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub page_id: PageId,
    pub title: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub license: Option<String>,
    pub body: Body,
    pub collection_page_id: Option<PageId>,
    pub collection_title: Option<String>,
    pub section_title: Option<String>,
    pub poem_order: Option<u32>,
    pub collection_structure: Option<CollectionStructure>,
}
