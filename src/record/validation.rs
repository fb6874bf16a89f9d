//! Schema validation for candidate records
//!
//! Validation coerces what it safely can (trimming, blank strings to null,
//! stray structures dropped) and rejects everything else with the full list
//! of reasons.

use crate::record::{CandidateRecord, ContentRecord};
use std::fmt;

/// A candidate that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub reasons: Vec<String>,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected: {}", self.reasons.join("; "))
    }
}

impl std::error::Error for Rejected {}

fn coerce(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a candidate, producing the record that may be emitted
pub fn validate(candidate: CandidateRecord) -> Result<ContentRecord, Rejected> {
    let mut reasons = Vec::new();

    if candidate.page_id.0 == 0 {
        reasons.push("missing source page id".to_string());
    }

    let title = coerce(candidate.title);
    if title.is_none() {
        reasons.push("missing title".to_string());
    }

    if candidate.body.is_empty() {
        reasons.push("empty body".to_string());
    }

    let in_collection = candidate.collection_page_id.is_some();
    let section_title = coerce(candidate.section_title);

    let poem_order = match candidate.poem_order {
        Some(order) if !in_collection => {
            reasons.push(format!("poem_order {} without a collection", order));
            None
        }
        Some(order) => match u32::try_from(order) {
            Ok(order) => Some(order),
            Err(_) => {
                reasons.push(format!("poem_order {} is not a non-negative integer", order));
                None
            }
        },
        None if in_collection => {
            reasons.push("collection member without poem_order".to_string());
            None
        }
        None => None,
    };

    if section_title.is_some() && !in_collection {
        reasons.push("section_title without a collection".to_string());
    }

    if !reasons.is_empty() {
        return Err(Rejected { reasons });
    }

    let collection_structure = match (candidate.collection_structure, poem_order) {
        (Some(structure), Some(order)) if structure.places(candidate.page_id, order) => {
            Some(structure)
        }
        _ => None,
    };

    Ok(ContentRecord {
        page_id: candidate.page_id,
        title: title.unwrap_or_default(),
        author: coerce(candidate.author),
        date: coerce(candidate.date),
        license: coerce(candidate.license),
        body: candidate.body,
        collection_page_id: candidate.collection_page_id,
        collection_title: coerce(candidate.collection_title),
        section_title,
        poem_order,
        collection_structure,
    })
}
