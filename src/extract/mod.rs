//! Page extraction
//!
//! Everything here is a synchronous transformation over one page's data,
//! except `extract_structure`, which suspends only on its resolver's lookahead
//! fetches.
//!
//! # Components
//!
//! - `classify`: decides whether a page is a collection, a content item, or neither
//! - `extract_structure`: turns a collection page into its ordered entry sequence
//! - `extract_metadata`: author, date, licence and title attributes
//! - `extract_body`: the verse body as stanzas

mod body;
mod classifier;
mod metadata;
mod structure;

pub use body::extract_body;
pub use classifier::{classify, classify_with_reason, Classification, PageKind};
pub use metadata::extract_metadata;
pub use structure::{
    extract_structure, scan_structure, ExtractedCollection, Member, PageResolver, Resolution,
    ScanItem, StructuralAnomaly,
};
