//! Minimal wiki markup primitives
//!
//! - A scanner for top-level templates and category links in raw wikitext
//! - Title helpers shared by the structure scanner and the metadata extractor

mod templates;

pub use templates::{category_links, parse_templates, Template};

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;

/// Namespaces whose pages never count as collection or content links
const EXCLUDED_NAMESPACES: &[&str] = &[
    "category",
    "catégorie",
    "author",
    "auteur",
    "portal",
    "portail",
    "help",
    "aide",
    "file",
    "fichier",
    "image",
    "special",
    "spécial",
    "talk",
    "discussion",
    "template",
    "modèle",
    "index",
    "page",
    "wikisource",
    "user",
    "utilisateur",
];

/// Canonical form of a page title: underscores become spaces, runs of
/// whitespace collapse, and the first letter is upper-cased
pub fn canonical_title(title: &str) -> String {
    let collapsed = title
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves an internal `/wiki/<Title>` href to its canonical page title
///
/// Returns `None` for external links, edit links, bare fragments, and links
/// into excluded namespaces.
pub fn title_from_href(href: &str) -> Option<String> {
    let path = href.strip_prefix("/wiki/")?;
    let path = path.split('#').next().unwrap_or(path);
    if path.is_empty() || path.contains('?') {
        return None;
    }

    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let title = canonical_title(&decoded);
    if title.is_empty() || is_excluded_namespace(&title) {
        return None;
    }
    Some(title)
}

/// Whether the title carries a namespace that is never crawled as content
pub fn is_excluded_namespace(title: &str) -> bool {
    match title.split_once(':') {
        Some((ns, _)) => {
            let ns = ns.trim().to_lowercase();
            EXCLUDED_NAMESPACES.iter().any(|excluded| *excluded == ns)
        }
        None => false,
    }
}

/// Human title derived from a page title: the last `/` segment with
/// parenthesised qualifiers removed
///
/// Falls back to the trimmed input when cleaning leaves nothing.
pub fn clean_title(title: &str) -> String {
    static PARENTHETICAL: OnceLock<Regex> = OnceLock::new();
    let re = PARENTHETICAL.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"));

    let last = title.rsplit('/').next().unwrap_or(title);
    let cleaned = re.replace_all(last, "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        title.trim().to_string()
    } else {
        cleaned
    }
}

/// Case and whitespace folding used for exact-match name merging
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strips the simplest inline markup from a template value: wiki links keep
/// their label, formatting templates keep their last argument, bold and
/// italic quotes are dropped
pub fn plain_text(value: &str) -> String {
    static LINK: OnceLock<Regex> = OnceLock::new();
    static INLINE_TEMPLATE: OnceLock<Regex> = OnceLock::new();

    let link = LINK.get_or_init(|| {
        Regex::new(r"\[\[(?:[^\]|]*\|)?([^\]]*)\]\]").expect("valid regex")
    });
    let inline = INLINE_TEMPLATE.get_or_init(|| {
        Regex::new(r"\{\{[^{}|]*\|(?:[^{}|]*\|)*([^{}|]*)\}\}").expect("valid regex")
    });

    let text = link.replace_all(value, "$1");
    let text = inline.replace_all(&text, "$1");
    let text = text.replace("'''", "").replace("''", "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
