//! Verse body extraction from rendered HTML

use crate::extract::classifier::POEM_SELECTOR;
use crate::record::Body;
use scraper::{ElementRef, Html, Node, Selector};

/// Extracts the poem blocks of a page as stanzas of verses
///
/// Line breaks end a verse; paragraph boundaries and blank lines end a
/// stanza. Returns an empty body when the page has no poem block.
pub fn extract_body(html: &str) -> Body {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(POEM_SELECTOR) else {
        return Body::default();
    };

    let mut stanzas = Vec::new();
    for block in document.select(&selector) {
        // Nested blocks are read through their outermost poem ancestor
        let nested = block
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| selector.matches(&a));
        if nested {
            continue;
        }
        stanzas.extend(block_stanzas(block));
    }

    Body::from_stanzas(stanzas)
}

fn push_text(element: ElementRef<'_>, raw: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    raw.push('\n');
                    continue;
                }
                let breaks_stanza = matches!(name, "p" | "div");
                if breaks_stanza {
                    raw.push_str("\n\n");
                }
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, raw);
                }
                if breaks_stanza {
                    raw.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

fn block_stanzas(block: ElementRef<'_>) -> Vec<Vec<String>> {
    let mut raw = String::new();
    push_text(block, &mut raw);

    let mut stanzas = Vec::new();
    let mut current = Vec::new();
    for line in raw.lines() {
        let verse = line.replace('\u{a0}', " ");
        let verse = verse.trim();
        if verse.is_empty() {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
        } else {
            current.push(verse.to_string());
        }
    }
    if !current.is_empty() {
        stanzas.push(current);
    }

    stanzas
}
