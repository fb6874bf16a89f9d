//! Metadata extraction
//!
//! Structured signals (header templates, author and licence templates,
//! categories) take precedence over free-text heuristics read from the
//! rendered HTML and the page title. A field with neither stays `None`.

use crate::record::Metadata;
use crate::source::Page;
use crate::wikitext::{clean_title, normalize_name, parse_templates, plain_text, Template};
use scraper::{Html, Selector};

const HEADER_TEMPLATES: &[&str] = &["header", "en-tête", "entête", "titre", "header2"];
const AUTHOR_TEMPLATES: &[&str] = &["auteur", "author"];
const AUTHOR_PARAMS: &[&str] = &["author", "auteur"];
const DATE_PARAMS: &[&str] = &["year", "date", "année"];
const TITLE_PARAMS: &[&str] = &["title", "titre"];

const LICENSE_PREFIXES: &[&str] = &["pd-", "dp-", "cc-"];
const PUBLIC_DOMAIN_NAMES: &[&str] = &["public domain", "domaine public"];

/// Extracts bibliographic metadata from a content page
pub fn extract_metadata(page: &Page) -> Metadata {
    let templates = parse_templates(&page.wikitext);
    let document = Html::parse_document(&page.html);

    let header_value = |keys: &[&str]| {
        templates
            .iter()
            .filter(|t| t.is_named(HEADER_TEMPLATES))
            .find_map(|t| t.param(keys))
            .map(plain_text)
            .filter(|v| !v.is_empty())
    };

    let title = header_value(TITLE_PARAMS).or_else(|| {
        let cleaned = clean_title(&page.title);
        (!cleaned.is_empty()).then_some(cleaned)
    });

    let author = structured_author(&templates)
        .or_else(|| selector_text(&document, ".ws-author, #ws-author"));

    let date = header_value(DATE_PARAMS).or_else(|| selector_text(&document, ".ws-year, #ws-year"));

    let license = structured_license(&templates, &page.categories)
        .or_else(|| selector_text(&document, ".licenseContainer"));

    Metadata {
        title,
        author,
        date,
        license,
    }
}

/// Author names from header parameters and author templates, merged when
/// their case- and whitespace-folded forms are identical
fn structured_author(templates: &[Template]) -> Option<String> {
    let mut names: Vec<String> = Vec::new();
    let mut folded: Vec<String> = Vec::new();

    let candidates = templates.iter().filter_map(|t| {
        if t.is_named(HEADER_TEMPLATES) {
            t.param(AUTHOR_PARAMS)
        } else if t.is_named(AUTHOR_TEMPLATES) {
            t.param(&["1"])
        } else {
            None
        }
    });

    for candidate in candidates {
        let name = plain_text(candidate);
        if name.is_empty() {
            continue;
        }
        let key = normalize_name(&name);
        if !folded.contains(&key) {
            folded.push(key);
            names.push(name);
        }
    }

    (!names.is_empty()).then(|| names.join(", "))
}

fn structured_license(templates: &[Template], categories: &[String]) -> Option<String> {
    let from_template = templates.iter().find_map(|t| {
        let name = t.name.trim().to_lowercase();
        let is_license = LICENSE_PREFIXES.iter().any(|p| name.starts_with(p))
            || PUBLIC_DOMAIN_NAMES.contains(&name.replace('_', " ").as_str());
        is_license.then(|| t.name.trim().to_string())
    });

    from_template.or_else(|| {
        categories.iter().find_map(|category| {
            let lower = category.to_lowercase();
            PUBLIC_DOMAIN_NAMES
                .iter()
                .any(|name| lower.contains(name))
                .then(|| "Public domain".to_string())
        })
    })
}

fn selector_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}
