//! Template and category-link scanner for raw wikitext
//!
//! Only top-level templates are reported. Pipes inside nested templates or
//! links never split a parameter.

use regex::Regex;
use std::sync::OnceLock;

/// A top-level `{{name|param|key=value}}` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    /// Parameters in source order; positional ones are keyed "1", "2", ...
    pub params: Vec<(String, String)>,
}

impl Template {
    /// Whether the template name equals any of `names`
    ///
    /// Comparison ignores case and treats underscores as spaces, matching how
    /// the wiki resolves template names.
    pub fn is_named(&self, names: &[&str]) -> bool {
        let own = fold_name(&self.name);
        names.iter().any(|n| fold_name(n) == own)
    }

    /// Value of the first parameter whose key matches one of `keys`, ignoring
    /// blank values
    pub fn param(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.params
                .iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.trim().is_empty())
                .map(|(_, v)| v.trim())
        })
    }
}

fn fold_name(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}

/// Scans `text` for top-level templates
pub fn parse_templates(text: &str) -> Vec<Template> {
    let bytes = text.as_bytes();
    let mut templates = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            match find_template_end(bytes, i) {
                Some(end) => {
                    if let Some(template) = build_template(&text[i + 2..end - 2]) {
                        templates.push(template);
                    }
                    i = end;
                }
                None => break,
            }
        } else {
            i += 1;
        }
    }

    templates
}

/// Returns the byte index just past the `}}` closing the template at `start`
fn find_template_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                i += 2;
            }
            (b'}', b'}') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }

    None
}

fn build_template(inner: &str) -> Option<Template> {
    let mut parts = split_top_level(inner).into_iter();
    let name = parts.next()?.trim().to_string();
    if name.is_empty() || name.starts_with('{') || name.starts_with('#') {
        return None;
    }

    let mut params = Vec::new();
    let mut position = 0;
    for part in parts {
        match split_named(part) {
            Some((key, value)) => params.push((key.trim().to_string(), value.trim().to_string())),
            None => {
                position += 1;
                params.push((position.to_string(), part.trim().to_string()));
            }
        }
    }

    Some(Template { name, params })
}

/// Splits on `|` that are not nested inside `{{ }}` or `[[ ]]`
fn split_top_level(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let pair = if i + 1 < bytes.len() {
            Some((bytes[i], bytes[i + 1]))
        } else {
            None
        };
        match pair {
            Some((b'{', b'{')) | Some((b'[', b'[')) => {
                depth += 1;
                i += 2;
                continue;
            }
            Some((b'}', b'}')) | Some((b']', b']')) => {
                depth -= 1;
                i += 2;
                continue;
            }
            _ => {}
        }
        if bytes[i] == b'|' && depth == 0 {
            parts.push(&inner[last..i]);
            last = i + 1;
        }
        i += 1;
    }
    parts.push(&inner[last..]);

    parts
}

/// Splits `key=value` when the `=` sits outside nested markup
fn split_named(part: &str) -> Option<(&str, &str)> {
    let eq = part.find('=')?;
    let key = &part[..eq];
    if key.contains("{{") || key.contains("[[") || key.trim().is_empty() {
        return None;
    }
    Some((key, &part[eq + 1..]))
}

/// Category names linked from the wikitext, without the namespace prefix
pub fn category_links(text: &str) -> Vec<String> {
    static CATEGORY_LINK: OnceLock<Regex> = OnceLock::new();
    let re = CATEGORY_LINK.get_or_init(|| {
        Regex::new(r"\[\[\s*(?i:category|catégorie)\s*:\s*([^\]|]+)").expect("valid regex")
    });

    re.captures_iter(text)
        .map(|c| c[1].trim().replace('_', " "))
        .filter(|name| !name.is_empty())
        .collect()
}
