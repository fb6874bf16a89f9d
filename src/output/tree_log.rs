//! Exploration tree logs
//!
//! With `--tree-log` the scheduler records, for every seed category, which
//! listing or collection each page was discovered from and how it was
//! classified. At the end of the run one text file per seed is written with
//! the tree drawn in box characters.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Directory under the output directory holding the tree files
pub const TREE_LOG_DIR: &str = "logs/tree-logs";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Classified {
    kind: String,
    reason: String,
    at: String,
}

/// Discovery edges and classifications gathered during one crawl
///
/// The first parent a page is discovered from is kept; later discoveries of
/// the same page are ignored, so every page appears once.
#[derive(Debug, Default)]
pub struct ExplorationTree {
    seeds: Vec<String>,
    parents: HashMap<String, String>,
    /// Children per node, in discovery order
    children: HashMap<String, Vec<String>>,
    classified: HashMap<String, Classified>,
}

impl ExplorationTree {
    pub fn new(seeds: &[String]) -> Self {
        Self {
            seeds: seeds.to_vec(),
            ..Self::default()
        }
    }

    /// Records that `child` was found in `parent`; returns whether it was new
    pub fn discover(&mut self, parent: &str, child: &str) -> bool {
        if child == parent || self.seeds.iter().any(|s| s == child) {
            return false;
        }
        if self.parents.contains_key(child) {
            return false;
        }
        self.parents.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        true
    }

    /// Records how a page was classified; the first classification is kept
    pub fn classify(&mut self, title: &str, kind: impl Into<String>, reason: impl Into<String>) {
        self.classified
            .entry(title.to_string())
            .or_insert_with(|| Classified {
                kind: kind.into(),
                reason: reason.into(),
                at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            });
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// Draws the tree below one seed
    pub fn render(&self, seed: &str) -> String {
        let mut out = format!("{}\n", seed);
        let mut drawn = HashSet::from([seed.to_string()]);
        self.render_children(&mut out, seed, "", &mut drawn);
        out
    }

    fn render_children(
        &self,
        out: &mut String,
        node: &str,
        prefix: &str,
        drawn: &mut HashSet<String>,
    ) {
        let Some(children) = self.children.get(node) else {
            return;
        };
        let children: Vec<&String> = children.iter().filter(|c| !drawn.contains(*c)).collect();

        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            drawn.insert((*child).clone());

            let connector = if last { "└── " } else { "├── " };
            out.push_str(prefix);
            out.push_str(connector);
            out.push_str(&self.label(child));
            out.push('\n');

            let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.render_children(out, child, &nested, drawn);
        }
    }

    fn label(&self, title: &str) -> String {
        match self.classified.get(title) {
            Some(c) if c.reason.is_empty() => format!("{} [{}] {}", title, c.kind, c.at),
            Some(c) => format!("{} [{} ({})] {}", title, c.kind, c.reason, c.at),
            None => format!("{} [pending]", title),
        }
    }
}

/// File name for one seed's tree: namespace dropped, lower-cased
pub fn tree_file_name(seed: &str) -> String {
    let name = seed.rsplit(':').next().unwrap_or(seed);
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c => c,
        })
        .collect();
    format!("{}.txt", sanitized.to_lowercase())
}

/// Writes one file per seed into `dir`, returning the paths written
pub fn write_tree_logs(tree: &ExplorationTree, dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for seed in tree.seeds() {
        let path = dir.join(tree_file_name(seed));
        let mut file = File::create(&path)?;
        file.write_all(tree.render(seed).as_bytes())?;
        written.push(path);
    }
    Ok(written)
}
