//! Configuration module for Stanza-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the command-line overrides layered on top of them.
//!
//! # Example
//!
//! ```no_run
//! use stanza_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("stanza.toml")).unwrap();
//! println!("Crawl starts from {} seed categories", config.seeds.len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, SourceConfig};

pub use parser::{
    apply_overrides, compute_config_hash, hash_content, load_config, load_config_with_hash,
    parse_config, Overrides,
};
