use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the configured seed categories when non-empty
    pub categories: Vec<String>,
    pub workers: Option<u32>,
    pub limit: Option<u64>,
    pub output_dir: Option<String>,
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use stanza_crawl::config::load_config;
///
/// let config = load_config(Path::new("stanza.toml")).unwrap();
/// println!("Workers: {}", config.crawler.max_workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Applies command-line overrides and re-validates the result
///
/// Lowering `max-workers` below a configured per-class cap clamps that cap,
/// so `--workers 2` is always accepted.
pub fn apply_overrides(mut config: Config, overrides: &Overrides) -> Result<Config, ConfigError> {
    if !overrides.categories.is_empty() {
        config.seeds = overrides.categories.clone();
    }

    if let Some(workers) = overrides.workers {
        config.crawler.max_workers = workers;
        for cap in [
            &mut config.crawler.exploration_workers,
            &mut config.crawler.content_workers,
        ] {
            if let Some(v) = cap {
                *v = (*v).min(workers);
            }
        }
    }

    if overrides.limit.is_some() {
        config.crawler.limit = overrides.limit;
    }

    if let Some(dir) = &overrides.output_dir {
        config.output.output_dir = dir.clone();
    }

    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is recorded with every run so the index shows which configuration
/// produced which records.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Hex-encoded SHA-256 of arbitrary configuration text
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
