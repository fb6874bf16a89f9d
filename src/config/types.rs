use serde::Deserialize;

/// Main configuration structure for Stanza-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,

    /// Root category titles the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Joint cap on in-flight fetches and on spawned tasks (W)
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Cap on in-flight exploration fetches (categories, collections, lookahead)
    #[serde(rename = "exploration-workers", default)]
    pub exploration_workers: Option<u32>,

    /// Cap on in-flight content fetches
    #[serde(rename = "content-workers", default)]
    pub content_workers: Option<u32>,

    /// Attempts per fetch before a transient failure becomes permanent
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles with every further attempt (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Timeout applied to every fetch attempt
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Deepest collection nesting the structure extractor expands
    #[serde(rename = "max-nesting-depth", default = "default_max_nesting_depth")]
    pub max_nesting_depth: u32,

    /// Stop after this many content pages have been processed
    #[serde(default)]
    pub limit: Option<u64>,
}

impl CrawlerConfig {
    /// Effective exploration permit count
    pub fn exploration_permits(&self) -> usize {
        self.exploration_workers.unwrap_or(self.max_workers) as usize
    }

    /// Effective content permit count
    pub fn content_permits(&self) -> usize {
        self.content_workers.unwrap_or(self.max_workers) as usize
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            exploration_workers: None,
            content_workers: None,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_nesting_depth: default_max_nesting_depth(),
            limit: None,
        }
    }
}

/// Remote content source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// MediaWiki API endpoint (e.g. https://fr.wikisource.org/w/api.php)
    #[serde(rename = "api-endpoint")]
    pub api_endpoint: String,

    /// Namespace prefix added to bare seed category names
    #[serde(rename = "category-prefix", default = "default_category_prefix")]
    pub category_prefix: String,

    /// User-Agent header sent with every API request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the record stream and the index
    #[serde(rename = "output-dir")]
    pub output_dir: String,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_nesting_depth() -> u32 {
    8
}

fn default_category_prefix() -> String {
    "Category".to_string()
}
