//! Integration tests for the crawler
//!
//! Most tests drive the scheduler against an in-process fixture source so
//! page graphs, latencies and failures can be scripted. The last tests use
//! wiremock to run the same crawl cycle through the real MediaWiki client.

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use stanza_crawl::config::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use stanza_crawl::crawler::{crawl_source, run_crawl, CrawlMode};
use stanza_crawl::output::{OUTPUT_FILE_NAME, TREE_LOG_DIR};
use stanza_crawl::record::{ContentRecord, Entry};
use stanza_crawl::source::{
    Category, CategoryMember, FetchError, FetchResult, MemberKind, Page, PageId, RemoteSource,
};
use stanza_crawl::state::Outcome;
use stanza_crawl::storage::{CheckpointStore, RunStatus, SqliteCheckpointStore, INDEX_FILE_NAME};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Fixture source =====

/// A scripted wiki: categories, pages, per-page latency and failures
#[derive(Default)]
struct FixtureSource {
    categories: HashMap<String, Vec<CategoryMember>>,
    pages: HashMap<PageId, Page>,
    titles: HashMap<String, PageId>,
    delays: HashMap<PageId, Duration>,
    /// Remaining transient failures per page
    failures: Mutex<HashMap<PageId, u32>>,
    /// Fetches per page, by id or by title
    fetches: Mutex<HashMap<PageId, u32>>,
}

impl FixtureSource {
    fn category(mut self, name: &str, pages: &[u64], subcategories: &[&str]) -> Self {
        let mut members: Vec<CategoryMember> = pages
            .iter()
            .map(|id| CategoryMember {
                id: PageId(*id),
                title: self.pages[&PageId(*id)].title.clone(),
                kind: MemberKind::Page,
            })
            .collect();
        members.extend(subcategories.iter().enumerate().map(|(i, sub)| CategoryMember {
            id: PageId(900_000 + i as u64),
            title: format!("Category:{}", sub),
            kind: MemberKind::Subcategory,
        }));
        self.categories.insert(format!("Category:{}", name), members);
        self
    }

    fn page(mut self, page: Page) -> Self {
        self.titles.insert(page.title.clone(), page.id);
        self.pages.insert(page.id, page);
        self
    }

    fn poem(self, id: u64, title: &str) -> Self {
        let wikitext = format!(
            "{{{{Header|title={}|author=Victor Hugo|year=1856}}}}\n<poem>\nPremier vers de {}\nSecond vers\n</poem>",
            title, title
        );
        let html = format!(
            "<div class=\"poem\"><p>Premier vers de {}<br>Second vers</p></div>",
            title
        );
        self.page(Page::new(id, title, &wikitext, &html))
    }

    /// A collection page; `body` is rendered inside the summary block
    fn collection(self, id: u64, title: &str, body: &str) -> Self {
        let html = format!("<div class=\"ws-summary\">{}</div>", body);
        self.page(Page::new(id, title, "", &html))
    }

    fn delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(PageId(id), delay);
        self
    }

    fn failing(self, id: u64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(PageId(id), times);
        self
    }

    fn fetch_count(&self, id: u64) -> u32 {
        self.fetches
            .lock()
            .unwrap()
            .get(&PageId(id))
            .copied()
            .unwrap_or(0)
    }

    async fn serve(&self, id: PageId) -> FetchResult<Page> {
        *self.fetches.lock().unwrap().entry(id).or_insert(0) += 1;
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Transient("HTTP 503".to_string()));
                }
            }
        }

        self.pages
            .get(&id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("page {}", id)))
    }
}

#[async_trait]
impl RemoteSource for FixtureSource {
    async fn fetch_category(&self, title: &str) -> FetchResult<Category> {
        let members = self
            .categories
            .get(title)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(title.to_string()))?;
        Ok(Category {
            title: title.to_string(),
            members,
        })
    }

    async fn fetch_page(&self, id: PageId) -> FetchResult<Page> {
        self.serve(id).await
    }

    async fn fetch_page_by_title(&self, title: &str) -> FetchResult<Page> {
        let id = self
            .titles
            .get(title)
            .copied()
            .ok_or_else(|| FetchError::NotFound(title.to_string()))?;
        self.serve(id).await
    }
}

// ===== Helpers =====

fn link(title: &str) -> String {
    format!(
        "<li><a href=\"/wiki/{}\">{}</a></li>",
        title.replace(' ', "_"),
        title
    )
}

fn heading(title: &str) -> String {
    format!("<h3><span class=\"mw-headline\">{}</span></h3>", title)
}

fn test_config(output_dir: &Path, seeds: &[&str]) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_workers: 4,
            exploration_workers: None,
            content_workers: None,
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            fetch_timeout_secs: 5,
            max_nesting_depth: 8,
            limit: None,
        },
        source: SourceConfig {
            api_endpoint: "https://example.org/w/api.php".to_string(),
            category_prefix: "Category".to_string(),
            user_agent: "stanza-crawl-test/0.1".to_string(),
        },
        output: OutputConfig {
            output_dir: output_dir.display().to_string(),
        },
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
    }
}

fn resume() -> CrawlMode {
    CrawlMode {
        resume: true,
        ..CrawlMode::default()
    }
}

async fn crawl(
    source: &Arc<FixtureSource>,
    config: &Config,
    mode: CrawlMode,
) -> stanza_crawl::crawler::CrawlStats {
    let run = crawl_source(
        source.clone(),
        config,
        "test-hash",
        mode,
        CancellationToken::new(),
    );
    tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("crawl did not terminate")
        .expect("crawl failed")
}

fn read_records(output_dir: &Path) -> Vec<ContentRecord> {
    let bytes = std::fs::read(output_dir.join(OUTPUT_FILE_NAME)).unwrap();
    let mut text = String::new();
    MultiGzDecoder::new(&bytes[..])
        .read_to_string(&mut text)
        .unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn record_for(records: &[ContentRecord], page: u64, collection: Option<u64>) -> &ContentRecord {
    records
        .iter()
        .find(|r| r.page_id == PageId(page) && r.collection_page_id == collection.map(PageId))
        .unwrap_or_else(|| panic!("no record for page {} in {:?}", page, collection))
}

fn open_index(output_dir: &Path) -> SqliteCheckpointStore {
    SqliteCheckpointStore::new(&output_dir.join(INDEX_FILE_NAME)).unwrap()
}

/// Page A, B and sub-collection C (holding D under "Part Two") in collection P
fn anthology() -> FixtureSource {
    let p_body = [link("Ode A"), link("Ode B"), link("Livre C")].concat();
    let c_body = [heading("Part Two"), link("Ode D")].concat();
    FixtureSource::default()
        .poem(1, "Ode A")
        .poem(2, "Ode B")
        .poem(4, "Ode D")
        .collection(3, "Livre C", &c_body)
        .collection(100, "Recueil", &p_body)
        .category("Poems", &[100, 1, 2], &[])
}

// ===== Scheduler properties =====

#[tokio::test]
async fn test_end_to_end_example() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(anthology());
    let config = test_config(dir.path(), &["Poems"]);

    let stats = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(stats.collections, 1);
    assert_eq!(stats.records_emitted, 3);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 3);

    let a = record_for(&records, 1, Some(100));
    assert_eq!(a.poem_order, Some(0));
    assert_eq!(a.section_title, None);
    assert_eq!(a.title, "Ode A");
    assert_eq!(a.author.as_deref(), Some("Victor Hugo"));
    let structure = a.collection_structure.as_ref().unwrap();
    assert_eq!(
        structure.entries(),
        &[
            Entry::content(1u64, 0),
            Entry::content(2u64, 1),
            Entry::section("Part Two"),
            Entry::content(4u64, 2),
        ]
    );

    let b = record_for(&records, 2, Some(100));
    assert_eq!(b.poem_order, Some(1));
    assert_eq!(b.section_title, None);
    assert!(b.collection_structure.is_none());

    let d = record_for(&records, 4, Some(100));
    assert_eq!(d.poem_order, Some(2));
    assert_eq!(d.section_title.as_deref(), Some("Part Two"));
    assert!(d.collection_structure.is_none());
    assert_eq!(d.collection_title.as_deref(), Some("Recueil"));

    let index = open_index(dir.path());
    assert_eq!(index.outcome(PageId(100)).unwrap(), Some(Outcome::Processed));
    assert_eq!(index.outcome(PageId(4)).unwrap(), Some(Outcome::Processed));
    assert_eq!(index.count_records().unwrap(), 3);
    assert_eq!(
        index.latest_run().unwrap().map(|r| r.status),
        Some(RunStatus::Completed)
    );
}

#[tokio::test]
async fn test_order_follows_document_not_fetch_completion() {
    let dir = tempfile::tempdir().unwrap();
    let titles: Vec<String> = (1..=12).map(|i| format!("Sonnet {}", i)).collect();
    let body: String = titles.iter().map(|t| link(t)).collect();

    let mut fixture = FixtureSource::default();
    for (i, title) in titles.iter().enumerate() {
        let id = i as u64 + 1;
        // Earlier sonnets answer last
        fixture = fixture
            .poem(id, title)
            .delay(id, Duration::from_millis(5 * (13 - id)));
    }
    let fixture = fixture
        .collection(50, "Sonnets", &body)
        .category("Poems", &[50], &[]);

    let source = Arc::new(fixture);
    let mut config = test_config(dir.path(), &["Poems"]);
    config.crawler.max_workers = 8;
    crawl(&source, &config, CrawlMode::default()).await;

    let records = read_records(dir.path());
    assert_eq!(records.len(), 12);

    let with_structure: Vec<&ContentRecord> = records
        .iter()
        .filter(|r| r.collection_structure.is_some())
        .collect();
    assert_eq!(with_structure.len(), 1);
    assert_eq!(with_structure[0].poem_order, Some(0));
    assert_eq!(with_structure[0].page_id, PageId(1));

    let structure = with_structure[0].collection_structure.as_ref().unwrap();
    let refs: Vec<(PageId, u32)> = structure.content_refs().collect();
    let expected: Vec<(PageId, u32)> = (0..12).map(|i| (PageId(i as u64 + 1), i)).collect();
    assert_eq!(refs, expected);

    for record in &records {
        assert_eq!(record.poem_order, Some(record.page_id.0 as u32 - 1));
    }
}

#[tokio::test]
async fn test_shared_content_gets_record_per_collection() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = FixtureSource::default()
        .poem(1, "Ode A")
        .poem(2, "Ode B")
        .poem(3, "Ode Shared")
        .collection(100, "First", &[link("Ode A"), link("Ode Shared")].concat())
        .collection(200, "Second", &[link("Ode Shared"), link("Ode B")].concat())
        .category("Poems", &[100, 200, 3], &[]);
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    crawl(&source, &config, CrawlMode::default()).await;
    let records = read_records(dir.path());
    assert_eq!(records.len(), 4);

    let in_first = record_for(&records, 3, Some(100));
    let in_second = record_for(&records, 3, Some(200));
    assert_eq!(in_first.poem_order, Some(1));
    assert_eq!(in_second.poem_order, Some(0));
    assert!(in_first.collection_structure.is_none());
    assert!(in_second.collection_structure.is_some());

    // No standalone record for a page that has memberships
    assert!(records.iter().all(|r| r.collection_page_id.is_some()));

    for collection in [100, 200] {
        let bearing = records
            .iter()
            .filter(|r| r.collection_page_id == Some(PageId(collection)))
            .filter(|r| r.collection_structure.is_some())
            .count();
        assert_eq!(bearing, 1, "collection {}", collection);
    }
}

#[tokio::test]
async fn test_standalone_page_and_subcategories() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = FixtureSource::default()
        .poem(1, "Ode A")
        .poem(2, "Ode B")
        .category("Poems", &[1], &["Odes"])
        .category("Odes", &[2, 1], &["Poems"]);
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    let stats = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(stats.categories_listed, 2);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 2);
    let a = record_for(&records, 1, None);
    assert_eq!(a.poem_order, None);
    assert_eq!(a.collection_title, None);
    assert!(a.collection_structure.is_none());
    assert_eq!(
        a.body.stanzas,
        vec![vec![
            "Premier vers de Ode A".to_string(),
            "Second vers".to_string()
        ]]
    );
    assert_eq!(source.fetch_count(1), 1);
}

#[tokio::test]
async fn test_resume_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(anthology());
    let config = test_config(dir.path(), &["Poems"]);

    let first = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(first.records_emitted, 3);
    let fetches_before: Vec<u32> = [1, 2, 3, 4, 100]
        .iter()
        .map(|id| source.fetch_count(*id))
        .collect();

    let second = crawl(&source, &config, resume()).await;
    assert_eq!(second.records_emitted, 0);
    assert_eq!(second.processed, 0);
    // The collection, both listed odes and Ode D reached only through Livre C
    assert_eq!(second.already_processed, 4);

    let fetches_after: Vec<u32> = [1, 2, 3, 4, 100]
        .iter()
        .map(|id| source.fetch_count(*id))
        .collect();
    assert_eq!(fetches_before, fetches_after);
    assert_eq!(read_records(dir.path()).len(), 3);
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_without_reprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        FixtureSource::default()
            .poem(1, "Ode A")
            .poem(2, "Ode B")
            .poem(4, "Ode D")
            .collection(3, "Livre C", &[heading("Part Two"), link("Ode D")].concat())
            .collection(100, "Recueil", &[link("Ode A"), link("Ode B"), link("Livre C")].concat())
            .category("Poems", &[100], &[]),
    );

    let mut limited = test_config(dir.path(), &["Poems"]);
    limited.crawler.limit = Some(2);
    let first = crawl(&source, &limited, CrawlMode::default()).await;
    assert_eq!(first.records_emitted, 2);
    assert_eq!(first.abandoned, 1);

    let done: Vec<PageId> = read_records(dir.path()).iter().map(|r| r.page_id).collect();
    let fetches_before: Vec<u32> = done.iter().map(|id| source.fetch_count(id.0)).collect();

    let config = test_config(dir.path(), &["Poems"]);
    let second = crawl(&source, &config, resume()).await;
    assert_eq!(second.records_emitted, 1);

    let fetches_after: Vec<u32> = done.iter().map(|id| source.fetch_count(id.0)).collect();
    assert_eq!(fetches_before, fetches_after);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 3);
    let mut ids: Vec<u64> = records.iter().map(|r| r.page_id.0).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 4]);

    let d = record_for(&records, 4, Some(100));
    assert_eq!(d.poem_order, Some(2));
    assert_eq!(d.section_title.as_deref(), Some("Part Two"));
    assert_eq!(
        records.iter().filter(|r| r.collection_structure.is_some()).count(),
        1
    );
}

#[tokio::test]
async fn test_collection_cycle_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = FixtureSource::default()
        .poem(1, "Ode A")
        .poem(2, "Ode B")
        .collection(10, "Livre X", &[link("Ode A"), link("Livre Y")].concat())
        .collection(20, "Livre Y", &[link("Ode B"), link("Livre X")].concat())
        .category("Poems", &[10], &[]);
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    let stats = crawl(&source, &config, CrawlMode::default()).await;
    assert!(stats.anomalies >= 1);

    let records = read_records(dir.path());
    let a = record_for(&records, 1, Some(10));
    let b = record_for(&records, 2, Some(10));
    assert_eq!(a.poem_order, Some(0));
    assert_eq!(b.poem_order, Some(1));

    let structure = a.collection_structure.as_ref().unwrap();
    let orders: Vec<u32> = structure.content_refs().map(|(_, order)| order).collect();
    assert_eq!(orders, (0..orders.len() as u32).collect::<Vec<_>>());

    let collection = open_index(dir.path()).load_collection(PageId(10)).unwrap().unwrap();
    assert!(!collection.anomalies.is_empty());
}

#[tokio::test]
async fn test_structure_survives_leading_cycle_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = FixtureSource::default()
        .poem(1, "Ode A")
        .poem(2, "Ode B")
        .collection(10, "Livre L", &link("Recueil"))
        .collection(
            100,
            "Recueil",
            &[link("Livre L"), link("Ode A"), link("Ode B")].concat(),
        )
        .category("Poems", &[100], &[]);
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    let stats = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(stats.anomalies, 1);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 2);
    let bearing: Vec<&ContentRecord> = records
        .iter()
        .filter(|r| r.collection_structure.is_some())
        .collect();
    assert_eq!(bearing.len(), 1);
    assert_eq!(bearing[0].page_id, PageId(1));
    assert_eq!(bearing[0].poem_order, Some(1));

    let structure = bearing[0].collection_structure.as_ref().unwrap();
    assert_eq!(
        structure.entries(),
        &[
            Entry::content(100u64, 0),
            Entry::content(1u64, 1),
            Entry::content(2u64, 2),
        ]
    );
    assert_eq!(record_for(&records, 2, Some(100)).poem_order, Some(2));
}

#[tokio::test]
async fn test_inner_section_wins_and_ends_with_child() {
    let dir = tempfile::tempdir().unwrap();
    let inner = [heading("Inner"), link("Ode Q")].concat();
    let middle = link("Livre Inner");
    let outer = [link("Livre Middle"), link("Ode R")].concat();
    let fixture = FixtureSource::default()
        .poem(1, "Ode Q")
        .poem(2, "Ode R")
        .collection(10, "Livre Inner", &inner)
        .collection(20, "Livre Middle", &middle)
        .collection(30, "Livre Outer", &outer)
        .category("Poems", &[30], &[]);
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    crawl(&source, &config, CrawlMode::default()).await;
    let records = read_records(dir.path());

    let q = record_for(&records, 1, Some(30));
    assert_eq!(q.section_title.as_deref(), Some("Inner"));
    assert_eq!(q.poem_order, Some(0));

    let r = record_for(&records, 2, Some(30));
    assert_eq!(r.section_title, None);
    assert_eq!(r.poem_order, Some(1));
}

#[tokio::test]
async fn test_fetch_failures_become_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = FixtureSource::default()
        .poem(1, "Ode Flaky")
        .poem(2, "Ode Down")
        .poem(3, "Ode Fine")
        .page(Page::new(4u64, "Prose", "", "<p>Just prose.</p>"))
        .page(Page::new(5u64, "Empty", "<poem></poem>", "<div class=\"poem\"></div>"))
        .failing(1, 2)
        .failing(2, 100)
        .category("Poems", &[1, 2, 3, 4, 5], &[]);
    // Listed but never served
    let mut fixture = fixture;
    if let Some(members) = fixture.categories.get_mut("Category:Poems") {
        members.push(CategoryMember {
            id: PageId(6),
            title: "Missing".to_string(),
            kind: MemberKind::Page,
        });
    }
    let source = Arc::new(fixture);
    let config = test_config(dir.path(), &["Poems"]);

    let stats = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.unclassified, 1);
    assert_eq!(stats.failed_validation, 1);

    assert_eq!(source.fetch_count(1), 3);
    assert_eq!(source.fetch_count(2), 3);

    let index = open_index(dir.path());
    assert_eq!(index.outcome(PageId(1)).unwrap(), Some(Outcome::Processed));
    assert_eq!(index.outcome(PageId(2)).unwrap(), Some(Outcome::Failed));
    assert_eq!(index.outcome(PageId(4)).unwrap(), Some(Outcome::Unclassified));
    assert_eq!(index.outcome(PageId(5)).unwrap(), Some(Outcome::FailedValidation));
    assert_eq!(index.outcome(PageId(6)).unwrap(), Some(Outcome::Skipped));

    let mut emitted: Vec<u64> = read_records(dir.path()).iter().map(|r| r.page_id.0).collect();
    emitted.sort_unstable();
    assert_eq!(emitted, vec![1, 3]);
}

#[tokio::test]
async fn test_retry_failures_recrawls_failed_pages() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        FixtureSource::default()
            .poem(1, "Ode A")
            .poem(2, "Ode B")
            .failing(2, 3)
            .category("Poems", &[1, 2], &[]),
    );
    let config = test_config(dir.path(), &["Poems"]);

    let first = crawl(&source, &config, CrawlMode::default()).await;
    assert_eq!(first.failed, 1);

    let second = crawl(&source, &config, resume()).await;
    assert_eq!(second.already_processed, 2);
    assert_eq!(source.fetch_count(2), 3);

    let retry = CrawlMode {
        retry_failures: true,
        ..resume()
    };
    let third = crawl(&source, &config, retry).await;
    assert_eq!(third.processed, 1);
    assert_eq!(third.already_processed, 1);

    let index = open_index(dir.path());
    assert_eq!(index.outcome(PageId(2)).unwrap(), Some(Outcome::Processed));
    assert_eq!(read_records(dir.path()).len(), 2);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("data");
    let source = Arc::new(anthology());
    let config = test_config(&output, &["Poems"]);
    let mode = CrawlMode {
        dry_run: true,
        ..CrawlMode::default()
    };

    let stats = crawl(&source, &config, mode).await;
    assert_eq!(stats.collections, 1);
    assert_eq!(stats.content_items, 3);
    assert_eq!(stats.records_emitted, 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_tree_log_records_discovery_paths() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(anthology());
    let config = test_config(dir.path(), &["Poems"]);
    let mode = CrawlMode {
        tree_log: true,
        ..CrawlMode::default()
    };

    crawl(&source, &config, mode).await;

    let path = dir.path().join(TREE_LOG_DIR).join("poems.txt");
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Category:Poems");
    assert!(lines[1].starts_with("├── Recueil [collection ("));
    // Reached only through the nested collection
    assert!(lines[2].starts_with("│   └── Ode D [content_item (order 2)] "));
    assert!(lines[3].starts_with("├── Ode A [content_item ("));
    assert!(lines[4].starts_with("└── Ode B [content_item ("));
    assert_eq!(lines.len(), 5);
}

#[tokio::test]
async fn test_unlistable_seed_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(anthology());
    let config = test_config(dir.path(), &["Nowhere"]);

    let result = crawl_source(
        source,
        &config,
        "test-hash",
        CrawlMode::default(),
        CancellationToken::new(),
    )
    .await;
    assert!(result.is_err());

    let index = open_index(dir.path());
    assert_eq!(
        index.latest_run().unwrap().map(|r| r.status),
        Some(RunStatus::Failed)
    );
}

#[tokio::test]
async fn test_cancelled_run_is_marked_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(anthology());
    let config = test_config(dir.path(), &["Poems"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = crawl_source(source, &config, "test-hash", CrawlMode::default(), cancel)
        .await
        .unwrap();
    assert_eq!(stats.records_emitted, 0);

    let index = open_index(dir.path());
    assert_eq!(
        index.latest_run().unwrap().map(|r| r.status),
        Some(RunStatus::Interrupted)
    );
    assert!(index.iter_processed().unwrap().is_empty());
}

// ===== Through the MediaWiki client =====

fn parse_response(id: u64, title: &str, wikitext: &str, html: &str) -> serde_json::Value {
    serde_json::json!({
        "parse": {
            "title": title,
            "pageid": id,
            "ns": 0,
            "text": html,
            "wikitext": wikitext,
            "categories": [{"category": "Poèmes_du_domaine_public", "sortkey": ""}]
        }
    })
}

#[tokio::test]
async fn test_mediawiki_crawl_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "categorymembers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "batchcomplete": true,
            "query": {
                "pages": [{"pageid": 7, "ns": 14, "title": "Category:Poems"}],
                "categorymembers": [
                    {"pageid": 10, "ns": 0, "title": "Recueil", "type": "page"},
                    {"pageid": 99, "ns": 6, "title": "File:Cover.jpg", "type": "file"}
                ]
            }
        })))
        .mount(&mock_server)
        .await;

    let collection_html = format!(
        "<div class=\"ws-summary\">{}{}</div>",
        heading("Livre premier"),
        link("Ode")
    );
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("pageid", "10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(parse_response(10, "Recueil", "", &collection_html)),
        )
        .mount(&mock_server)
        .await;

    let poem_wikitext = "{{Header|title=Ode|author=Pierre de Ronsard}}\n<poem>\nMignonne, allons voir\nsi la rose\n</poem>";
    let poem_html = "<div class=\"poem\"><p>Mignonne, allons voir<br>si la rose</p></div>";
    let poem = parse_response(11, "Ode", poem_wikitext, poem_html);
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("page", "Ode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(poem.clone()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("pageid", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(poem))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["Poems"]);
    config.source.api_endpoint = format!("{}/w/api.php", mock_server.uri());

    let stats = run_crawl(&config, "test-hash", CrawlMode::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.collections, 1);
    assert_eq!(stats.records_emitted, 1);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 1);
    let ode = &records[0];
    assert_eq!(ode.page_id, PageId(11));
    assert_eq!(ode.author.as_deref(), Some("Pierre de Ronsard"));
    assert_eq!(ode.section_title.as_deref(), Some("Livre premier"));
    assert_eq!(ode.poem_order, Some(0));
    assert_eq!(ode.license.as_deref(), Some("Public domain"));
    assert_eq!(ode.body.text, "Mignonne, allons voir\nsi la rose");
    assert!(ode.collection_structure.is_some());
}

#[tokio::test]
async fn test_mediawiki_rate_limit_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "categorymembers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": {
                "pages": [{"pageid": 7, "ns": 14, "title": "Category:Poems"}],
                "categorymembers": [{"pageid": 11, "ns": 0, "title": "Ode", "type": "page"}]
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    let poem = parse_response(11, "Ode", "<poem>\nun vers\n</poem>", "<poem>un vers</poem>");
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(poem))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["Poems"]);
    config.source.api_endpoint = format!("{}/w/api.php", mock_server.uri());

    let stats = run_crawl(&config, "test-hash", CrawlMode::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(read_records(dir.path()).len(), 1);
}
