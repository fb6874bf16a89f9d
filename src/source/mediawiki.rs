//! MediaWiki action API client
//!
//! This module implements `RemoteSource` over HTTP, including:
//! - Building the HTTP client with the configured user agent
//! - Category listings with continuation
//! - Rendered page content via `action=parse`
//! - Mapping HTTP and API errors onto the `FetchError` taxonomy

use crate::config::SourceConfig;
use crate::source::traits::{FetchError, FetchResult, RemoteSource};
use crate::source::{Category, CategoryMember, MemberKind, Page, PageId};
use crate::StanzaError;
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
/// * `timeout` - Per-request timeout
/// * `https_only` - Refuse plain HTTP (set when the endpoint itself is HTTPS)
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    https_only: bool,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .https_only(https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// MediaWiki API implementation of `RemoteSource`
#[derive(Debug, Clone)]
pub struct MediaWikiClient {
    client: Client,
    endpoint: Url,
}

impl MediaWikiClient {
    /// Creates a client for the configured endpoint
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, StanzaError> {
        let endpoint = Url::parse(&config.api_endpoint).map_err(|e| {
            StanzaError::Fatal(format!("invalid api endpoint {}: {}", config.api_endpoint, e))
        })?;
        let client = build_http_client(&config.user_agent, timeout, endpoint.scheme() == "https")?;
        Ok(Self { client, endpoint })
    }

    /// Sends one API request and decodes the JSON body
    async fn request<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> FetchResult<T> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = check_status(response)?;
        let body = response.text().await.map_err(classify_transport_error)?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("undecodable API response: {}", e)))?;

        if let Some(error) = envelope.error {
            return Err(classify_api_error(&error));
        }

        envelope
            .data
            .ok_or_else(|| FetchError::Malformed("API response carried no data".to_string()))
    }

    /// Fetches a rendered page through `action=parse`
    async fn parse(&self, selector: (&str, String)) -> FetchResult<Page> {
        let params = [
            ("action", "parse".to_string()),
            selector,
            ("prop", "text|wikitext|categories".to_string()),
            ("redirects", "1".to_string()),
        ];
        let data: ParseData = self.request(&params).await?;
        Ok(data.parse.into_page())
    }
}

#[async_trait]
impl RemoteSource for MediaWikiClient {
    async fn fetch_category(&self, title: &str) -> FetchResult<Category> {
        let mut members = Vec::new();
        let mut continuation: HashMap<String, String> = HashMap::new();
        let mut first = true;

        loop {
            let data: CategoryQueryData = {
                let mut params = vec![
                    ("action", "query".to_string()),
                    ("list", "categorymembers".to_string()),
                    ("cmtitle", title.to_string()),
                    ("cmprop", "ids|title|type".to_string()),
                    ("cmlimit", "max".to_string()),
                ];
                if first {
                    params.push(("titles", title.to_string()));
                    params.push(("prop", "info".to_string()));
                }
                params.extend(continuation.iter().map(|(k, v)| (k.as_str(), v.clone())));
                self.request(&params).await?
            };

            if first {
                let missing = data
                    .query
                    .pages
                    .iter()
                    .any(|p| p.missing || p.invalid);
                if missing && data.query.categorymembers.is_empty() {
                    return Err(FetchError::NotFound(format!("category {}", title)));
                }
                first = false;
            }

            members.extend(
                data.query
                    .categorymembers
                    .into_iter()
                    .filter_map(RawMember::into_member),
            );

            match data.continuation {
                Some(next) if !next.is_empty() => continuation = next,
                _ => break,
            }
        }

        tracing::debug!("Category {} lists {} members", title, members.len());

        Ok(Category {
            title: title.to_string(),
            members,
        })
    }

    async fn fetch_page(&self, id: PageId) -> FetchResult<Page> {
        self.parse(("pageid", id.to_string())).await
    }

    async fn fetch_page_by_title(&self, title: &str) -> FetchResult<Page> {
        self.parse(("page", title.to_string())).await
    }
}

/// Maps HTTP status codes onto fetch errors
fn check_status(response: Response) -> FetchResult<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(FetchError::RateLimited { retry_after });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(format!("HTTP {}", status.as_u16())));
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return Err(FetchError::Transient(format!("HTTP {}", status.as_u16())));
    }

    Err(FetchError::Malformed(format!("HTTP {}", status.as_u16())))
}

/// Classifies a reqwest transport error
fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transient("request timeout".to_string())
    } else if e.is_connect() {
        FetchError::Transient(format!("connection failed: {}", e))
    } else if e.is_decode() {
        FetchError::Malformed(e.to_string())
    } else {
        FetchError::Transient(e.to_string())
    }
}

/// Classifies an API-level error object
fn classify_api_error(error: &ApiError) -> FetchError {
    let detail = format!("{}: {}", error.code, error.info);
    match error.code.as_str() {
        "missingtitle" | "nosuchpageid" | "invalidtitle" | "pagecannotexist" => {
            FetchError::NotFound(detail)
        }
        "maxlag" | "ratelimited" => FetchError::RateLimited { retry_after: None },
        code if code.starts_with("internal_api_error") || code == "readonly" => {
            FetchError::Transient(detail)
        }
        _ => FetchError::Malformed(detail),
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(flatten)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct CategoryQueryData {
    #[serde(default)]
    query: CategoryQuery,
    #[serde(rename = "continue", default)]
    continuation: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryQuery {
    #[serde(default)]
    categorymembers: Vec<RawMember>,
    #[serde(default)]
    pages: Vec<RawPageInfo>,
}

#[derive(Debug, Deserialize)]
struct RawPageInfo {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    pageid: u64,
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl RawMember {
    fn into_member(self) -> Option<CategoryMember> {
        let kind = match self.kind.as_str() {
            "subcat" => MemberKind::Subcategory,
            "page" | "" => MemberKind::Page,
            _ => return None,
        };
        Some(CategoryMember {
            id: PageId(self.pageid),
            title: self.title,
            kind,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ParseData {
    parse: RawParse,
}

#[derive(Debug, Deserialize)]
struct RawParse {
    title: String,
    pageid: u64,
    #[serde(default)]
    ns: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    wikitext: String,
    #[serde(default)]
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    category: String,
}

impl RawParse {
    fn into_page(self) -> Page {
        Page {
            id: PageId(self.pageid),
            title: self.title,
            namespace: self.ns,
            wikitext: self.wikitext,
            html: self.text,
            categories: self
                .categories
                .into_iter()
                .map(|c| c.category.replace('_', " "))
                .collect(),
        }
    }
}
