//! Search index client
//!
//! The search index is untrusted: it may return more results than asked for, results with
//! missing fields, or relative URLs. Both backends normalize results into
//! [`SearchCandidate`]s; bounding happens in the candidate resolver.
//!
//! - [`YtDlpSearchIndex`]: `yt-dlp --flat-playlist --dump-single-json "ytsearchN:query"`
//! - [`HttpSearchIndex`]: a JSON search endpoint

use async_trait::async_trait;
use ldc_common::duration::format_duration;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::models::SearchCandidate;
use crate::utils::retry::Transient;

const USER_AGENT: &str = concat!("ldc-ingest/", env!("CARGO_PKG_VERSION"));

/// Search index errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Search timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Search tool error: {0}")]
    ToolError(String),
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::NetworkError(_) | SearchError::Timeout => true,
            SearchError::ApiError(status, _) => *status == 429 || *status >= 500,
            SearchError::ParseError(_) | SearchError::ToolError(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::ParseError(e.to_string())
        } else {
            SearchError::NetworkError(e.to_string())
        }
    }
}

/// Query-by-text search over a media catalog
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run one query; results in the index's relevance order
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchCandidate>, SearchError>;
}

/// `--dump-single-json` output of a `ytsearch` query
#[derive(Debug, Deserialize)]
struct YtDlpResults {
    #[serde(default)]
    entries: Vec<YtDlpEntry>,
}

/// One flat-playlist entry
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    duration_string: Option<String>,
    /// Seconds; some extractor versions only report this
    duration: Option<f64>,
}

/// Searches the media site through `yt-dlp`'s `ytsearch` pseudo-URL
pub struct YtDlpSearchIndex {
    binary_path: String,
    media_base_url: String,
}

impl YtDlpSearchIndex {
    pub fn new(binary_path: impl Into<String>, media_base_url: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            media_base_url: media_base_url.into(),
        }
    }

    fn candidate(&self, entry: YtDlpEntry) -> Option<SearchCandidate> {
        let title = entry.title.filter(|t| !t.trim().is_empty())?;
        let url = match (entry.url, entry.id) {
            (Some(url), _) if url.starts_with("http://") || url.starts_with("https://") => url,
            (Some(relative), _) if !relative.is_empty() => join_url(&self.media_base_url, &relative),
            (_, Some(id)) if !id.is_empty() => join_url(&self.media_base_url, &format!("watch?v={}", id)),
            _ => return None,
        };
        // Live streams carry no duration; empty text is skipped as malformed downstream
        let duration = match (entry.duration_string, entry.duration) {
            (Some(text), _) if !text.trim().is_empty() => text,
            (_, Some(seconds)) if seconds.is_finite() && seconds >= 0.0 => format_duration(seconds.round() as u64),
            _ => String::new(),
        };
        Some(SearchCandidate::new(title, duration, url))
    }

    fn parse_results(&self, json: &[u8]) -> Result<Vec<SearchCandidate>, SearchError> {
        let results: YtDlpResults = serde_json::from_slice(json)
            .map_err(|e| SearchError::ParseError(format!("unreadable yt-dlp output: {}", e)))?;
        Ok(results
            .entries
            .into_iter()
            .filter_map(|entry| self.candidate(entry))
            .collect())
    }
}

#[async_trait]
impl SearchIndex for YtDlpSearchIndex {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchCandidate>, SearchError> {
        tracing::debug!(query, max_results, "Searching with yt-dlp");

        let output = Command::new(&self.binary_path)
            .args(["--flat-playlist", "--dump-single-json", "--no-warnings"])
            .arg(format!("ytsearch{}:{}", max_results, query))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    SearchError::ToolError(format!("yt-dlp binary not found: {}", self.binary_path))
                }
                _ => SearchError::ToolError(e.to_string()),
            })?;

        if !output.status.success() {
            // Almost always a network or upstream failure; retried as transient
            return Err(SearchError::NetworkError(format!(
                "yt-dlp exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        self.parse_results(&output.stdout)
    }
}

/// One search hit as returned by the index
#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    title: Option<String>,
    duration: Option<String>,
    url: Option<String>,
    url_suffix: Option<String>,
}

/// JSON search endpoint: `GET {search_url}?q=...&max_results=N`
pub struct HttpSearchIndex {
    http_client: reqwest::Client,
    search_url: String,
    media_base_url: String,
}

impl HttpSearchIndex {
    pub fn new(
        search_url: impl Into<String>,
        media_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            search_url: search_url.into(),
            media_base_url: media_base_url.into(),
        })
    }

    fn candidate(&self, hit: SearchHit) -> Option<SearchCandidate> {
        let title = hit.title.filter(|t| !t.trim().is_empty())?;
        let url = match (hit.url, hit.url_suffix) {
            (Some(url), _) if url.starts_with("http://") || url.starts_with("https://") => url,
            (Some(relative), _) | (None, Some(relative)) => join_url(&self.media_base_url, &relative),
            (None, None) => return None,
        };
        Some(SearchCandidate::new(title, hit.duration.unwrap_or_default(), url))
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchCandidate>, SearchError> {
        let max_results_param = max_results.to_string();
        let params = [("q", query), ("max_results", max_results_param.as_str())];

        tracing::debug!(query, max_results, "Querying search index");

        let response = self
            .http_client
            .get(&self.search_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(status.as_u16(), body));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let total = hits.len();
        let candidates: Vec<SearchCandidate> =
            hits.into_iter().filter_map(|hit| self.candidate(hit)).collect();

        if candidates.len() < total {
            tracing::debug!(
                query,
                dropped = total - candidates.len(),
                "Search hits without title or URL dropped"
            );
        }

        Ok(candidates)
    }
}

/// Join a relative path onto a base URL with exactly one `/` between them
pub fn join_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
