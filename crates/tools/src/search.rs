//! HTTP client for the documentation search backend.
//!
//! Wire contract:
//! - `POST {url}/search` with `{query, top_k}` →
//!   `{success, query, results: [{rank, file, content, relevance_score}], total_results}`
//!   or `{success: false, error}`
//! - `GET {url}/health` → `{status: "healthy", rag_available}`

use aegent_core::error::SearchError;
use aegent_core::search::{DocSnippet, SearchProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpSearchProvider {
    base_url: String,
    client: reqwest::Client,
    health_timeout: Duration,
}

impl HttpSearchProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, Duration::from_secs(30), Duration::from_secs(3))
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        timeout: Duration,
        health_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            health_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout(e.to_string())
        } else {
            SearchError::Unavailable(e.to_string())
        }
    }

    fn into_snippets(query: &str, response: SearchResponse) -> Result<Vec<DocSnippet>, SearchError> {
        if !response.success {
            return Err(SearchError::ApiError {
                status_code: 200,
                message: response.error.unwrap_or_else(|| "search failed".into()),
            });
        }

        let mut hits = response.results;
        hits.sort_by_key(|h| h.rank.unwrap_or(usize::MAX));

        Ok(hits
            .into_iter()
            .map(|hit| DocSnippet {
                file: hit.file,
                content: hit.content,
                score: hit.relevance_score,
                source_query: Some(query.to_string()),
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocSnippet>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(query, top_k, "Searching documentation");

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { query, top_k })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Search backend returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        Self::into_snippets(query, body)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let response = match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = r.status().as_u16(), "Search backend unhealthy");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "Search backend unreachable");
                return false;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) => health.is_ready(),
            Err(_) => false,
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    results: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    rank: Option<usize>,
    #[serde(default)]
    file: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    relevance_score: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
    #[serde(default = "default_true")]
    rag_available: bool,
}

fn default_true() -> bool {
    true
}

impl HealthResponse {
    fn is_ready(&self) -> bool {
        self.status == "healthy" && self.rag_available
    }
}
