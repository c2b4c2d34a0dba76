//! Search provider trait - the documentation retrieval backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::SearchError;

/// A ranked documentation snippet returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnippet {
    /// Source file the snippet was taken from
    pub file: String,

    /// Snippet text
    pub content: String,

    /// Backend relevance score, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// The query that retrieved this snippet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_query: Option<String>,
}

impl DocSnippet {
    pub fn new(file: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            content: content.into(),
            score: None,
            source_query: None,
        }
    }
}

/// The documentation search backend. May be offline.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Return up to `top_k` snippets for `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocSnippet>, SearchError>;

    /// Quick reachability check. Never hangs: implementations apply a short timeout.
    async fn health_check(&self) -> bool;
}
