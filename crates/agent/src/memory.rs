//! Per-turn session memory.
//!
//! Two stores feed prompt construction:
//!
//! - [`SessionToolResults`]: every tool result of the current user request,
//!   in execution order. Append-only; cleared only by `begin_turn`.
//! - [`DocStore`]: retrieved documentation snippets, deduplicated by a
//!   content-prefix fingerprint.

use aegent_config::SearchConfig;
use aegent_core::search::DocSnippet;
use aegent_core::tool::ToolResult;
use std::collections::HashSet;

/// Longest rendering of a result's `data` payload in a prompt.
const DATA_PREVIEW_LEN: usize = 600;

/// Ordered tool results for one user request.
#[derive(Debug, Clone, Default)]
pub struct SessionToolResults {
    results: Vec<ToolResult>,
}

impl SessionToolResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ToolResult) {
        self.results.push(result);
    }

    /// Start a new user request. The only way results are removed.
    pub fn begin_turn(&mut self) {
        self.results.clear();
    }

    pub fn as_slice(&self) -> &[ToolResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Numbered list for continuation prompts.
    pub fn render_numbered(&self) -> String {
        self.results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let params = serde_json::to_string(&r.parameters).unwrap_or_default();
                let status = if r.success { "SUCCESS" } else { "FAILED" };
                let mut line = format!("{}. {} {} -> {}: {}", i + 1, r.name, params, status, r.message);
                if let Some(data) = &r.data {
                    let data = data.to_string();
                    line.push_str("\n   data: ");
                    line.push_str(&truncate(&data, DATA_PREVIEW_LEN));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Dedup and noise-filter settings for retrieved snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    /// Characters of trimmed content used as the fingerprint
    pub prefix_len: usize,
    /// Snippets with fewer trimmed characters are dropped
    pub min_len: usize,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            prefix_len: 200,
            min_len: 50,
        }
    }
}

impl From<&SearchConfig> for DedupPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            prefix_len: config.dedup_prefix_len.max(1),
            min_len: config.min_content_len,
        }
    }
}

impl DedupPolicy {
    /// The dedup key for `content`, or `None` if it is too short to keep.
    pub fn fingerprint(&self, content: &str) -> Option<String> {
        let trimmed = content.trim();
        if trimmed.chars().count() < self.min_len {
            return None;
        }
        Some(trimmed.chars().take(self.prefix_len).collect())
    }
}

/// Cumulative documentation results for one search session.
///
/// No two entries share a fingerprint; insertion order is kept.
#[derive(Debug, Clone, Default)]
pub struct DocStore {
    policy: DedupPolicy,
    entries: Vec<DocSnippet>,
    seen: HashSet<String>,
}

impl DocStore {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Fold new snippets in. Returns how many were kept.
    pub fn add_results(&mut self, results: impl IntoIterator<Item = DocSnippet>) -> usize {
        let mut added = 0;
        for snippet in results {
            let Some(key) = self.policy.fingerprint(&snippet.content) else {
                continue;
            };
            if self.seen.insert(key) {
                self.entries.push(snippet);
                added += 1;
            }
        }
        added
    }

    pub fn cumulative(&self) -> &[DocSnippet] {
        &self.entries
    }

    /// The first `n` entries.
    pub fn top(&self, n: usize) -> &[DocSnippet] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    /// Source files of the first `n` entries, without repeats.
    pub fn sources(&self, n: usize) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for snippet in self.top(n) {
            if !files.contains(&snippet.file) {
                files.push(snippet.file.clone());
            }
        }
        files
    }

    /// Render the first `n` entries as delimited prompt sections.
    pub fn render(&self, n: usize) -> String {
        self.top(n)
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let via = doc
                    .source_query
                    .as_deref()
                    .map(|q| format!(" (found via: {})", truncate(q, 40)))
                    .unwrap_or_default();
                format!(
                    "=== SOURCE {}: {}{} ===\n{}\n=== END SOURCE ===",
                    i + 1,
                    doc.file,
                    via,
                    normalize_whitespace(&doc.content)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Collapse every whitespace run to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
