//! Shared mocks for agent tests.

use aegent_core::error::{ProviderError, SearchError, ToolError};
use aegent_core::provider::{Completion, CompletionRequest, Provider};
use aegent_core::search::{DocSnippet, SearchProvider};
use aegent_core::tool::{ActionExecutor, ActionOutcome, ToolCall, ToolCatalog, ToolSpec};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::session::StopSignal;

/// A provider that replays scripted responses in order and records every
/// prompt it receives.
///
/// Once the script runs out it repeats `repeat` if set, otherwise it fails.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn repeating(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt);
        let next = self.script.lock().unwrap().pop_front();
        let text = match (next, &self.repeat) {
            (Some(result), _) => result?,
            (None, Some(text)) => text.clone(),
            (None, None) => {
                return Err(ProviderError::MalformedResponse("script exhausted".into()));
            }
        };
        Ok(Completion {
            text,
            model: "scripted-model".into(),
            usage: None,
        })
    }
}

/// Catalog used across agent tests.
pub fn test_catalog() -> ToolCatalog {
    ToolCatalog::new()
        .with_spec(ToolSpec::new(
            "create_composition",
            "Create a composition",
            json!({"type": "object", "properties": {"name": {"type": "string"}}}),
        ))
        .with_spec(ToolSpec::new(
            "create_shape_layer",
            "Create a shape layer",
            json!({
                "type": "object",
                "properties": {"shape": {"type": "string"}, "fillColor": {"type": "array"}},
                "required": ["shape"]
            }),
        ))
}

/// An executor that records calls and answers from a per-tool table.
pub struct RecordingExecutor {
    catalog: ToolCatalog,
    outcomes: HashMap<String, ActionOutcome>,
    unreachable: HashSet<String>,
    stop_after: Option<(usize, StopSignal)>,
    calls: Mutex<Vec<ToolCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            catalog: test_catalog(),
            outcomes: HashMap::new(),
            unreachable: HashSet::new(),
            stop_after: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outcome(mut self, tool: &str, outcome: ActionOutcome) -> Self {
        self.outcomes.insert(tool.to_string(), outcome);
        self
    }

    /// Calls to `tool` fail as if the bridge were down.
    pub fn with_unreachable(mut self, tool: &str) -> Self {
        self.unreachable.insert(tool.to_string());
        self
    }

    /// Request a stop on `signal` while the `k`-th call is running.
    pub fn stop_during_call(mut self, k: usize, signal: StopSignal) -> Self {
        self.stop_after = Some((k, signal));
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.name).collect()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    async fn execute(&self, call: &ToolCall) -> Result<ActionOutcome, ToolError> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len()
        };
        if let Some((k, signal)) = &self.stop_after
            && *k == count
        {
            signal.request_stop();
        }
        if self.unreachable.contains(&call.name) {
            return Err(ToolError::BridgeUnavailable("connection refused".into()));
        }
        Ok(self
            .outcomes
            .get(&call.name)
            .cloned()
            .unwrap_or_else(|| ActionOutcome::ok(format!("Executed {}", call.name))))
    }
}

/// A search backend with canned results per query.
pub struct StaticSearch {
    results: HashMap<String, Vec<DocSnippet>>,
    healthy: bool,
    failing: HashSet<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            healthy: true,
            failing: HashSet::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn offline() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn with_results(mut self, query: &str, snippets: Vec<DocSnippet>) -> Self {
        self.results.insert(query.to_string(), snippets);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocSnippet>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if !self.healthy {
            return Err(SearchError::Unavailable("offline".into()));
        }
        if self.failing.contains(query) {
            return Err(SearchError::Timeout(query.to_string()));
        }
        Ok(self
            .results
            .get(query)
            .map(|r| r.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

/// A snippet long enough to pass the default noise filter.
pub fn doc(file: &str, lead: &str) -> DocSnippet {
    DocSnippet::new(file, format!("{lead} {}", "documentation text ".repeat(5)))
}
