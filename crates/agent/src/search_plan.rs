//! Search planning and sequential retrieval for documentation chat.
//!
//! The planner asks the model to break a question into a few prioritized
//! keyword queries. Planning never fails: a provider error or an
//! unparseable reply falls back to a small keyword table.
//!
//! The retriever runs the queries one at a time, folding results into the
//! doc store after each step.

use aegent_core::provider::{CompletionRequest, Provider};
use aegent_core::search::SearchProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::memory::DocStore;
use crate::parser::find_json_value;
use crate::prompt::PromptBuilder;
use crate::session::StopSignal;

/// Upper bound on planned queries.
pub const MAX_QUERIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedQuery {
    pub query: String,
    #[serde(default)]
    pub purpose: String,
    /// Lower runs first
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    1
}

impl PlannedQuery {
    pub fn new(query: impl Into<String>, purpose: impl Into<String>, priority: u32) -> Self {
        Self {
            query: query.into(),
            purpose: purpose.into(),
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub queries: Vec<PlannedQuery>,
    #[serde(default)]
    pub expected_outcome: String,
}

impl SearchPlan {
    /// Queries in execution order. Ties keep plan order.
    pub fn ordered(&self) -> Vec<&PlannedQuery> {
        let mut queries: Vec<&PlannedQuery> = self.queries.iter().collect();
        queries.sort_by_key(|q| q.priority);
        queries
    }

    pub fn query_strings(&self) -> Vec<String> {
        self.ordered().into_iter().map(|q| q.query.clone()).collect()
    }
}

/// Keyword table for the fallback plan: every group must match, then the
/// expansions are added.
const FALLBACK_RULES: &[(&[&[&str]], &[&str])] = &[
    (
        &[&["create", "add"], &["layer"]],
        &["add layer to composition", "layer creation methods"],
    ),
    (
        &[&["create", "add"], &["shape"]],
        &["shape layer properties", "addProperty shape"],
    ),
    (
        &[&["create", "add"], &["text"]],
        &["text layer methods", "TextLayer properties"],
    ),
    (
        &[&["property", "properties"]],
        &["property setValue getValue", "PropertyGroup addProperty"],
    ),
    (
        &[&["keyframe", "animate", "animation"]],
        &["setValueAtTime keyframe", "Property keyframe methods"],
    ),
    (&[&["composition", "comp"]], &["CompItem methods properties"]),
    (&[&["effect"]], &["apply effect layer", "effects property"]),
];

/// Deterministic plan from keyword matching. The question itself is always
/// the first query.
pub fn fallback_plan(question: &str) -> SearchPlan {
    let lower = question.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |terms: &[&str]| {
        terms
            .iter()
            .any(|t| words.iter().any(|w| w == t || w.strip_suffix('s') == Some(*t)))
    };

    let mut queries: Vec<String> = vec![question.trim().to_string()];
    for (groups, expansions) in FALLBACK_RULES {
        if groups.iter().all(|terms| mentions(terms)) {
            for expansion in *expansions {
                if !queries.iter().any(|q| q.eq_ignore_ascii_case(expansion)) {
                    queries.push(expansion.to_string());
                }
            }
        }
    }
    queries.retain(|q| !q.is_empty());
    queries.truncate(MAX_QUERIES);

    SearchPlan {
        analysis: "Keyword fallback".into(),
        strategy: "Original question plus known domain terms".into(),
        queries: queries
            .into_iter()
            .enumerate()
            .map(|(i, q)| PlannedQuery::new(q, "fallback", i as u32 + 1))
            .collect(),
        expected_outcome: String::new(),
    }
}

/// Asks the model for a search plan.
pub struct SearchPlanner {
    provider: Arc<dyn Provider>,
    temperature: f32,
    max_tokens: u32,
    max_queries: usize,
}

impl SearchPlanner {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            temperature: 0.2,
            max_tokens: 600,
            max_queries: MAX_QUERIES,
        }
    }

    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries.clamp(1, MAX_QUERIES);
        self
    }

    /// Plan searches for `question`. Never fails.
    pub async fn plan(&self, question: &str) -> SearchPlan {
        let request = CompletionRequest::new(PromptBuilder::search_plan(question, self.max_queries))
            .with_temperature(self.temperature)
            .with_max_tokens(Some(self.max_tokens));

        let text = match self.provider.complete(request).await {
            Ok(completion) => completion.text,
            Err(e) => {
                warn!(error = %e, "Search planning failed, using keyword fallback");
                return fallback_plan(question);
            }
        };

        match self.parse_plan(&text) {
            Some(plan) => {
                info!(queries = plan.queries.len(), "Search plan ready");
                plan
            }
            None => {
                warn!("Unusable search plan, using keyword fallback");
                fallback_plan(question)
            }
        }
    }

    /// Accepts a plan object or a bare array of query strings.
    fn parse_plan(&self, text: &str) -> Option<SearchPlan> {
        let mut plan = match find_json_value(text)? {
            Value::Array(items) => SearchPlan {
                queries: items
                    .iter()
                    .filter_map(Value::as_str)
                    .enumerate()
                    .map(|(i, q)| PlannedQuery::new(q, "", i as u32 + 1))
                    .collect(),
                ..SearchPlan::default()
            },
            value @ Value::Object(_) => serde_json::from_value::<SearchPlan>(value).ok()?,
            _ => return None,
        };

        let mut seen: Vec<String> = Vec::new();
        plan.queries.retain(|q| {
            let key = q.query.trim().to_lowercase();
            if key.is_empty() || seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        });
        if plan.queries.is_empty() {
            return None;
        }
        plan.queries.sort_by_key(|q| q.priority);
        plan.queries.truncate(self.max_queries);
        Some(plan)
    }
}

/// What a retrieval pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    /// Queries that returned
    pub executed: usize,
    /// Queries that errored
    pub failed: usize,
    /// Snippets kept after dedup
    pub added: usize,
    /// A stop was requested before all queries ran
    pub cancelled: bool,
}

/// Runs plan queries against the search backend one at a time.
pub struct SequentialRetriever {
    search: Arc<dyn SearchProvider>,
    top_k_per_query: usize,
}

impl SequentialRetriever {
    pub fn new(search: Arc<dyn SearchProvider>, top_k_per_query: usize) -> Self {
        Self {
            search,
            top_k_per_query: top_k_per_query.max(1),
        }
    }

    pub async fn retrieve(&self, plan: &SearchPlan, docs: &mut DocStore, stop: &StopSignal) -> RetrievalReport {
        let mut report = RetrievalReport::default();
        for planned in plan.ordered() {
            if stop.is_requested() {
                report.cancelled = true;
                break;
            }
            match self.search.search(&planned.query, self.top_k_per_query).await {
                Ok(mut snippets) => {
                    for snippet in &mut snippets {
                        snippet.source_query = Some(planned.query.clone());
                    }
                    let found = snippets.len();
                    let added = docs.add_results(snippets);
                    debug!(query = %planned.query, found, added, "Retrieval step");
                    report.executed += 1;
                    report.added += added;
                }
                Err(e) => {
                    warn!(query = %planned.query, error = %e, "Retrieval step failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            executed = report.executed,
            failed = report.failed,
            unique = docs.len(),
            "Retrieval finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, StaticSearch, doc};
    use aegent_core::error::ProviderError;

    #[test]
    fn fallback_starts_with_question() {
        let plan = fallback_plan("How do I add a shape layer?");
        let queries = plan.query_strings();
        assert_eq!(queries[0], "How do I add a shape layer?");
        assert!(queries.contains(&"add layer to composition".to_string()));
        assert!(queries.contains(&"shape layer properties".to_string()));
        assert!(queries.len() <= MAX_QUERIES);
    }

    #[test]
    fn fallback_matches_plurals_and_caps_length() {
        let plan = fallback_plan("keyframes on effects in comps with properties");
        let queries = plan.query_strings();
        assert_eq!(queries.len(), MAX_QUERIES);
        assert_eq!(queries[1], "property setValue getValue");
    }

    #[test]
    fn fallback_with_no_terms_is_just_the_question() {
        let plan = fallback_plan("hello there");
        assert_eq!(plan.query_strings(), vec!["hello there"]);
    }

    #[test]
    fn ordered_is_stable_by_priority() {
        let plan = SearchPlan {
            queries: vec![
                PlannedQuery::new("b", "", 2),
                PlannedQuery::new("a", "", 1),
                PlannedQuery::new("c", "", 2),
            ],
            ..SearchPlan::default()
        };
        assert_eq!(plan.query_strings(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn planner_parses_fenced_plan() {
        let reply = r#"Here is the plan:
```json
{"analysis":"masks","strategy":"objects then methods","queries":[
  {"query":"MaskPropertyGroup","purpose":"object","priority":2},
  {"query":"add mask layer","purpose":"method","priority":1},
  {"query":"add mask layer","purpose":"dup","priority":3}
],"expectedOutcome":"how to add masks"}
```"#;
        let provider = Arc::new(ScriptedProvider::new(vec![reply]));
        let plan = SearchPlanner::new(provider).plan("how do I add a mask").await;

        assert_eq!(plan.analysis, "masks");
        assert_eq!(plan.expected_outcome, "how to add masks");
        assert_eq!(plan.query_strings(), vec!["add mask layer", "MaskPropertyGroup"]);
    }

    #[tokio::test]
    async fn planner_accepts_string_array() {
        let provider = Arc::new(ScriptedProvider::new(vec![r#"["layer parent", "setParentWithJump"]"#]));
        let plan = SearchPlanner::new(provider).plan("parenting").await;
        assert_eq!(plan.query_strings(), vec!["layer parent", "setParentWithJump"]);
    }

    #[tokio::test]
    async fn planner_falls_back_on_garbage() {
        let provider = Arc::new(ScriptedProvider::new(vec!["I think you should search for layers."]));
        let plan = SearchPlanner::new(provider).plan("add text layer").await;
        assert_eq!(plan.analysis, "Keyword fallback");
        assert_eq!(plan.query_strings()[0], "add text layer");
    }

    #[tokio::test]
    async fn planner_falls_back_on_provider_error() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![Err(
            ProviderError::Network("down".into()),
        )]));
        let plan = SearchPlanner::new(provider).plan("apply an effect").await;
        assert!(plan.query_strings().contains(&"apply effect layer".to_string()));
    }

    #[tokio::test]
    async fn planner_falls_back_on_empty_queries() {
        let provider = Arc::new(ScriptedProvider::new(vec![r#"{"analysis":"x","queries":[]}"#]));
        let plan = SearchPlanner::new(provider).plan("comp settings").await;
        assert_eq!(plan.analysis, "Keyword fallback");
    }

    #[tokio::test]
    async fn retrieval_runs_in_order_and_dedups() {
        let search = Arc::new(
            StaticSearch::new()
                .with_results("first", vec![doc("a.md", "Alpha"), doc("b.md", "Beta")])
                .with_results("second", vec![doc("b.md", "Beta"), doc("c.md", "Gamma")])
                .with_failure("third"),
        );
        let plan = SearchPlan {
            queries: vec![
                PlannedQuery::new("second", "", 2),
                PlannedQuery::new("first", "", 1),
                PlannedQuery::new("third", "", 3),
            ],
            ..SearchPlan::default()
        };
        let mut docs = DocStore::default();

        let report = SequentialRetriever::new(search.clone(), 3)
            .retrieve(&plan, &mut docs, &StopSignal::new())
            .await;

        assert_eq!(search.queries(), vec!["first", "second", "third"]);
        assert_eq!(report.executed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.added, 3);
        let files: Vec<_> = docs.cumulative().iter().map(|d| d.file.as_str()).collect();
        assert_eq!(files, vec!["a.md", "b.md", "c.md"]);
        assert_eq!(docs.cumulative()[2].source_query.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn retrieval_honors_stop() {
        let search = Arc::new(StaticSearch::new());
        let stop = StopSignal::new();
        stop.request_stop();
        let report = SequentialRetriever::new(search.clone(), 3)
            .retrieve(&fallback_plan("layers"), &mut DocStore::default(), &stop)
            .await;
        assert!(report.cancelled);
        assert!(search.queries().is_empty());
    }
}
