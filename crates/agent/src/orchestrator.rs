//! The agent loop.
//!
//! One user request runs through:
//!
//! ```text
//! Idle → Planning → AwaitingCompletion → ExecutingTools → Continuing ─┐
//!                        ▲                                            │
//!                        └────────────────────────────────────────────┘
//!                                              → Completed / Stopped
//! ```
//!
//! Every pass either hits the `stop` tool, hits the tool-call ceiling,
//! yields no tool calls (the text becomes the answer), fails on the
//! provider call, or is cancelled. Tool failures are recorded as results
//! and shown to the model on the next pass.

use aegent_config::AppConfig;
use aegent_core::error::ProviderError;
use aegent_core::message::Message;
use aegent_core::provider::{CompletionRequest, Provider};
use aegent_core::search::SearchProvider;
use aegent_core::tool::{ActionExecutor, ActionOutcome, ToolCall, ToolCatalog, ToolResult, ToolSpec};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::AgentEvent;
use crate::parser::{self, ParsedResponse, STOP_TOOL};
use crate::prompt::PromptBuilder;
use crate::session::{Phase, Session, StopSignal};

/// Built-in tool that queries the documentation backend.
pub const SEARCH_TOOL: &str = "search_docs";

const SEARCH_EXCERPT_LEN: usize = 300;

/// Which tool families the model may use in this orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Forward calls to the host bridge
    pub host_tools: bool,
    /// Offer the built-in `search_docs` tool
    pub doc_search: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            host_tools: true,
            doc_search: false,
        }
    }
}

/// How completion text is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    #[default]
    Batch,
    /// Consume the provider stream, emitting `Chunk` events as text arrives
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLimits {
    /// Hard ceiling on executed tool calls per user request
    pub max_tool_calls: usize,
    /// Ceiling on completion round-trips per user request
    pub max_iterations: usize,
    /// History messages rendered into the first prompt
    pub history_window: usize,
    /// Default `top_k` for `search_docs`
    pub search_top_k: usize,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_tool_calls: 25,
            max_iterations: 30,
            history_window: 6,
            search_top_k: 5,
        }
    }
}

impl From<&AppConfig> for AgentLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_tool_calls: config.agent.max_tool_calls,
            max_iterations: config.agent.max_iterations,
            history_window: config.agent.history_window,
            search_top_k: config.search.top_k,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnStatus {
    /// The model called `stop`
    Completed { reason: String },
    /// The model answered in plain text
    Answered,
    /// The tool-call ceiling was hit
    LimitReached { limit: usize },
    /// Too many completion round-trips
    IterationLimit { limit: usize },
    /// The user asked to stop
    Cancelled,
    ProviderFailed(ProviderError),
}

impl TurnStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Answered => "answered",
            Self::LimitReached { .. } => "limit_reached",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::Cancelled => "cancelled",
            Self::ProviderFailed(_) => "provider_failed",
        }
    }

    /// The single user-visible status line for this outcome.
    pub fn message(&self) -> String {
        match self {
            Self::Completed { reason } => format!("Task completed: {reason}"),
            Self::Answered => "Done.".to_string(),
            Self::LimitReached { limit } => format!(
                "Stopped: reached the limit of {limit} tool calls for one request. \
                 The task may be incomplete; send a follow-up message to continue."
            ),
            Self::IterationLimit { limit } => format!(
                "Stopped: the model did not finish within {limit} steps. \
                 The task may be incomplete."
            ),
            Self::Cancelled => "Stopped by user.".to_string(),
            Self::ProviderFailed(e) => format!("Model request failed: {e}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Answered)
    }
}

/// Summary of one `run`.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub status: TurnStatus,
    /// Text shown to the user: the model's answer or the status line
    pub response: String,
    /// Completion round-trips, including a corrective re-prompt
    pub iterations: usize,
    /// Executed tool calls, excluding `stop`
    pub tool_calls: usize,
    pub results: Vec<ToolResult>,
}

/// The tool-calling agent loop, parameterized by capabilities and
/// completion mode.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    executor: Arc<dyn ActionExecutor>,
    search: Option<Arc<dyn SearchProvider>>,
    capabilities: Capabilities,
    mode: CompletionMode,
    limits: AgentLimits,
    prompts: PromptBuilder,
    events: Option<mpsc::Sender<AgentEvent>>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, executor: Arc<dyn ActionExecutor>) -> Self {
        let limits = AgentLimits::default();
        Self {
            provider,
            executor,
            search: None,
            capabilities: Capabilities::default(),
            mode: CompletionMode::Batch,
            limits,
            prompts: PromptBuilder::new().with_history_window(limits.history_window),
            events: None,
            temperature: 0.3,
            max_tokens: None,
        }
    }

    /// Attach a documentation backend for the `search_docs` tool.
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self.prompts = self.prompts.with_history_window(limits.history_window);
        self
    }

    /// Publish progress events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Documentation snippets rendered into agent prompts.
    pub fn with_doc_sources(mut self, sources: usize) -> Self {
        self.prompts = self.prompts.with_doc_sources(sources);
        self
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.prompts = self.prompts.with_system(system);
        self
    }

    pub fn limits(&self) -> AgentLimits {
        self.limits
    }

    /// The catalog offered to the model: host tools (if enabled) plus the
    /// built-in search tool (if enabled and a backend is attached).
    pub fn catalog(&self) -> ToolCatalog {
        let mut catalog = if self.capabilities.host_tools {
            self.executor.catalog().clone()
        } else {
            ToolCatalog::new()
        };
        if self.capabilities.doc_search && self.search.is_some() {
            catalog.register(search_tool_spec());
        }
        catalog
    }

    /// Run one user request to a terminal state.
    pub async fn run(&self, session: &mut Session, user_message: &str) -> TurnReport {
        session.begin_turn(user_message);
        let stop = session.stop_signal();

        self.set_phase(session, Phase::Planning);
        let catalog = self.catalog();
        let mut prompt = self.prompts.initial(&catalog, session, user_message);
        let mut corrected = false;
        let mut answer = String::new();

        let status = loop {
            if session.state.iteration_count >= self.limits.max_iterations {
                warn!(limit = self.limits.max_iterations, "Iteration limit reached");
                break TurnStatus::IterationLimit {
                    limit: self.limits.max_iterations,
                };
            }
            session.state.iteration_count += 1;

            self.set_phase(session, Phase::AwaitingCompletion);
            let text = match self.complete(&prompt, &stop).await {
                Ok(Some(text)) => text,
                Ok(None) => break TurnStatus::Cancelled,
                Err(e) => {
                    warn!(provider = self.provider.name(), error = %e, "Completion failed");
                    break TurnStatus::ProviderFailed(e);
                }
            };

            self.set_phase(session, Phase::ExecutingTools);
            let parsed = parser::parse(&text);
            for err in &parsed.errors {
                warn!(excerpt = %err.excerpt, reason = %err.reason, "Skipped malformed tool call");
            }

            if parsed.is_empty() {
                if let Some(diagnostic) = &parsed.diagnostic
                    && !corrected
                {
                    if stop.is_requested() {
                        break TurnStatus::Cancelled;
                    }
                    corrected = true;
                    info!(diagnostic = ?diagnostic, "Response broke the calling convention, re-prompting once");
                    self.emit(AgentEvent::Correction {
                        diagnostic: diagnostic.describe(),
                    });
                    prompt = self
                        .prompts
                        .correction(&catalog, session, user_message, diagnostic, &text);
                    continue;
                }
                answer = final_text(&parsed, &text);
                break TurnStatus::Answered;
            }

            debug!(
                calls = parsed.calls.len(),
                stop = parsed.stop.is_some(),
                "Parsed tool calls"
            );
            if let Some(status) = self.execute_batch(session, &stop, &parsed).await {
                break status;
            }

            if stop.is_requested() {
                break TurnStatus::Cancelled;
            }
            self.set_phase(session, Phase::Continuing);
            prompt = self.prompts.continuation(&catalog, session, user_message);
        };

        self.finish(session, status, answer)
    }

    /// Execute one parsed batch in textual order. Returns a terminal status
    /// if the batch ended the turn.
    async fn execute_batch(
        &self,
        session: &mut Session,
        stop: &StopSignal,
        parsed: &ParsedResponse,
    ) -> Option<TurnStatus> {
        let total = parsed.calls.len();
        for (i, call) in parsed.calls.iter().enumerate() {
            if stop.is_requested() {
                info!(executed = i, remaining = total - i, "Cancelled mid-batch");
                return Some(TurnStatus::Cancelled);
            }

            let index = session.state.tool_call_count + 1;
            self.emit(AgentEvent::ToolCall {
                index,
                name: call.name.clone(),
                parameters: call.parameters.clone(),
            });

            let started = Instant::now();
            let result = self.execute_call(session, call).await;
            info!(
                tool = %result.name,
                success = result.success,
                duration_ms = started.elapsed().as_millis() as u64,
                "Tool call finished"
            );
            self.emit(AgentEvent::ToolResult {
                index,
                name: result.name.clone(),
                success: result.success,
                message: result.message.clone(),
            });
            session.results.push(result);
            session.state.tool_call_count += 1;

            if session.state.tool_call_count >= self.limits.max_tool_calls
                && (i + 1 < total || parsed.stop.is_none())
            {
                warn!(limit = self.limits.max_tool_calls, "Tool call limit reached");
                return Some(TurnStatus::LimitReached {
                    limit: self.limits.max_tool_calls,
                });
            }
        }

        let reason = parsed.stop.as_ref()?;
        let mut parameters = Map::new();
        parameters.insert("reason".into(), Value::String(reason.clone()));
        session.results.push(ToolResult::from_outcome(
            &ToolCall::new(STOP_TOOL, parameters),
            ActionOutcome::ok(format!("COMPLETED: {reason}")),
        ));
        Some(TurnStatus::Completed {
            reason: reason.clone(),
        })
    }

    async fn execute_call(&self, session: &mut Session, call: &ToolCall) -> ToolResult {
        if call.name == SEARCH_TOOL && self.capabilities.doc_search {
            return self.search_docs(session, call).await;
        }
        if !self.capabilities.host_tools {
            return ToolResult::failure(
                call,
                format!(
                    "Host tools are disabled in this session; '{}' was not run.",
                    call.name
                ),
            );
        }
        match self.executor.execute(call).await {
            Ok(outcome) => ToolResult::from_outcome(call, outcome),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Host bridge error");
                ToolResult::failure(call, e.to_string())
            }
        }
    }

    /// The built-in documentation search tool. Results go into the
    /// session's doc store; the tool result carries short excerpts.
    async fn search_docs(&self, session: &mut Session, call: &ToolCall) -> ToolResult {
        let Some(search) = &self.search else {
            return ToolResult::failure(call, "Documentation search is not configured.");
        };
        let Some(query) = call.str_param("query").map(str::trim).filter(|q| !q.is_empty()) else {
            return ToolResult::failure(call, "search_docs requires a non-empty 'query' parameter.");
        };
        let top_k = call
            .parameters
            .get("top_k")
            .and_then(Value::as_u64)
            .map(|k| k as usize)
            .unwrap_or(self.limits.search_top_k)
            .clamp(1, 20);

        match search.search(query, top_k).await {
            Ok(mut snippets) => {
                for snippet in &mut snippets {
                    snippet.source_query.get_or_insert_with(|| query.to_string());
                }
                let found = snippets.len();
                let excerpts: Vec<Value> = snippets
                    .iter()
                    .map(|s| {
                        let content: String = s.content.chars().take(SEARCH_EXCERPT_LEN).collect();
                        json!({ "file": s.file, "content": content })
                    })
                    .collect();
                let added = session.docs.add_results(snippets);
                debug!(query, found, added, "Documentation search");
                ToolResult::from_outcome(
                    call,
                    ActionOutcome::ok(format!(
                        "Found {found} documentation results for '{query}' ({added} new)"
                    ))
                    .with_data(Value::Array(excerpts)),
                )
            }
            Err(e) => {
                warn!(query, error = %e, "Documentation search failed");
                ToolResult::failure(call, format!("Documentation search failed: {e}"))
            }
        }
    }

    /// Get completion text. `Ok(None)` means a stop was requested while
    /// streaming.
    async fn complete(&self, prompt: &str, stop: &StopSignal) -> Result<Option<String>, ProviderError> {
        let request = CompletionRequest::new(prompt)
            .with_system(self.prompts.system())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match self.mode {
            CompletionMode::Batch => Ok(Some(self.provider.complete(request).await?.text)),
            CompletionMode::Streaming => {
                let mut rx = self.provider.stream(request).await?;
                let mut text = String::new();
                while let Some(chunk) = rx.recv().await {
                    let chunk = chunk?;
                    if let Some(content) = chunk.content
                        && !content.is_empty()
                    {
                        self.emit(AgentEvent::Chunk {
                            content: content.clone(),
                        });
                        text.push_str(&content);
                    }
                    if chunk.done {
                        break;
                    }
                    if stop.is_requested() {
                        return Ok(None);
                    }
                }
                Ok(Some(text))
            }
        }
    }

    fn finish(&self, session: &mut Session, status: TurnStatus, answer: String) -> TurnReport {
        let response = match status {
            TurnStatus::Answered => answer,
            _ => status.message(),
        };

        let message = match status {
            TurnStatus::Cancelled | TurnStatus::ProviderFailed(_) => Message::system(&response),
            _ => Message::assistant(&response),
        };
        session.history.push(message);

        let phase = if status.is_success() {
            Phase::Completed
        } else {
            Phase::Stopped
        };
        self.set_phase(session, phase);
        session.state.is_processing = false;

        let iterations = session.state.iteration_count;
        let tool_calls = session.state.tool_call_count;
        info!(
            status = status.label(),
            iterations,
            tool_calls,
            session_id = %session.id,
            "Turn finished"
        );
        match &status {
            TurnStatus::ProviderFailed(_) => self.emit(AgentEvent::Error {
                message: response.clone(),
            }),
            _ => self.emit(AgentEvent::Done {
                status: status.label().to_string(),
                iterations,
                tool_calls,
            }),
        }

        TurnReport {
            status,
            response,
            iterations,
            tool_calls,
            results: session.results.as_slice().to_vec(),
        }
    }

    fn set_phase(&self, session: &mut Session, phase: Phase) {
        debug!(from = ?session.state.phase, to = ?phase, "Phase transition");
        session.state.phase = phase;
        self.emit(AgentEvent::Phase { phase });
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events
            && tx.try_send(event).is_err()
        {
            debug!("Event channel full or closed, dropping event");
        }
    }
}

/// Text to show when a response has no calls: what's left after call
/// removal, or the raw text if nothing is left.
fn final_text(parsed: &ParsedResponse, raw: &str) -> String {
    let residual = parsed.residual.trim();
    if !residual.is_empty() {
        return residual.to_string();
    }
    let raw = raw.trim();
    if raw.is_empty() {
        "The model returned an empty response.".to_string()
    } else {
        raw.to_string()
    }
}

fn search_tool_spec() -> ToolSpec {
    ToolSpec::new(
        SEARCH_TOOL,
        "Search the After Effects scripting documentation; results are added to your context",
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Keyword query" },
                "top_k": { "type": "integer", "description": "Number of results" }
            },
            "required": ["query"]
        }),
    )
}
