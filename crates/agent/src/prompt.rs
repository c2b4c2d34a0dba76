//! Prompt construction.
//!
//! Every prompt is a pure function of the tool catalog, session memory and
//! conversation history. Nothing here talks to a provider.

use aegent_core::tool::ToolCatalog;

use crate::parser::{Diagnostic, STOP_TOOL};
use crate::session::Session;

/// Default system instruction for agent turns.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert After Effects automation assistant. \
You complete the user's request by calling host tools one step at a time. \
Tool results tell you what actually happened in the host application: \
read failures carefully and fix the cause before retrying.";

/// System instruction for documentation answers.
pub const DOC_SYSTEM_PROMPT: &str = "You are an expert After Effects scripting assistant \
specializing in ExtendScript. Prioritize the provided documentation over general knowledge, \
cite the sources you use, use method and property names exactly as documented, and say \
clearly when the documentation does not cover something.";

const CALLING_CONVENTION: &str = r#"## How to call tools
Reply with one JSON object per tool call, exactly in this form:
{"tool": "tool_name", "parameters": {"param": "value"}}

- You may include several tool calls in one reply; they run in order.
- Parameter names must match the tool list exactly.
- When the whole request is done, call:
{"tool": "stop", "parameters": {"reason": "short summary of what was done"}}
- If no tool is needed, answer in plain text without any JSON."#;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    history_window: usize,
    doc_sources: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: 6,
            doc_sources: 6,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Number of history messages rendered into agent prompts.
    pub fn with_history_window(mut self, messages: usize) -> Self {
        self.history_window = messages;
        self
    }

    /// Number of documentation snippets rendered into agent prompts.
    pub fn with_doc_sources(mut self, sources: usize) -> Self {
        self.doc_sources = sources;
        self
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    fn tools_section(catalog: &ToolCatalog) -> String {
        let mut out = String::from("## Available tools\n");
        if catalog.is_empty() {
            out.push_str("(no host tools are available in this session)\n");
        } else {
            out.push_str(&catalog.render());
            out.push('\n');
        }
        out.push_str(&format!(
            "- {STOP_TOOL}(reason?): Finish the request and report what was done\n"
        ));
        out
    }

    /// History before the current user message.
    fn history_section(&self, session: &Session) -> Option<String> {
        let len = session.history.len();
        if len <= 1 || self.history_window == 0 {
            return None;
        }
        let previous: Vec<String> = session
            .history
            .recent(self.history_window + 1)
            .take(len.min(self.history_window + 1) - 1)
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect();
        Some(format!("## Conversation so far\n{}\n", previous.join("\n")))
    }

    fn docs_section(&self, session: &Session) -> Option<String> {
        if session.docs.is_empty() {
            return None;
        }
        Some(format!(
            "## Documentation found so far\n{}\n",
            session.docs.render(self.doc_sources)
        ))
    }

    fn assemble(sections: Vec<Option<String>>) -> String {
        sections
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string()
    }

    /// First prompt of a turn.
    pub fn initial(&self, catalog: &ToolCatalog, session: &Session, user_message: &str) -> String {
        Self::assemble(vec![
            Some(Self::tools_section(catalog)),
            Some(format!("{CALLING_CONVENTION}\n")),
            self.history_section(session),
            self.docs_section(session),
            Some(format!("## User request\n{user_message}\n")),
        ])
    }

    /// Re-prompt after a batch of tool calls, showing everything done so far.
    pub fn continuation(&self, catalog: &ToolCatalog, session: &Session, user_message: &str) -> String {
        Self::assemble(vec![
            Some(Self::tools_section(catalog)),
            Some(format!("{CALLING_CONVENTION}\n")),
            self.docs_section(session),
            Some(format!("## Original request\n{user_message}\n")),
            Some(format!(
                "## Tool results so far ({} calls)\n{}\n",
                session.results.len(),
                session.results.render_numbered()
            )),
            Some(
                "## Next step\nIf the request is fully done, call the stop tool with a summary. \
                 If a call failed, fix the cause (for example create what is missing) and retry. \
                 Otherwise make the next tool calls."
                    .to_string(),
            ),
        ])
    }

    /// One-time corrective re-prompt after a response broke the convention.
    /// Carries the same session memory as a continuation so work already done
    /// in this turn is not repeated.
    pub fn correction(
        &self,
        catalog: &ToolCatalog,
        session: &Session,
        user_message: &str,
        diagnostic: &Diagnostic,
        previous_response: &str,
    ) -> String {
        let results = (!session.results.is_empty()).then(|| {
            format!(
                "## Tool results so far ({} calls)\n{}\n",
                session.results.len(),
                session.results.render_numbered()
            )
        });
        Self::assemble(vec![
            Some(Self::tools_section(catalog)),
            Some(format!("{CALLING_CONVENTION}\n")),
            self.history_section(session),
            self.docs_section(session),
            Some(format!("## Original request\n{user_message}\n")),
            results,
            Some(format!(
                "## Your previous reply\n{}\n",
                previous_response.trim()
            )),
            Some(format!(
                "## Problem\n{}\nRespond again using only the exact JSON tool call format shown above.",
                diagnostic.describe()
            )),
        ])
    }

    /// Prompt asking the model to decompose a question into searches.
    pub fn search_plan(question: &str, max_queries: usize) -> String {
        format!(
            r#"You plan keyword searches over the After Effects ExtendScript documentation.

Question: {question}

Decompose the question into 3 to {max_queries} short keyword queries covering:
1. Main objects and classes (Layer, CompItem, Property, ...)
2. Specific methods and properties
3. Alternative terminology
4. Implementation details

Return ONLY a JSON object, no prose:
{{"analysis": "what the question needs", "strategy": "how the queries cover it", "queries": [{{"query": "keywords", "purpose": "why", "priority": 1}}], "expectedOutcome": "what the results should explain"}}

Priority 1 is searched first."#
        )
    }

    /// Prompt for a documentation-grounded answer.
    pub fn doc_answer(
        question: &str,
        documentation: &str,
        queries: &[String],
        conversation: &str,
    ) -> String {
        let documentation = if documentation.trim().is_empty() {
            "=== NO RELEVANT DOCUMENTATION FOUND ===".to_string()
        } else {
            documentation.to_string()
        };
        let queries = if queries.is_empty() {
            "(none)".to_string()
        } else {
            queries.join(", ")
        };
        let conversation = if conversation.trim().is_empty() {
            "(none)".to_string()
        } else {
            conversation.to_string()
        };

        format!(
            r#"Read every documentation source below, then answer the question.

=== DOCUMENTATION CONTEXT ===
{documentation}
=== END DOCUMENTATION CONTEXT ===

Search queries used: {queries}

Conversation history:
{conversation}

Question: {question}

Rules:
- Base the answer on the documentation when it covers the question, and cite sources by number.
- Use property and method names exactly as documented.
- If the documentation does not cover the question, start with "The provided documentation doesn't cover this." and then answer from general ExtendScript knowledge.
- Format code with ```javascript fences."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegent_core::message::Message;
    use aegent_core::provider::ModelKind;
    use aegent_core::search::DocSnippet;
    use aegent_core::tool::{ActionOutcome, ToolCall, ToolResult, ToolSpec};
    use serde_json::{Map, json};

    fn catalog() -> ToolCatalog {
        ToolCatalog::new().with_spec(ToolSpec::new(
            "create_composition",
            "Create a composition",
            json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        ))
    }

    #[test]
    fn initial_lists_tools_convention_and_request() {
        let mut session = Session::new(ModelKind::Gemini);
        session.begin_turn("make a comp called Main");
        let prompt = PromptBuilder::new().initial(&catalog(), &session, "make a comp called Main");

        assert!(prompt.contains("- create_composition(name): Create a composition"));
        assert!(prompt.contains("- stop(reason?)"));
        assert!(prompt.contains(r#"{"tool": "tool_name", "parameters""#));
        assert!(prompt.ends_with("make a comp called Main"));
        // Only the current message is in history, so no history section
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn initial_includes_previous_exchanges() {
        let mut session = Session::new(ModelKind::Gemini);
        session.history.push(Message::user("hello"));
        session.history.push(Message::assistant("hi there"));
        session.begin_turn("now a square");

        let prompt = PromptBuilder::new().initial(&catalog(), &session, "now a square");
        assert!(prompt.contains("User: hello\nAssistant: hi there"));
        assert!(!prompt.contains("User: now a square"));
    }

    #[test]
    fn history_window_bounds_context() {
        let mut session = Session::new(ModelKind::Gemini);
        for i in 0..10 {
            session.history.push(Message::user(format!("m{i}")));
        }
        session.begin_turn("latest");
        let prompt = PromptBuilder::new()
            .with_history_window(2)
            .initial(&catalog(), &session, "latest");
        assert!(prompt.contains("User: m8\nUser: m9"));
        assert!(!prompt.contains("m7"));
    }

    #[test]
    fn continuation_shows_all_results_and_request() {
        let mut session = Session::new(ModelKind::Gemini);
        session.begin_turn("red square");
        let call = ToolCall::new("create_composition", Map::new());
        session.results.push(ToolResult::from_outcome(&call, ActionOutcome::ok("Created")));
        session.results.push(ToolResult::failure(&call, "Name taken"));

        let prompt = PromptBuilder::new().continuation(&catalog(), &session, "red square");
        assert!(prompt.contains("## Original request\nred square"));
        assert!(prompt.contains("Tool results so far (2 calls)"));
        assert!(prompt.contains("1. create_composition {} -> SUCCESS: Created"));
        assert!(prompt.contains("2. create_composition {} -> FAILED: Name taken"));
    }

    #[test]
    fn continuation_includes_docs_when_present() {
        let mut session = Session::new(ModelKind::Gemini);
        session.begin_turn("q");
        session
            .docs
            .add_results(vec![DocSnippet::new("layer.md", "L".repeat(60))]);
        let prompt = PromptBuilder::new().continuation(&catalog(), &session, "q");
        assert!(prompt.contains("=== SOURCE 1: layer.md ==="));
    }

    #[test]
    fn correction_quotes_problem_and_reply() {
        let mut session = Session::new(ModelKind::Gemini);
        session.begin_turn("make a square");
        let diagnostic = Diagnostic::PrintCall { callee: "print".into() };
        let prompt = PromptBuilder::new().correction(
            &catalog(),
            &session,
            "make a square",
            &diagnostic,
            "print(create_square())",
        );
        assert!(prompt.contains("print(create_square())"));
        assert!(prompt.contains("print(...) call"));
        assert!(prompt.contains("exact JSON tool call format"));
        assert!(!prompt.contains("Tool results so far"));
    }

    #[test]
    fn correction_keeps_session_memory() {
        let mut session = Session::new(ModelKind::Gemini);
        session.history.push(Message::user("earlier"));
        session.begin_turn("red square");
        let call = ToolCall::new("create_composition", Map::new());
        session.results.push(ToolResult::from_outcome(&call, ActionOutcome::ok("Created")));
        session
            .docs
            .add_results(vec![DocSnippet::new("layer.md", "L".repeat(60))]);

        let diagnostic = Diagnostic::PrintCall { callee: "print".into() };
        let prompt = PromptBuilder::new().correction(
            &catalog(),
            &session,
            "red square",
            &diagnostic,
            "print(add_layer())",
        );
        assert!(prompt.contains("Tool results so far (1 calls)"));
        assert!(prompt.contains("1. create_composition {} -> SUCCESS: Created"));
        assert!(prompt.contains("=== SOURCE 1: layer.md ==="));
        assert!(prompt.contains("User: earlier"));
    }

    #[test]
    fn doc_sources_bounds_rendered_snippets() {
        let mut session = Session::new(ModelKind::Gemini);
        session.begin_turn("q");
        session.docs.add_results(vec![
            DocSnippet::new("a.md", "A".repeat(60)),
            DocSnippet::new("b.md", "B".repeat(60)),
        ]);
        let prompt = PromptBuilder::new()
            .with_doc_sources(1)
            .continuation(&catalog(), &session, "q");
        assert!(prompt.contains("=== SOURCE 1: a.md ==="));
        assert!(!prompt.contains("b.md"));
    }

    #[test]
    fn empty_catalog_is_called_out() {
        let session = Session::new(ModelKind::Gemini);
        let prompt = PromptBuilder::new().initial(&ToolCatalog::new(), &session, "hi");
        assert!(prompt.contains("no host tools are available"));
    }

    #[test]
    fn doc_answer_handles_missing_docs() {
        let prompt = PromptBuilder::doc_answer("How do I add a mask?", "", &[], "");
        assert!(prompt.contains("NO RELEVANT DOCUMENTATION FOUND"));
        assert!(prompt.contains("Search queries used: (none)"));
        assert!(prompt.contains("Question: How do I add a mask?"));
    }

    #[test]
    fn search_plan_prompt_mentions_limits() {
        let prompt = PromptBuilder::search_plan("keyframe easing", 5);
        assert!(prompt.contains("Question: keyframe easing"));
        assert!(prompt.contains("3 to 5"));
        assert!(prompt.contains("\"expectedOutcome\""));
    }
}
