//! The aegent agent loop.
//!
//! The agent follows a **prompt → complete → parse → execute → continue**
//! cycle:
//!
//! 1. **Receive** a user message and reset per-request state
//! 2. **Build** a prompt from the tool catalog, session memory and history
//! 3. **Complete** it with the selected provider
//! 4. **Parse** tool calls out of the text and execute them in order
//! 5. **Continue** with every result so far, until the model calls `stop`,
//!    answers in plain text, hits the tool-call ceiling, fails, or is
//!    cancelled
//!
//! [`DocChat`] is the documentation-answering variant: plan searches,
//! retrieve sequentially, answer from the deduplicated snippets.

pub mod doc_chat;
pub mod events;
pub mod memory;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod search_plan;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use doc_chat::{DocAnswer, DocChat};
pub use events::AgentEvent;
pub use memory::{DedupPolicy, DocStore, SessionToolResults};
pub use orchestrator::{
    AgentLimits, Capabilities, CompletionMode, Orchestrator, SEARCH_TOOL, TurnReport, TurnStatus,
};
pub use parser::{Diagnostic, ParsedResponse, STOP_TOOL, parse};
pub use prompt::PromptBuilder;
pub use search_plan::{
    PlannedQuery, RetrievalReport, SearchPlan, SearchPlanner, SequentialRetriever, fallback_plan,
};
pub use session::{AgentRunState, Phase, Session, StopSignal};
