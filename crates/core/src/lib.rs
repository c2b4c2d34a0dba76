//! # aegent Core
//!
//! Domain types, traits, and error definitions for the aegent scripting
//! assistant. This crate performs no I/O of its own - it defines the model
//! that the provider adapters, the host bridge, the documentation search
//! client and the agent loop all implement against.
//!
//! ## Collaborators
//!
//! The agent core talks to three external collaborators, each behind a trait:
//! - [`Provider`] - a Completion Provider (Gemini, OpenAI, Claude)
//! - [`ActionExecutor`] - the host-application scripting bridge
//! - [`SearchProvider`] - the documentation retrieval backend

pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SearchError, ToolError};
pub use message::{ConversationHistory, Message, Role};
pub use provider::{Completion, CompletionRequest, ModelKind, Provider, StreamChunk, Usage};
pub use search::{DocSnippet, SearchProvider};
pub use tool::{ActionExecutor, ActionOutcome, ToolCall, ToolCatalog, ToolResult, ToolSpec};
