//! Completion provider implementations for aegent.
//!
//! All providers implement the `aegent_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod anthropic;
pub mod gemini;
mod http;
pub mod openai;
pub mod router;
pub mod sse;

pub use anthropic::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use router::{ProviderRouter, build_from_config};
