//! Provider trait - the abstraction over LLM backends.
//!
//! A Provider takes a prompt and returns the model's generated text, either
//! as a complete response or as a stream of text deltas. Each backend's
//! request/response shape is an adapter detail; the agent core only ever
//! sees [`CompletionRequest`] in and text out.
//!
//! Implementations: Gemini, OpenAI, Claude.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::ProviderError;

/// The user-selectable model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Gemini, ModelKind::OpenAi, ModelKind::Claude];

    /// Config / CLI key for this model family.
    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::Gemini => "gemini",
            ModelKind::OpenAi => "openai",
            ModelKind::Claude => "claude",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ModelKind::Gemini),
            "openai" | "gpt" | "chatgpt" => Ok(ModelKind::OpenAi),
            "claude" | "anthropic" => Ok(ModelKind::Claude),
            other => Err(format!(
                "unknown model '{other}' (expected one of: gemini, openai, claude)"
            )),
        }
    }
}

/// A single prompt-in/text-out request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user prompt (already assembled by the agent core)
    pub prompt: String,

    /// Optional system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub text: String,

    /// Which model actually responded
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The Completion Provider trait.
///
/// Every LLM backend implements this trait. The agent loop calls
/// `complete()` or `stream()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "claude").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: CompletionRequest) -> std::result::Result<Completion, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let completion = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(completion.text),
                done: true,
                usage: completion.usage,
            }))
            .await;
        Ok(rx)
    }

    /// Health check - can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
            Ok(Completion {
                text: format!("echo: {}", request.prompt),
                model: "fixed-1".into(),
                usage: None,
            })
        }
    }

    #[test]
    fn model_kind_parses_aliases() {
        assert_eq!("gemini".parse::<ModelKind>().unwrap(), ModelKind::Gemini);
        assert_eq!("GPT".parse::<ModelKind>().unwrap(), ModelKind::OpenAi);
        assert_eq!("anthropic".parse::<ModelKind>().unwrap(), ModelKind::Claude);
        assert!("llama".parse::<ModelKind>().is_err());
    }

    #[test]
    fn model_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ModelKind::OpenAi).unwrap(), r#""openai""#);
        assert_eq!(ModelKind::Claude.to_string(), "claude");
    }

    #[test]
    fn completion_request_builders() {
        let req = CompletionRequest::new("hi")
            .with_system("be brief")
            .with_temperature(0.1)
            .with_max_tokens(Some(256));
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(256));
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let provider = FixedProvider;
        let mut rx = provider.stream(CompletionRequest::new("ping")).await.unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.content.as_deref(), Some("echo: ping"));
        assert!(rx.recv().await.is_none());
    }
}
