//! Anthropic Claude provider (Messages API).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Streaming via SSE with `content_block_delta` events

use aegent_core::error::ProviderError;
use aegent_core::provider::*;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::http;
use crate::sse::{self, SseEvent};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Claude via the native Messages API.
pub struct ClaudeProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ClaudeProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        // max_tokens is mandatory for the Messages API
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn parse_response(response: MessagesResponse) -> Result<Completion, ProviderError> {
        let text: String = response
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "No text blocks in Claude response".into(),
            ));
        }

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(Completion {
            text,
            model: response.model,
            usage,
        })
    }

    fn parse_stream_event(data: &str) -> SseEvent {
        let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
            return SseEvent::Skip;
        };

        match event["type"].as_str().unwrap_or("") {
            "content_block_delta" if event["delta"]["type"] == "text_delta" => event["delta"]
                ["text"]
                .as_str()
                .map(|t| SseEvent::Delta(t.to_string()))
                .unwrap_or(SseEvent::Skip),
            "message_delta" => match event["usage"]["output_tokens"].as_u64() {
                Some(output) => {
                    let output = u32::try_from(output).unwrap_or(u32::MAX);
                    SseEvent::Usage(Usage {
                        prompt_tokens: 0,
                        completion_tokens: output,
                        total_tokens: output,
                    })
                }
                None => SseEvent::Skip,
            },
            "message_stop" => SseEvent::Done,
            _ => SseEvent::Skip,
        }
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&request, false);

        debug!(provider = "claude", model = %self.model, "Sending completion request");

        let response = self
            .request(&url)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("claude", response).await?;
        let api_response: MessagesResponse = http::read_json(response).await?;
        Self::parse_response(api_response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError>
    {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&request, true);

        debug!(provider = "claude", model = %self.model, "Sending streaming request");

        let response = self
            .request(&url)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("claude", response).await?;
        Ok(sse::spawn_reader(response, "claude".into(), Self::parse_stream_event))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(http::HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(http::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_with_base_url() {
        let provider = ClaudeProvider::new("sk-ant", "claude-3-5-sonnet-latest")
            .with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
        assert_eq!(provider.model(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn body_has_top_level_system_and_default_max_tokens() {
        let provider = ClaudeProvider::new("sk-ant", "claude-3-5-sonnet-latest");
        let request = CompletionRequest::new("rename layer 1").with_system("You script hosts");
        let body = provider.build_body(&request, false);

        assert_eq!(body["system"], "You script hosts");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"][0]["content"], "rename layer 1");
        assert!(body.get("stream").is_none());

        let streaming = provider.build_body(&request, true);
        assert_eq!(streaming["stream"], true);
    }

    #[test]
    fn parse_text_response() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                { "type": "text", "text": "Sure. " },
                { "type": "text", "text": "Done." }
            ],
            "usage": { "input_tokens": 20, "output_tokens": 5 }
        }))
        .unwrap();
        let completion = ClaudeProvider::parse_response(response).unwrap();
        assert_eq!(completion.text, "Sure. Done.");
        assert_eq!(completion.usage.unwrap().total_tokens, 25);
    }

    #[test]
    fn response_without_text_is_malformed() {
        let response: MessagesResponse =
            serde_json::from_value(serde_json::json!({ "model": "m", "content": [] })).unwrap();
        assert!(ClaudeProvider::parse_response(response).is_err());
    }

    #[test]
    fn stream_events() {
        assert_eq!(
            ClaudeProvider::parse_stream_event(
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#
            ),
            SseEvent::Delta("Hel".into())
        );
        assert_eq!(
            ClaudeProvider::parse_stream_event(r#"{"type":"message_stop"}"#),
            SseEvent::Done
        );
        assert_eq!(ClaudeProvider::parse_stream_event(r#"{"type":"ping"}"#), SseEvent::Skip);
        assert!(matches!(
            ClaudeProvider::parse_stream_event(
                r#"{"type":"message_delta","delta":{},"usage":{"output_tokens":7}}"#
            ),
            SseEvent::Usage(Usage { completion_tokens: 7, .. })
        ));
    }
}
