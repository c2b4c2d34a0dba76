//! OpenAI chat completions provider.
//!
//! Sends the system instruction and the assembled prompt as two chat
//! messages and reads back the first choice. Streaming uses SSE with a
//! `[DONE]` terminator and `stream_options.include_usage`.

use aegent_core::error::ProviderError;
use aegent_core::provider::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;
use crate::sse::{self, SseEvent};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI (and OpenAI-compatible) chat completions provider.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client(),
        }
    }

    /// Point at a compatible endpoint (proxies, local servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: "system".into(),
                content: system.clone(),
            });
        }
        messages.push(ApiMessage {
            role: "user".into(),
            content: request.prompt.clone(),
        });

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }

    fn parse_response(api_response: ApiResponse) -> Result<Completion, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let text = choice
            .message
            .content
            .ok_or_else(|| ProviderError::MalformedResponse("Choice has no content".into()))?;

        Ok(Completion {
            text,
            model: api_response.model,
            usage: api_response.usage.map(Usage::from),
        })
    }

    fn parse_stream_event(data: &str) -> SseEvent {
        if data == "[DONE]" {
            return SseEvent::Done;
        }
        let Ok(chunk) = serde_json::from_str::<StreamResponse>(data) else {
            return SseEvent::Skip;
        };
        if let Some(usage) = chunk.usage {
            return SseEvent::Usage(usage.into());
        }
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .map(SseEvent::Delta)
            .unwrap_or(SseEvent::Skip)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request, false);

        debug!(provider = "openai", model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("openai", response).await?;
        let api_response: ApiResponse = http::read_json(response).await?;
        Self::parse_response(api_response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError>
    {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request, true);

        debug!(provider = "openai", model = %self.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("openai", response).await?;
        Ok(sse::spawn_reader(response, "openai".into(), Self::parse_stream_event))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(http::HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(http::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_trims_base_url() {
        let provider = OpenAiProvider::new("sk-test", "gpt-4o").with_base_url("http://localhost:8000/v1/");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn body_has_system_then_user() {
        let provider = OpenAiProvider::new("sk-test", "gpt-4o");
        let request = CompletionRequest::new("make a comp")
            .with_system("You are an assistant")
            .with_max_tokens(Some(512));
        let body = provider.build_body(&request, false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "make a comp");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn body_without_system_has_one_message() {
        let provider = OpenAiProvider::new("sk-test", "gpt-4o");
        let body = provider.build_body(&CompletionRequest::new("hi"), true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn parse_text_response() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{ "message": { "role": "assistant", "content": "Hello" } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12 }
        }))
        .unwrap();
        let completion = OpenAiProvider::parse_response(api).unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.model, "gpt-4o-2024-08-06");
        assert_eq!(completion.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        let err = OpenAiProvider::parse_response(api).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn stream_events() {
        assert_eq!(OpenAiProvider::parse_stream_event("[DONE]"), SseEvent::Done);
        assert_eq!(
            OpenAiProvider::parse_stream_event(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseEvent::Delta("Hi".into())
        );
        assert_eq!(
            OpenAiProvider::parse_stream_event(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseEvent::Skip
        );
        assert!(matches!(
            OpenAiProvider::parse_stream_event(
                r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#
            ),
            SseEvent::Usage(Usage { total_tokens: 3, .. })
        ));
        assert_eq!(OpenAiProvider::parse_stream_event("not json"), SseEvent::Skip);
    }
}
