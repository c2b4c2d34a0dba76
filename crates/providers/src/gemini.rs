//! Google Gemini provider (Generative Language API).
//!
//! - `x-goog-api-key` header authentication
//! - System prompt as `systemInstruction`
//! - Streaming via `:streamGenerateContent?alt=sse`, one full response
//!   object per SSE frame

use aegent_core::error::ProviderError;
use aegent_core::provider::*;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::http;
use crate::sse::{self, SseEvent};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut generation_config = serde_json::json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation_config,
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }
        body
    }

    /// Concatenate the text parts of the first candidate.
    fn candidate_text(response: &GenerateResponse) -> Option<String> {
        let candidate = response.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }

    fn parse_response(&self, response: GenerateResponse) -> Result<Completion, ProviderError> {
        if let Some(feedback) = &response.prompt_feedback
            && let Some(reason) = &feedback.block_reason
        {
            return Err(ProviderError::MalformedResponse(format!(
                "Prompt blocked: {reason}"
            )));
        }

        let text = Self::candidate_text(&response)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::MalformedResponse("No text in Gemini response".into()))?;

        Ok(Completion {
            text,
            model: response.model_version.clone().unwrap_or_else(|| self.model.clone()),
            usage: response.usage_metadata.map(Usage::from),
        })
    }

    fn parse_stream_event(data: &str) -> SseEvent {
        let Ok(response) = serde_json::from_str::<GenerateResponse>(data) else {
            return SseEvent::Skip;
        };
        match Self::candidate_text(&response).filter(|t| !t.is_empty()) {
            Some(text) => SseEvent::Delta(text),
            None => match response.usage_metadata {
                Some(usage) => SseEvent::Usage(usage.into()),
                None => SseEvent::Skip,
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let url = self.endpoint("generateContent");
        let body = Self::build_body(&request);

        debug!(provider = "gemini", model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("gemini", response).await?;
        let api_response: GenerateResponse = http::read_json(response).await?;
        self.parse_response(api_response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError>
    {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let body = Self::build_body(&request);

        debug!(provider = "gemini", model = %self.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status("gemini", response).await?;
        Ok(sse::spawn_reader(response, "gemini".into(), Self::parse_stream_event))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/v1beta/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(http::HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(http::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }
    }
}
