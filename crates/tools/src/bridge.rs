//! HTTP Action Executor for the host scripting bridge.
//!
//! The bridge runs next to the host application and exposes:
//! - `POST {url}/execute` with `{tool, parameters}` → `{success, message, data}`
//! - `GET {url}/health`
//!
//! Host-side failures come back as `success: false` and are passed through
//! untouched; only transport problems become `ToolError`s.

use aegent_core::error::ToolError;
use aegent_core::tool::{ActionExecutor, ActionOutcome, ToolCall, ToolCatalog};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct HttpActionExecutor {
    base_url: String,
    catalog: ToolCatalog,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpActionExecutor {
    pub fn new(base_url: impl Into<String>, catalog: ToolCatalog) -> Self {
        Self::with_timeout(base_url, catalog, Duration::from_secs(60))
    }

    pub fn with_timeout(base_url: impl Into<String>, catalog: ToolCatalog, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            catalog,
            client,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Quick reachability check against `/health`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Host bridge unreachable");
                false
            }
        }
    }

    fn map_send_error(&self, call: &ToolCall, e: reqwest::Error) -> ToolError {
        if e.is_timeout() {
            ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ToolError::BridgeUnavailable(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    tool: &'a str,
    parameters: &'a Map<String, Value>,
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    async fn execute(&self, call: &ToolCall) -> Result<ActionOutcome, ToolError> {
        let url = format!("{}/execute", self.base_url);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                tool: &call.name,
                parameters: &call.parameters,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(call, e))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ToolError::NotFound(call.name.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("bridge returned {}: {body}", status.as_u16()),
            });
        }

        let outcome: ActionOutcome = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: call.name.clone(),
            reason: format!("unreadable bridge response: {e}"),
        })?;

        info!(
            tool = %call.name,
            success = outcome.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Host action finished"
        );
        Ok(outcome)
    }
}
