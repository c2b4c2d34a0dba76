//! Dry-run executor: records every call and reports success without
//! touching a host. Used by `aegent chat --dry-run`.

use aegent_core::error::ToolError;
use aegent_core::tool::{ActionExecutor, ActionOutcome, ToolCall, ToolCatalog};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct DryRunExecutor {
    catalog: ToolCatalog,
    calls: Mutex<Vec<ToolCall>>,
}

impl DryRunExecutor {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self {
            catalog,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    async fn execute(&self, call: &ToolCall) -> Result<ActionOutcome, ToolError> {
        self.calls.lock().await.push(call.clone());

        if !self.catalog.is_empty() && self.catalog.get(&call.name).is_none() {
            return Ok(ActionOutcome::failed(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.catalog.names().join(", ")
            )));
        }

        let params = serde_json::to_string(&call.parameters).unwrap_or_default();
        Ok(ActionOutcome::ok(format!("[dry run] {} {params}", call.name)))
    }
}
