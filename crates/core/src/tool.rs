//! Tool types and the Action Executor trait.
//!
//! A tool call is a structured instruction extracted from model text. The
//! core never validates parameter names itself: that is the executor's job,
//! and its failure message is fed back to the model for self-correction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::ToolError;

/// A request to execute a tool, as parsed from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub name: String,

    /// Parameters as a JSON object
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Look up a string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// What the host bridge reports back for one executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The recorded result of one tool call. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,

    pub parameters: Map<String, Value>,

    pub success: bool,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    /// Build a result from the call that produced it and the executor's outcome.
    pub fn from_outcome(call: &ToolCall, outcome: ActionOutcome) -> Self {
        Self {
            name: call.name.clone(),
            parameters: call.parameters.clone(),
            success: outcome.success,
            message: outcome.message,
            data: outcome.data,
        }
    }

    /// Build a failed result for a call the executor could not run.
    pub fn failure(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            name: call.name.clone(),
            parameters: call.parameters.clone(),
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// A tool description sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(default = "empty_schema")]
    pub parameters: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// One-line signature: `name(required, optional?)`.
    pub fn signature(&self) -> String {
        let required: Vec<&str> = self.parameters["required"]
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params: Vec<String> = self.parameters["properties"]
            .as_object()
            .map(|props| {
                props
                    .keys()
                    .map(|k| {
                        if required.contains(&k.as_str()) {
                            k.clone()
                        } else {
                            format!("{k}?")
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        format!("{}({})", self.name, params.join(", "))
    }
}

/// The ordered catalog of capabilities offered to the model.
///
/// Names are unique; registering a spec with an existing name replaces it
/// in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.register(spec);
        }
        catalog
    }

    pub fn register(&mut self, spec: ToolSpec) {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_spec(mut self, spec: ToolSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Render the catalog as a bullet list for prompt construction.
    pub fn render(&self) -> String {
        self.specs
            .iter()
            .map(|s| format!("- {}: {}", s.signature(), s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The host scripting bridge.
///
/// Given a tool name and parameter object, performs a host-side action and
/// returns a structured outcome. The executor also supplies the catalog of
/// tools it understands.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// The capabilities this executor offers.
    fn catalog(&self) -> &ToolCatalog;

    /// Execute one call. `Ok` with `success: false` is a normal host-side
    /// failure; `Err` means the bridge itself could not run the call.
    async fn execute(&self, call: &ToolCall) -> std::result::Result<ActionOutcome, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape_spec() -> ToolSpec {
        ToolSpec::new(
            "create_shape_layer",
            "Create a shape layer in the active composition",
            json!({
                "type": "object",
                "properties": {
                    "shape": { "type": "string" },
                    "fillColor": { "type": "array" }
                },
                "required": ["shape"]
            }),
        )
    }

    #[test]
    fn signature_marks_optional_parameters() {
        let sig = shape_spec().signature();
        assert!(sig.starts_with("create_shape_layer("));
        assert!(sig.contains("shape"));
        assert!(sig.contains("fillColor?"));
    }

    #[test]
    fn catalog_register_replaces_in_place() {
        let mut catalog = ToolCatalog::new()
            .with_spec(shape_spec())
            .with_spec(ToolSpec::new("create_composition", "Create a comp", json!({})));
        catalog.register(ToolSpec::new("create_shape_layer", "updated", json!({})));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["create_shape_layer", "create_composition"]);
        assert_eq!(catalog.get("create_shape_layer").unwrap().description, "updated");
    }

    #[test]
    fn catalog_render_lists_every_tool() {
        let catalog = ToolCatalog::from_specs(vec![
            shape_spec(),
            ToolSpec::new("create_composition", "Create a comp", empty_schema()),
        ]);
        let rendered = catalog.render();
        // serde_json maps are key-sorted
        assert!(rendered.contains("- create_shape_layer(fillColor?, shape)"));
        assert!(rendered.contains("- create_composition(): Create a comp"));
    }

    #[test]
    fn catalog_deserializes_from_array() {
        let catalog: ToolCatalog = serde_json::from_value(json!([
            { "name": "a", "description": "first" },
            { "name": "b", "description": "second", "parameters": { "type": "object" } }
        ]))
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("a").unwrap().parameters["type"], "object");
    }

    #[test]
    fn tool_result_from_outcome_keeps_call_details() {
        let mut params = Map::new();
        params.insert("shape".into(), json!("rectangle"));
        let call = ToolCall::new("create_shape_layer", params);

        let result = ToolResult::from_outcome(&call, ActionOutcome::ok("Created").with_data(json!({"index": 1})));
        assert!(result.success);
        assert_eq!(result.name, "create_shape_layer");
        assert_eq!(result.parameters["shape"], "rectangle");
        assert_eq!(result.data.unwrap()["index"], 1);

        let failed = ToolResult::failure(&call, "no active composition");
        assert!(!failed.success);
        assert_eq!(failed.message, "no active composition");
    }
}
