//! Agent progress events.
//!
//! The orchestrator publishes these on an optional channel so a front end
//! can render progress (streamed text, tool calls, results) while a turn
//! runs. Sending never blocks the loop: a full or closed channel drops the
//! event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::Phase;

/// Events emitted while a turn runs.
///
/// - `phase` - the orchestrator moved to a new phase
/// - `chunk` - partial text from a streaming completion
/// - `tool_call` - a tool is about to run
/// - `tool_result` - a tool finished
/// - `correction` - the response broke the calling convention and is being re-prompted
/// - `done` - the turn is over
/// - `error` - the turn ended on a provider failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Phase { phase: Phase },

    Chunk { content: String },

    ToolCall {
        /// 1-based position within the turn
        index: usize,
        name: String,
        parameters: Map<String, Value>,
    },

    ToolResult {
        index: usize,
        name: String,
        success: bool,
        message: String,
    },

    Correction { diagnostic: String },

    Done {
        status: String,
        iterations: usize,
        tool_calls: usize,
    },

    Error { message: String },
}

impl AgentEvent {
    /// Wire name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Phase { .. } => "phase",
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Correction { .. } => "correction",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_serializes_with_tag() {
        let mut parameters = Map::new();
        parameters.insert("name".into(), json!("Main"));
        let event = AgentEvent::ToolCall {
            index: 1,
            name: "create_composition".into(),
            parameters,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""parameters":{"name":"Main"}"#));
        assert_eq!(event.event_type(), "tool_call");
    }

    #[test]
    fn phase_event_roundtrip() {
        let event = AgentEvent::Phase {
            phase: Phase::ExecutingTools,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"phase","phase":"executing_tools"}"#);
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "phase");
    }

    #[test]
    fn event_types_are_distinct() {
        let events = [
            AgentEvent::Chunk { content: "x".into() },
            AgentEvent::Correction { diagnostic: "d".into() },
            AgentEvent::Done {
                status: "completed".into(),
                iterations: 1,
                tool_calls: 0,
            },
            AgentEvent::Error { message: "e".into() },
        ];
        let names: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(names, vec!["chunk", "correction", "done", "error"]);
    }
}
