//! Session and run state.
//!
//! A [`Session`] is one interactive chat: conversation history plus the
//! per-request memory and control state the orchestrator mutates. The
//! [`StopSignal`] is the only piece another task may touch while a run is
//! in flight.

use aegent_core::message::{ConversationHistory, DEFAULT_HISTORY_LIMIT, Message};
use aegent_core::provider::ModelKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::memory::{DedupPolicy, DocStore, SessionToolResults};

/// Shared cancellation flag for a running turn.
///
/// Clones share the flag. Setting it takes effect at the orchestrator's
/// next checkpoint, not immediately.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Where the orchestrator is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Planning,
    AwaitingCompletion,
    ExecutingTools,
    Continuing,
    Stopped,
    Completed,
}

/// Mutable control state for one user request.
#[derive(Debug, Clone)]
pub struct AgentRunState {
    pub iteration_count: usize,
    pub tool_call_count: usize,
    pub is_processing: bool,
    pub phase: Phase,
    stop: StopSignal,
}

impl Default for AgentRunState {
    fn default() -> Self {
        Self {
            iteration_count: 0,
            tool_call_count: 0,
            is_processing: false,
            phase: Phase::Idle,
            stop: StopSignal::new(),
        }
    }
}

impl AgentRunState {
    /// Zero the counters and clear the stop flag. The flag itself is kept so
    /// handles given out earlier stay connected.
    pub fn reset(&mut self) {
        self.iteration_count = 0;
        self.tool_call_count = 0;
        self.is_processing = false;
        self.phase = Phase::Idle;
        self.stop.reset();
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

/// One interactive chat session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub model: ModelKind,
    pub history: ConversationHistory,
    pub results: SessionToolResults,
    pub docs: DocStore,
    pub state: AgentRunState,
}

impl Session {
    pub fn new(model: ModelKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            model,
            history: ConversationHistory::new(DEFAULT_HISTORY_LIMIT),
            results: SessionToolResults::new(),
            docs: DocStore::default(),
            state: AgentRunState::default(),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history = ConversationHistory::new(limit);
        self
    }

    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.docs = DocStore::new(policy);
        self
    }

    /// Start a new user request: reset run state, clear per-request memory,
    /// and record the user's message.
    pub fn begin_turn(&mut self, user_message: &str) {
        self.state.reset();
        self.state.is_processing = true;
        self.results.begin_turn();
        self.docs.clear();
        self.history.push(Message::user(user_message));
    }

    /// Handle for cancelling the current (or next) run from another task.
    pub fn stop_signal(&self) -> StopSignal {
        self.state.stop_signal()
    }

    /// Forget the conversation (the `/clear` command).
    pub fn clear(&mut self) {
        self.history.clear();
        self.results.begin_turn();
        self.docs.clear();
        self.state.reset();
    }
}
