//! Message and conversation history types.
//!
//! The history is a bounded FIFO: once full, the oldest message is evicted
//! to make room for the newest one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of messages retained in a conversation history.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System notices (status lines, cancellations)
    System,
}

impl Role {
    fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Ordered, bounded conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: VecDeque<Message>,
    max_len: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `max_len` messages.
    pub fn new(max_len: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_len.min(64)),
            max_len: max_len.max(1),
        }
    }

    /// Append a message, evicting the oldest entries if the bound is exceeded.
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_len {
            self.messages.pop_front();
        }
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Message> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Render the last `n` messages as `Role: content` lines for a prompt.
    pub fn render(&self, n: usize) -> String {
        self.recent(n)
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = ConversationHistory::new(3);
        for i in 0..5 {
            history.push(Message::user(format!("msg {i}")));
        }
        assert_eq!(history.len(), 3);
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut history = ConversationHistory::new(10);
        history.push(Message::user("a"));
        history.push(Message::assistant("b"));
        history.push(Message::user("c"));

        let tail: Vec<_> = history.recent(2).map(|m| m.content.clone()).collect();
        assert_eq!(tail, vec!["b", "c"]);

        // Asking for more than we have returns everything
        assert_eq!(history.recent(50).count(), 3);
    }

    #[test]
    fn render_labels_roles() {
        let mut history = ConversationHistory::default();
        history.push(Message::user("make a comp"));
        history.push(Message::assistant("done"));
        let rendered = history.render(10);
        assert_eq!(rendered, "User: make a comp\nAssistant: done");
    }

    #[test]
    fn zero_bound_is_clamped_to_one() {
        let mut history = ConversationHistory::new(0);
        history.push(Message::user("first"));
        history.push(Message::user("second"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.iter().next().unwrap().content, "second");
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "Test message");
    }
}
