//! Conversation History
//!
//! The shared transcript both agents read from. Each completed turn appends
//! two entries: the prompt it answered (as `user`) and its reply (as
//! `assistant`). Entries are never edited or removed while a run is live;
//! only a new run or an explicit clear empties the history.
//!
//! The orchestrator runs one turn at a time, so the history always has a
//! single writer and needs no lock.

use serde::{Deserialize, Serialize};

/// Role of a message on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Per-agent system context
    System,
    /// The prompt an agent is answering
    User,
    /// An agent's reply
    Assistant,
}

/// One `{role, content}` pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it
    pub role: ChatRole,
    /// What was said
    pub content: String,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only transcript shared by both agents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed exchange: the prompt, then the reply
    pub fn append_exchange(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::User, prompt));
        self.messages.push(ChatMessage::new(ChatRole::Assistant, reply));
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Build the `messages` array for a request: system context, the history,
    /// then the new prompt
    #[must_use]
    pub fn request_messages(&self, system: &str, prompt: &str) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 2);
        out.push(ChatMessage::new(ChatRole::System, system));
        out.extend(self.messages.iter().cloned());
        out.push(ChatMessage::new(ChatRole::User, prompt));
        out
    }
}
