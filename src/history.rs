//! Conversation history storage
//!
//! Ordered, append-only message log for one session. Seeded with the system
//! prompt when the session starts.

use crate::models::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    /// Approximate token count for context window management
    pub token_count: usize,
}

impl ConversationMessage {
    pub fn new(role: Role, content: String) -> Self {
        let token_count = (content.len() + 3) / 4;

        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Conversation history for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: Vec<ConversationMessage>,
    total_tokens: usize,
}

impl ConversationHistory {
    /// Create a history seeded with one system message
    pub fn new(system_prompt: &str) -> Self {
        let mut history = Self {
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: Vec::new(),
            total_tokens: 0,
        };
        history.push(Role::System, system_prompt.to_string());
        history
    }

    /// Append a message
    pub fn push(&mut self, role: Role, content: String) {
        let message = ConversationMessage::new(role, content);
        self.total_tokens += message.token_count;
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Append a completed user/assistant exchange
    pub fn push_exchange(&mut self, prompt: &str, reply: &str) {
        self.push(Role::User, prompt.to_string());
        self.push(Role::Assistant, reply.to_string());
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Snapshot of the whole history in wire form
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().map(ConversationMessage::to_message).collect()
    }
}

/// Model context: leading system messages plus the `recent` most recent
/// other messages, in original order.
pub fn context_window(history: &[Message], recent: usize) -> Vec<Message> {
    let (system, rest): (Vec<&Message>, Vec<&Message>) =
        history.iter().partition(|m| m.role == Role::System);

    let skip = rest.len().saturating_sub(recent);

    system
        .into_iter()
        .chain(rest.into_iter().skip(skip))
        .cloned()
        .collect()
}
