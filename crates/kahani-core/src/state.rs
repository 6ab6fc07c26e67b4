//! UI-agnostic conversation state types
//!
//! These data structures are shared between the terminal UI and the one-shot
//! CLI mode and don't depend on any specific UI framework.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest `max_length` the UI lets the user pick
pub const MIN_MAX_LENGTH: u32 = 10;
/// Largest `max_length` the UI lets the user pick
pub const MAX_MAX_LENGTH: u32 = 500;
/// Matches the backend's own default when the field is omitted
pub const DEFAULT_MAX_LENGTH: u32 = 200;
/// Increment used by the `+`/`-` keys
pub const MAX_LENGTH_STEP: u32 = 10;

/// Opaque identifier for a chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    /// An assistant message that was downgraded because generation failed
    Error,
}

/// A chat message in the story conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Empty assistant placeholder that tokens get appended to
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::Assistant,
            content: String::new(),
        }
    }

    /// Non-allocating stand-in used while a message is moved out for update
    fn vacant() -> Self {
        Self {
            id: MessageId(String::new()),
            role: ChatRole::Assistant,
            content: String::new(),
        }
    }
}

/// Insertion-ordered list of messages, mutated one entry at a time by id.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Replace the message matching `id` with `f(old)`. Every other message
    /// is left untouched. Returns false when no message has that id.
    pub fn update<F>(&mut self, id: &MessageId, f: F) -> bool
    where
        F: FnOnce(ChatMessage) -> ChatMessage,
    {
        match self.messages.iter().position(|m| &m.id == id) {
            Some(idx) => {
                let slot = &mut self.messages[idx];
                let old = std::mem::replace(slot, ChatMessage::vacant());
                *slot = f(old);
                true
            }
            None => false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Body of `POST /generate`, shared by the client and the backend contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prefix: String,
    pub max_length: u32,
}

impl GenerateRequest {
    pub fn new(prefix: impl Into<String>, max_length: u32) -> Self {
        Self {
            prefix: prefix.into(),
            max_length: clamp_max_length(max_length),
        }
    }
}

/// Clamp a requested length into the range the UI allows
pub fn clamp_max_length(value: u32) -> u32 {
    value.clamp(MIN_MAX_LENGTH, MAX_MAX_LENGTH)
}
