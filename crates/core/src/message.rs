//! Message and conversation domain types.
//!
//! `Message` is the wire-level unit exchanged with a language model.
//! `ConversationTurn` is what a session remembers: who spoke, what was said,
//! and when. A `ConversationHistory` is the bounded, append-only log of turns
//! owned by exactly one session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
    /// System instructions (persona, rules)
    System,
    /// Tool execution result (wire-level only, never stored in history)
    Tool,
}

/// A single message sent to or received from a language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// One remembered utterance within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::at(Role::User, content, Utc::now())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::at(Role::Assistant, content, Utc::now())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::at(Role::System, content, Utc::now())
    }

    /// Build a turn with an explicit timestamp.
    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Convert to a wire message for the language model.
    pub fn to_message(&self) -> Message {
        let mut msg = Message::with_role(self.role, self.content.clone());
        msg.timestamp = self.timestamp;
        msg
    }
}

/// Append-only, bounded log of turns for a single session.
///
/// Once `max_turns` is exceeded, the oldest turns are evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// The session this history belongs to
    pub id: ConversationId,

    turns: VecDeque<ConversationTurn>,

    max_turns: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `max_turns` turns.
    pub fn new(max_turns: usize) -> Self {
        Self {
            id: ConversationId::new(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Append a turn, evicting the oldest ones past the cap.
    ///
    /// Tool-role turns are wire-level artifacts and are not remembered.
    pub fn push(&mut self, turn: ConversationTurn) {
        if turn.role == Role::Tool {
            return;
        }
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Iterate over turns, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ConversationTurn> + ExactSizeIterator {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// The most recent turn, if any.
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(40)
    }
}
