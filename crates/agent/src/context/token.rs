//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Close enough
//! for BPE tokenizers on English text, and predictable in tests.

use jarvis_core::message::{ConversationTurn, Message};
use jarvis_core::provider::ToolDefinition;

/// Per-message overhead for role name, delimiters and formatting markers.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Estimate tokens for a history turn once sent as a message.
pub fn estimate_turn_tokens(turn: &ConversationTurn) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&turn.content)
}

/// Estimate tokens for a tool definition (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolDefinition) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}

/// Estimate tokens for a slice of tool definitions.
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools.iter().map(estimate_tool_tokens).sum()
}
