//! The resolved decision for one user turn.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to do with a user turn: call a tool, or answer directly.
///
/// Created fresh per turn by the intent resolver and consumed immediately by
/// the invoker or the composer. Downstream code switches on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedIntent {
    ToolCall {
        /// Call ID (from the model's native tool call, or generated)
        call_id: String,
        /// Name of a registered tool
        tool_name: String,
        /// Arguments validated against the tool's schema
        arguments: Map<String, Value>,
        /// Free text the model supplied alongside the call
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
    DirectReply {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
}

impl ResolvedIntent {
    /// A plain conversational reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::DirectReply {
            text: text.into(),
            rationale: None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }

    /// The tool this intent targets, if any.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool_name, .. } => Some(tool_name),
            Self::DirectReply { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_constructor() {
        let intent = ResolvedIntent::reply("Good evening, Sir.");
        assert!(!intent.is_tool_call());
        assert!(intent.tool_name().is_none());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let intent = ResolvedIntent::ToolCall {
            call_id: "call_1".into(),
            tool_name: "search_web".into(),
            arguments: Map::new(),
            rationale: None,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["kind"], "tool_call");
        assert_eq!(json["tool_name"], "search_web");
    }
}
