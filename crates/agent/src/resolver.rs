//! Intent resolution: turns a prompt document into a `ResolvedIntent`.
//!
//! The model is asked for a structured decision: either a tool call or a
//! direct reply. Native function calls are accepted as well as the JSON
//! format described in the system instructions. Output that cannot be
//! parsed is retried once with a stricter instruction; a second failure
//! degrades to a direct reply carrying the raw model text.

use crate::context::PromptDocument;
use chrono::Utc;
use jarvis_core::error::ResolveError;
use jarvis_core::event::{DomainEvent, EventBus};
use jarvis_core::intent::ResolvedIntent;
use jarvis_core::message::Message;
use jarvis_core::provider::{Provider, ProviderRequest};
use jarvis_core::tool::ToolRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sent after an unparsable reply, before the single retry.
pub const REFORMAT_INSTRUCTION: &str = "Your previous answer could not be read. \
Respond again with ONLY one JSON object and no other text or code fences: \
either {\"tool\": \"<tool name>\", \"arguments\": {...}} or {\"reply\": \"<text>\"}.";

/// Maximum model calls per resolution: the first attempt plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// The model's decision before validation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decision {
    Tool {
        call_id: Option<String>,
        name: String,
        arguments: Map<String, Value>,
        text: Option<String>,
    },
    Reply(String),
}

pub struct IntentResolver {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    native_tools: bool,
    event_bus: Option<Arc<EventBus>>,
}

impl IntentResolver {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            model: model.into(),
            temperature: 0.8,
            max_tokens: None,
            native_tools: true,
            event_bus: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Also offer the catalogue through the provider's native function calling.
    pub fn with_native_tools(mut self, enabled: bool) -> Self {
        self.native_tools = enabled;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    fn request(&self, doc: &PromptDocument, messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: if self.native_tools {
                doc.tool_definitions.clone()
            } else {
                Vec::new()
            },
            json_mode: true,
        }
    }

    /// Resolve the decision for one turn.
    ///
    /// Returns `UnknownTool` or `InvalidArguments` when the model picks a
    /// tool that is not registered or supplies unusable arguments; the
    /// caller decides how to degrade.
    pub async fn resolve(&self, doc: &PromptDocument) -> Result<ResolvedIntent, ResolveError> {
        let mut messages = doc.to_messages();
        let mut attempt = 0;

        let outcome = loop {
            attempt += 1;
            let response = match self.provider.complete(self.request(doc, messages.clone())).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(conversation_id = %doc.conversation_id, attempt, error = %e, "Model call failed during resolution");
                    break Err(ResolveError::Provider(e));
                }
            };
            let raw = response.message.content.clone();

            match parse_decision(&response.message) {
                Ok(decision) => break self.validate(decision),
                Err(reason) if attempt < MAX_ATTEMPTS => {
                    debug!(conversation_id = %doc.conversation_id, attempt, %reason, "Malformed decision, retrying with stricter instruction");
                    push_rejected_reply(&mut messages, response.message, &reason);
                    messages.push(Message::user(REFORMAT_INSTRUCTION));
                }
                Err(reason) => {
                    let raw = raw.trim();
                    if raw.is_empty() {
                        break Err(ResolveError::MalformedOutput {
                            raw: String::new(),
                            reason,
                        });
                    }
                    warn!(conversation_id = %doc.conversation_id, %reason, "Decision still malformed after retry, replying with raw text");
                    break Ok(ResolvedIntent::DirectReply {
                        text: raw.to_string(),
                        rationale: Some(format!("degraded: {reason}")),
                    });
                }
            }
        };

        match &outcome {
            Ok(intent) => info!(
                conversation_id = %doc.conversation_id,
                tool = intent.tool_name().unwrap_or("-"),
                attempts = attempt,
                "Intent resolved"
            ),
            Err(e) => warn!(conversation_id = %doc.conversation_id, error = %e, "Intent resolution failed"),
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::IntentResolved {
                conversation_id: doc.conversation_id.to_string(),
                tool: outcome
                    .as_ref()
                    .ok()
                    .and_then(|i| i.tool_name())
                    .map(String::from),
                attempts: attempt,
                timestamp: Utc::now(),
            });
        }

        outcome
    }

    /// Check a decision against the registry and the tool's schema.
    fn validate(&self, decision: Decision) -> Result<ResolvedIntent, ResolveError> {
        match decision {
            Decision::Reply(text) => Ok(ResolvedIntent::reply(text)),
            Decision::Tool {
                call_id,
                name,
                arguments,
                text,
            } => {
                let descriptor = self.registry.lookup(&name).map_err(|_| ResolveError::UnknownTool {
                    name: name.clone(),
                    fallback_text: text.clone(),
                })?;

                let arguments = descriptor.schema.validate(&name, &arguments).map_err(|e| match e {
                    jarvis_core::ToolError::InvalidArguments { tool, field, reason } => {
                        ResolveError::InvalidArguments {
                            tool,
                            field,
                            reason,
                            fallback_text: text.clone(),
                        }
                    }
                    other => ResolveError::InvalidArguments {
                        tool: name.clone(),
                        field: String::new(),
                        reason: other.to_string(),
                        fallback_text: text.clone(),
                    },
                })?;

                Ok(ResolvedIntent::ToolCall {
                    call_id: call_id.unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    tool_name: name,
                    arguments,
                    rationale: text,
                })
            }
        }
    }
}

/// Parse the model's reply into a decision, or explain why it can't be.
pub(crate) fn parse_decision(message: &Message) -> Result<Decision, String> {
    let text = message.content.trim();
    let text = (!text.is_empty()).then(|| text.to_string());

    if let Some(call) = message.tool_calls.first() {
        if call.name.trim().is_empty() {
            return Err("native tool call without a name".into());
        }
        let arguments = parse_arguments(&Value::String(call.arguments.clone()))
            .ok_or_else(|| format!("arguments for '{}' are not a JSON object", call.name))?;
        return Ok(Decision::Tool {
            call_id: Some(call.id.clone()).filter(|id| !id.is_empty()),
            name: call.name.clone(),
            arguments,
            text,
        });
    }

    let Some(body) = text else {
        return Err("empty reply".into());
    };
    let object = extract_json_object(&body).ok_or_else(|| "reply is not a JSON object".to_string())?;

    let free_text = ["text", "reply"]
        .iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    // A named tool wins over any accompanying text.
    if let Some(name) = object.get("tool").and_then(Value::as_str).map(str::trim) {
        if !name.is_empty() {
            let arguments = match object.get("arguments") {
                None | Some(Value::Null) => Map::new(),
                Some(v) => parse_arguments(v)
                    .ok_or_else(|| format!("arguments for '{name}' are not a JSON object"))?,
            };
            return Ok(Decision::Tool {
                call_id: None,
                name: name.to_string(),
                arguments,
                text: free_text,
            });
        }
    }

    free_text
        .map(Decision::Reply)
        .ok_or_else(|| "JSON object has neither 'tool' nor 'reply'".into())
}

/// Append a rejected model reply so the retry sees what it said.
///
/// Every native tool call must be answered by a tool message before the
/// conversation continues, so each one gets the rejection reason.
fn push_rejected_reply(messages: &mut Vec<Message>, mut reply: Message, reason: &str) {
    for (i, call) in reply.tool_calls.iter_mut().enumerate() {
        if call.id.is_empty() {
            call.id = format!("call_rejected_{i}");
        }
    }
    let results: Vec<Message> = reply
        .tool_calls
        .iter()
        .map(|call| Message::tool_result(call.id.clone(), format!("error: {reason}")))
        .collect();
    messages.push(reply);
    messages.extend(results);
}

/// Arguments may arrive as an object or as a string holding one.
fn parse_arguments(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) if s.trim().is_empty() => Some(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Find the JSON object in a reply, tolerating code fences and stray prose.
fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let stripped = strip_code_fence(text);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(stripped) {
        return Some(map);
    }
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&stripped[start..=end]).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
