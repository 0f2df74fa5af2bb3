//! Response composition: the final text for a turn.
//!
//! The composer is pure: the same intent and result always produce the same
//! text. Appending that text to the conversation is the caller's job.

use jarvis_core::identity::Persona;
use jarvis_core::intent::ResolvedIntent;
use jarvis_core::tool::{ToolErrorKind, ToolResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a tool's success payload into a sentence.
///
/// Returning `None` falls back to the generic rendering.
pub trait ResultTemplate: Send + Sync {
    fn render(&self, payload: &Value) -> Option<String>;
}

impl<F> ResultTemplate for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn render(&self, payload: &Value) -> Option<String> {
        self(payload)
    }
}

pub struct ResponseComposer {
    persona: Persona,
    acknowledge: bool,
    templates: HashMap<String, Arc<dyn ResultTemplate>>,
}

impl ResponseComposer {
    /// A composer with the built-in templates.
    pub fn new(persona: Persona) -> Self {
        let composer = Self {
            persona,
            acknowledge: true,
            templates: HashMap::new(),
        };
        composer.with_template("weather", weather_template)
    }

    /// Preface successful actions with an in-character acknowledgement.
    pub fn with_acknowledgements(mut self, enabled: bool) -> Self {
        self.acknowledge = enabled;
        self
    }

    /// Register (or replace) the template for `tool`.
    pub fn with_template(mut self, tool: &str, template: impl ResultTemplate + 'static) -> Self {
        self.templates.insert(tool.to_string(), Arc::new(template));
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Produce the final text for a turn.
    ///
    /// `result` is the invoker's outcome for a tool call and `None` for a
    /// direct reply.
    pub fn compose(&self, intent: &ResolvedIntent, result: Option<&ToolResult>) -> String {
        match (intent, result) {
            (ResolvedIntent::DirectReply { text, .. }, _) => {
                let text = text.trim();
                if text.is_empty() {
                    format!("I'm afraid I have nothing to add, {}.", self.persona.title)
                } else {
                    text.to_string()
                }
            }
            (ResolvedIntent::ToolCall { tool_name, .. }, Some(ToolResult::Success { payload })) => {
                let body = self
                    .templates
                    .get(tool_name)
                    .and_then(|t| t.render(payload))
                    .unwrap_or_else(|| render_payload(payload));
                match self.acknowledge.then(|| self.persona.acknowledgement(tool_name)).flatten() {
                    Some(ack) => format!("{ack} {body}"),
                    None => body,
                }
            }
            (ResolvedIntent::ToolCall { .. }, Some(ToolResult::Failure { kind, .. })) => {
                self.apology(*kind)
            }
            (ResolvedIntent::ToolCall { .. }, None) => format!(
                "My apologies, {}. I wasn't able to carry that out.",
                self.persona.title
            ),
        }
    }

    /// An apology naming what went wrong, without internal detail.
    pub fn apology(&self, kind: ToolErrorKind) -> String {
        format!(
            "My apologies, {}. I couldn't complete that — {}.",
            self.persona.title,
            kind.describe()
        )
    }
}

fn weather_template(payload: &Value) -> Option<String> {
    let city = payload.get("city")?.as_str()?;
    let temperature = payload.get("temperature")?.as_f64()?;
    let conditions = payload.get("conditions").and_then(Value::as_str).unwrap_or("unknown conditions");
    let mut text = format!("It's currently {temperature}°C in {city} with {conditions}");
    if let Some(wind) = payload.get("windspeed").and_then(Value::as_f64) {
        text.push_str(&format!(", and wind at {wind} km/h"));
    }
    text.push('.');
    Some(text)
}

/// Generic rendering for payloads without a template.
fn render_payload(payload: &Value) -> String {
    match payload {
        Value::Null => "Done.".to_string(),
        Value::String(s) if s.trim().is_empty() => "Done.".to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) if items.is_empty() => "I found nothing to report.".to_string(),
        Value::Array(items) => {
            let lines: Vec<String> = items.iter().map(|i| format!("- {}", inline(i))).collect();
            format!("Here is what I found:\n{}", lines.join("\n"))
        }
        Value::Object(map) if map.is_empty() => "Done.".to_string(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k.replace('_', " "), inline(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// A single-line rendering of a nested value.
fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", inline(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items.iter().map(inline).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
