//! Shared test helpers for the agent crate.

use async_trait::async_trait;
use jarvis_core::error::{ProviderError, ToolError};
use jarvis_core::message::{Message, MessageToolCall};
use jarvis_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use jarvis_core::schema::{ParamType, ParameterSchema};
use jarvis_core::tool::{Tool, ToolRegistry};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses
/// provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain text replies, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
    }

    /// A provider whose first call fails.
    pub fn failing() -> Self {
        Self::new(vec![Err(ProviderError::Network("connection refused".into()))])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        assert!(
            index < responses.len(),
            "ScriptedProvider: no more responses (call #{index}, have {})",
            responses.len()
        );
        requests.push(request);
        responses[index].clone()
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A response carrying a native tool call.
pub fn tool_call_response(name: &str, args: Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }];
    ProviderResponse {
        message,
        usage: None,
        model: "mock-model".into(),
    }
}

/// Stand-in for the web search tool: echoes its query back as a result line.
pub struct SearchStub;

#[async_trait]
impl Tool for SearchStub {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for current information"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("query", ParamType::String, "What to look up")
            .optional("num_results", ParamType::Integer, "How many results", Some(json!(5)))
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or_default();
        let n = arguments.get("num_results").and_then(Value::as_u64).unwrap_or(0);
        Ok(json!([format!("{query} ({n} results)")]))
    }
}

/// Sleeps far longer than any test timeout.
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Never finishes in time"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Panics when invoked"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        panic!("tool blew up");
    }
}

pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("city", ParamType::String, "Name of the city")
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let city = arguments.get("city").and_then(Value::as_str).unwrap_or_default();
        Err(ToolError::ExecutionFailed {
            tool_name: "weather".into(),
            reason: format!("City '{city}' not found."),
        })
    }
}

pub fn registry_with_search() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchStub)).unwrap();
    registry
}

pub fn registry_with(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    registry
}
