//! End-to-end integration tests for the Jarvis engine.
//!
//! These tests drive whole turns through the public API (assembler,
//! resolver, invoker, composer, sessions and memory) with a scripted
//! language model and local stand-in tools.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jarvis_agent::{Assistant, PromptAssembler, ResponseComposer, Session, SessionHandle, TokenBudget};
use jarvis_config::AppConfig;
use jarvis_core::error::{ProviderError, ToolError};
use jarvis_core::identity::Persona;
use jarvis_core::intent::ResolvedIntent;
use jarvis_core::memory::MemoryBackend;
use jarvis_core::message::{ConversationHistory, ConversationTurn, Message};
use jarvis_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use jarvis_core::schema::{ParamType, ParameterSchema};
use jarvis_core::tool::{Tool, ToolErrorKind, ToolRegistry, ToolResult};
use serde_json::{Map, Value, json};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        if index >= responses.len() {
            panic!("ScriptedProvider exhausted: call #{index}, have {}", responses.len());
        }
        requests.push(request);
        responses[index].clone()
    }
}

fn text_response(text: &str) -> ProviderResponse {
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

// ── Stand-in tools ───────────────────────────────────────────────────────

/// Search tool returning a fixed answer and recording what it was asked.
struct FixedSearch {
    answer: Value,
    seen: Mutex<Vec<Map<String, Value>>>,
}

impl FixedSearch {
    fn new(answer: Value) -> Self {
        Self {
            answer,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FixedSearch {
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
        self.seen.lock().unwrap().push(arguments);
        Ok(self.answer.clone())
    }
}

struct SleepyTool;

#[async_trait::async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "volume"
    }

    fn description(&self) -> &str {
        "Set the system volume"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("level", ParamType::Integer, "Volume from 0 to 100")
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(json!({"volume": 0}))
    }
}

struct BrokenTool;

#[async_trait::async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "brightness"
    }

    fn description(&self) -> &str {
        "Set the display brightness"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("level", ParamType::Integer, "Brightness from 0 to 100")
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        panic!("display driver vanished");
    }
}

fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

fn assistant(provider: Arc<ScriptedProvider>, tools: Vec<Arc<dyn Tool>>) -> Assistant {
    Assistant::new(provider, registry(tools), Persona::default(), "mock-model")
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_turn_is_narrated() {
    let search = Arc::new(FixedSearch::new(json!("Python 3.13, released October 2025")));
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"tool": "search_web", "arguments": {"query": "latest Python release"}}"#,
        "The latest stable Python version is 3.13, released in October 2025.",
    ]));
    let jarvis = assistant(provider.clone(), vec![search.clone()]).with_narration(true);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Search for the latest Python release").await;

    assert_eq!(reply, "The latest stable Python version is 3.13, released in October 2025.");
    let seen = search.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["query"], "latest Python release");
    assert_eq!(seen[0]["num_results"], 5);

    // The narration request carries the tool payload back to the model.
    let narration = provider.request(1);
    assert!(narration.messages.iter().any(|m| m.content == "Python 3.13, released October 2025"));
}

#[tokio::test]
async fn e2e_search_turn_without_narration_uses_payload() {
    let search = Arc::new(FixedSearch::new(json!("Python 3.13, released October 2025")));
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"```json
{"tool": "search_web", "arguments": {"query": "latest Python release"}, "text": "Let me look that up."}
```"#,
    ]));
    let jarvis = assistant(provider.clone(), vec![search]).with_acknowledgements(false);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Search for the latest Python release").await;
    assert_eq!(reply, "Python 3.13, released October 2025");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_hello_jarvis_gets_persona_reply() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"reply": "Good evening, Sir. How may I assist you today?"}"#,
    ]));
    let jarvis = assistant(provider.clone(), vec![Arc::new(FixedSearch::new(json!("unused")))]);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Hello Jarvis").await;
    assert_eq!(reply, "Good evening, Sir. How may I assist you today?");

    // Persona instructions and the catalogue reach the model.
    let request = provider.request(0);
    assert!(request.messages[0].content.contains("butler"));
    assert!(request.messages[0].content.contains("- search_web:"));
    assert_eq!(request.messages.last().unwrap().content, "Hello Jarvis");
}

#[tokio::test]
async fn e2e_unknown_tool_degrades_to_free_text() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"tool": "set_alarm", "arguments": {"time": "07:00"}, "text": "I'm afraid alarms are beyond me for now, Sir."}"#,
    ]));
    let jarvis = assistant(provider, vec![Arc::new(FixedSearch::new(json!("unused")))]);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Set an alarm for seven").await;
    assert_eq!(reply, "I'm afraid alarms are beyond me for now, Sir.");
    assert_eq!(session.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn e2e_tool_timeout_yields_apology() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"tool": "volume", "arguments": {"level": "40"}}"#,
    ]));
    let jarvis = assistant(provider, vec![Arc::new(SleepyTool)])
        .with_tool_timeout(Duration::from_millis(250))
        .with_narration(true);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Volume to forty").await;
    assert_eq!(reply, "My apologies, Sir. I couldn't complete that — the action timed out.");
}

#[tokio::test]
async fn e2e_tool_panic_is_contained_and_session_continues() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"tool": "brightness", "arguments": {"level": 70}}"#,
        r#"{"reply": "Still here, Sir."}"#,
    ]));
    let jarvis = assistant(provider, vec![Arc::new(BrokenTool)]);
    let mut session = jarvis.open_session().await;

    let first = jarvis.respond(&mut session, "Brightness to seventy").await;
    assert!(first.contains(ToolErrorKind::ExecutionFailed.describe()));
    assert!(!first.contains("display driver"));

    let second = jarvis.respond(&mut session, "Are you alright?").await;
    assert_eq!(second, "Still here, Sir.");
}

#[tokio::test]
async fn e2e_malformed_output_retried_then_degraded() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        "Certainly! I'd be delighted",
        "Certainly, Sir. The kettle is on.",
    ]));
    let jarvis = assistant(provider.clone(), vec![Arc::new(FixedSearch::new(json!("unused")))]);
    let mut session = jarvis.open_session().await;

    let reply = jarvis.respond(&mut session, "Put the kettle on").await;
    assert_eq!(reply, "Certainly, Sir. The kettle is on.");
    assert_eq!(provider.calls(), 2);
    assert!(provider.request(1).messages.len() > provider.request(0).messages.len());
}

#[tokio::test]
async fn e2e_provider_outage_still_answers() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
        retry_after_secs: 30,
    })]));
    let jarvis = assistant(provider, vec![]);
    let mut session = jarvis.open_session().await;
    let reply = jarvis.respond(&mut session, "Hello").await;
    assert!(reply.starts_with("My apologies, Sir."));
}

#[test]
fn e2e_history_truncation_keeps_new_input() {
    let mut history = ConversationHistory::new(200);
    for i in 0..120 {
        history.push(ConversationTurn::user(format!("message {i}: {}", "lorem ipsum ".repeat(10))));
    }
    let registry = registry(vec![Arc::new(FixedSearch::new(json!("unused")))]);
    let assembler = PromptAssembler::new(Persona::default(), TokenBudget::total(1500));

    let doc = assembler.assemble(&history, &registry, "What did I say last?");

    assert!(!doc.metadata.over_budget);
    assert!(doc.metadata.total_tokens <= 1500);
    assert_eq!(doc.new_input(), "What did I say last?");
    assert!(doc.metadata.drops.iter().any(|d| d.layer == "conversation_history"));

    // Oldest dropped first: the kept turns are the newest ones.
    let kept: Vec<&str> = doc.messages[..doc.messages.len() - 1]
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert!(!kept.is_empty());
    assert!(kept.last().unwrap().starts_with("message 119:"));
    assert!(!kept.iter().any(|c| c.starts_with("message 0:")));
    assert_eq!(history.len(), 120);
}

#[test]
fn e2e_compose_is_idempotent() {
    let composer = ResponseComposer::new(Persona::default());
    let intent = ResolvedIntent::ToolCall {
        call_id: "call_1".into(),
        tool_name: "weather".into(),
        arguments: Map::new(),
        rationale: None,
    };
    let result = ToolResult::success(json!({
        "city": "London", "temperature": 12.5, "windspeed": 9.0,
        "winddirection": 200.0, "weathercode": 61, "conditions": "rain"
    }));
    let first = composer.compose(&intent, Some(&result));
    let second = composer.compose(&intent, Some(&result));
    assert_eq!(first, second);
    assert!(first.contains("12.5°C in London with rain"));
}

#[test]
fn e2e_duplicate_registration_leaves_registry_unchanged() {
    let mut registry = jarvis_tools::default_registry(&AppConfig::default().tools).unwrap();
    let before = registry.names().join(",");

    let err = registry
        .register(Arc::new(FixedSearch::new(json!("dupe"))))
        .unwrap_err();
    assert_eq!(err, ToolError::DuplicateTool("search_web".into()));
    assert_eq!(registry.names().join(","), before);
    assert_eq!(registry.lookup("search_web").unwrap().name, "search_web");
}

#[tokio::test]
async fn e2e_memories_carry_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.memory.enabled = true;
    config.memory.path = Some(dir.path().join("memories.jsonl").display().to_string());

    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"reply": "Noted, Sir. Celsius it is."}"#,
        r#"{"reply": "Celsius, as you prefer."}"#,
    ]));
    let jarvis = Assistant::from_config(&config, provider.clone(), ToolRegistry::new());

    let mut first = jarvis.open_session().await;
    jarvis.respond(&mut first, "I prefer Celsius").await;
    assert_eq!(jarvis.close_session(first).await, 1);

    let mut second = jarvis.open_session().await;
    assert_eq!(second.memories().len(), 1);
    jarvis.respond(&mut second, "Which units do I like?").await;
    let system = &provider.request(1).messages[0].content;
    assert!(system.contains("User asked: I prefer Celsius | Assistant answered: Noted, Sir. Celsius it is."));

    let memory = jarvis.memory().unwrap();
    assert_eq!(memory.count().await.unwrap(), 1);
}

#[tokio::test]
async fn e2e_sessions_serialize_turns_through_one_queue() {
    let provider = Arc::new(ScriptedProvider::texts(&[
        r#"{"reply": "one"}"#,
        r#"{"reply": "two"}"#,
        r#"{"reply": "three"}"#,
    ]));
    let jarvis = Arc::new(assistant(provider, vec![]));
    let handle = SessionHandle::spawn(jarvis, Session::new(10), 4);

    // Two channels (say console and voice) feeding the same session.
    let console = handle.clone();
    let voice = handle.clone();
    let a = tokio::spawn(async move { console.send("first").await.unwrap() });
    let b = tokio::spawn(async move { voice.send("second").await.unwrap() });
    let mut replies = vec![a.await.unwrap(), b.await.unwrap()];
    replies.push(handle.send("third").await.unwrap());
    replies.sort();
    assert_eq!(replies, vec!["one", "three", "two"]);

    assert_eq!(handle.close().await.unwrap(), 0);
}
