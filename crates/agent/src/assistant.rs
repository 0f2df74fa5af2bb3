//! The turn pipeline: assemble, resolve, invoke, compose.
//!
//! `Assistant` is shared read-only across sessions; all per-conversation
//! state lives in the [`Session`] passed to each call.

use crate::composer::ResponseComposer;
use crate::context::{AssemblyInput, PromptAssembler, PromptDocument, TokenBudget};
use crate::invoker::ToolInvoker;
use crate::resolver::{Decision, IntentResolver, parse_decision};
use crate::session::Session;
use chrono::Utc;
use jarvis_config::AppConfig;
use jarvis_core::error::ResolveError;
use jarvis_core::event::{DomainEvent, EventBus};
use jarvis_core::identity::{Persona, PersonaSource};
use jarvis_core::intent::ResolvedIntent;
use jarvis_core::memory::{MemoryBackend, MemoryEntry};
use jarvis_core::message::{Message, MessageToolCall};
use jarvis_core::provider::{Provider, ProviderRequest};
use jarvis_core::tool::{ToolErrorKind, ToolRegistry, ToolResult};
use jarvis_memory::FileBackend;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Asks the model to phrase a tool result for the user.
pub const NARRATION_INSTRUCTION: &str = "Using the tool result above, answer the user's \
request in one or two sentences, in your own voice. Reply with plain text, not JSON.";

const PREVIEW_CHARS: usize = 80;

pub struct Assistant {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    assembler: PromptAssembler,
    resolver: IntentResolver,
    invoker: ToolInvoker,
    composer: ResponseComposer,
    memory: Option<Arc<dyn MemoryBackend>>,
    event_bus: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tool_timeout: Duration,
    narrate: bool,
    recall_limit: usize,
    max_history_turns: usize,
}

impl Assistant {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        persona: Persona,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let event_bus = Arc::new(EventBus::default());
        let tool_timeout = Duration::from_secs(15);
        Self {
            resolver: IntentResolver::new(provider.clone(), registry.clone(), model.clone())
                .with_event_bus(event_bus.clone()),
            invoker: ToolInvoker::new(registry.clone(), tool_timeout).with_event_bus(event_bus.clone()),
            assembler: PromptAssembler::with_default_budget(persona.clone()),
            composer: ResponseComposer::new(persona),
            provider,
            registry,
            memory: None,
            event_bus,
            model,
            temperature: 0.8,
            max_tokens: None,
            tool_timeout,
            narrate: false,
            recall_limit: 10,
            max_history_turns: 40,
        }
    }

    /// Build an assistant from configuration, with the given model backend
    /// and tool registry.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        let source = PersonaSource {
            system_prompt_override: config.persona.system_prompt_override.clone(),
            prompt_file: config.persona.prompt_file.as_ref().map(PathBuf::from),
        };
        let persona = Persona::load(&config.persona.name, &config.persona.title, &source);

        let mut assistant = Self::new(provider, Arc::new(registry), persona, config.default_model.clone())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_budget(TokenBudget::total(config.context.token_budget))
            .with_tool_timeout(Duration::from_secs(config.tools.timeout_secs))
            .with_narration(config.tools.narrate_results)
            .with_acknowledgements(config.persona.acknowledge_actions)
            .with_max_history_turns(config.context.max_history_turns)
            .with_recall_limit(config.memory.recall_limit);

        if config.memory.enabled {
            let path = config.memory.resolved_path();
            debug!(path = %path.display(), "Using file-backed memory");
            assistant = assistant.with_memory(Arc::new(FileBackend::new(path)));
        }
        assistant
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self.rebuild();
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self.rebuild();
        self
    }

    pub fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.assembler = PromptAssembler::new(self.assembler.persona().clone(), budget);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self.rebuild();
        self
    }

    /// Phrase successful tool results through the model instead of templates.
    pub fn with_narration(mut self, enabled: bool) -> Self {
        self.narrate = enabled;
        self
    }

    pub fn with_acknowledgements(mut self, enabled: bool) -> Self {
        self.composer = self.composer.with_acknowledgements(enabled);
        self
    }

    /// Replace the composer, e.g. to add result templates.
    pub fn with_composer(mut self, composer: ResponseComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_recall_limit(mut self, limit: usize) -> Self {
        self.recall_limit = limit;
        self
    }

    pub fn with_max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = turns;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self.rebuild();
        self
    }

    fn rebuild(&mut self) {
        let mut resolver = IntentResolver::new(self.provider.clone(), self.registry.clone(), self.model.clone())
            .with_temperature(self.temperature)
            .with_event_bus(self.event_bus.clone());
        if let Some(max) = self.max_tokens {
            resolver = resolver.with_max_tokens(max);
        }
        self.resolver = resolver;
        self.invoker =
            ToolInvoker::new(self.registry.clone(), self.tool_timeout).with_event_bus(self.event_bus.clone());
    }

    pub fn persona(&self) -> &Persona {
        self.assembler.persona()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn memory(&self) -> Option<&Arc<dyn MemoryBackend>> {
        self.memory.as_ref()
    }

    /// Start a session, recalling the most recent memories.
    pub async fn open_session(&self) -> Session {
        let session = Session::new(self.max_history_turns);
        let Some(memory) = &self.memory else {
            return session;
        };
        match memory.recent(self.recall_limit).await {
            Ok(entries) => {
                if !entries.is_empty() {
                    debug!(count = entries.len(), "Recalled memories for session");
                }
                session.with_memories(entries)
            }
            Err(e) => {
                warn!("Memory recall failed: {e}");
                session
            }
        }
    }

    /// Greet the user and record the greeting in the session.
    pub fn greet(&self, session: &mut Session, hour: u32) -> String {
        let greeting = self.persona().greeting(hour);
        session.record_assistant(&greeting);
        greeting
    }

    /// Process one user turn and return the reply.
    ///
    /// Never fails: every resolver and tool failure becomes a spoken reply.
    pub async fn respond(&self, session: &mut Session, input: &str) -> String {
        let input = input.trim();
        let conversation_id = session.id().to_string();

        self.event_bus.publish(DomainEvent::TurnStarted {
            conversation_id: conversation_id.clone(),
            content_preview: input.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });
        info!(conversation_id = %conversation_id, turns = session.history().len(), "Processing turn");

        let doc = self.assembler.assemble_input(&AssemblyInput {
            history: session.history(),
            registry: &self.registry,
            memories: session.memories(),
            new_input: input,
        });

        let reply = match self.resolver.resolve(&doc).await {
            Ok(intent) if intent.is_tool_call() => {
                let result = self.invoker.invoke(&intent).await;
                self.reply_for_result(&doc, &intent, &result).await
            }
            Ok(intent) => self.composer.compose(&intent, None),
            Err(e) => self.degrade(&e),
        };

        session.record_turn(input, &reply);
        self.event_bus.publish(DomainEvent::ResponseComposed {
            conversation_id,
            chars: reply.chars().count(),
            timestamp: Utc::now(),
        });
        reply
    }

    async fn reply_for_result(&self, doc: &PromptDocument, intent: &ResolvedIntent, result: &ToolResult) -> String {
        if self.narrate && result.is_success() {
            if let Some(text) = self.narrate_result(doc, intent, result).await {
                return text;
            }
        }
        self.composer.compose(intent, Some(result))
    }

    /// Ask the model to phrase a successful tool result.
    ///
    /// Returns `None` when the model is unreachable or gives nothing usable.
    async fn narrate_result(&self, doc: &PromptDocument, intent: &ResolvedIntent, result: &ToolResult) -> Option<String> {
        let (
            ResolvedIntent::ToolCall {
                call_id,
                tool_name,
                arguments,
                ..
            },
            ToolResult::Success { payload },
        ) = (intent, result)
        else {
            return None;
        };

        let mut call = Message::assistant("");
        call.tool_calls = vec![MessageToolCall {
            id: call_id.clone(),
            name: tool_name.clone(),
            arguments: Value::Object(arguments.clone()).to_string(),
        }];
        let payload_text = match payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut messages = doc.to_messages();
        messages.push(call);
        messages.push(Message::tool_result(call_id.clone(), payload_text));
        messages.push(Message::system(NARRATION_INSTRUCTION));

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: doc.tool_definitions.clone(),
            json_mode: false,
        };

        let response = match self.provider.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Narration failed, using template");
                return None;
            }
        };

        // The system instructions ask for JSON, so a reply object is accepted too.
        match parse_decision(&response.message) {
            Ok(Decision::Reply(text)) => Some(text),
            Ok(Decision::Tool { .. }) => None,
            Err(_) => Some(response.message.content.trim().to_string()).filter(|t| !t.is_empty()),
        }
    }

    /// Turn a resolution failure into something worth saying.
    fn degrade(&self, error: &ResolveError) -> String {
        let title = &self.persona().title;
        match error {
            ResolveError::UnknownTool { name, fallback_text } => {
                warn!(tool = %name, "Model chose an unregistered tool, replying with its text");
                match fallback_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    Some(text) => text.to_string(),
                    None => self.composer.apology(ToolErrorKind::UnknownTool),
                }
            }
            ResolveError::InvalidArguments { tool, field, .. } => {
                warn!(tool = %tool, field = %field, "Model supplied unusable arguments");
                self.composer.apology(ToolErrorKind::InvalidArguments)
            }
            ResolveError::MalformedOutput { .. } => {
                format!("I'm sorry, {title}, I didn't quite catch that. Could you say it another way?")
            }
            ResolveError::Provider(e) => {
                warn!(error = %e, "Language model unavailable");
                format!("My apologies, {title}. I'm unable to reach my language services at the moment.")
            }
        }
    }

    /// Store the session's exchanges as memories. Returns how many were saved.
    pub async fn close_session(&self, session: Session) -> usize {
        let Some(memory) = &self.memory else {
            return 0;
        };
        let source = session.id().to_string();
        let mut stored = 0;
        for exchange in session.exchanges() {
            let entry = MemoryEntry::new(format!(
                "User asked: {}\nAssistant answered: {}",
                exchange.user, exchange.assistant
            ))
            .with_source(source.clone())
            .with_tags(&["conversation"]);
            match memory.store(entry).await {
                Ok(_) => stored += 1,
                Err(e) => warn!("Failed to save exchange to memory: {e}"),
            }
        }
        info!(conversation_id = %source, stored, "Session closed");
        stored
    }
}
