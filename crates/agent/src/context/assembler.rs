//! Prompt assembly: builds the document the intent resolver sends to the model.
//!
//! Sections, in the order they are budgeted:
//!
//! 1. **System instructions** (persona + decision format), never trimmed
//! 2. **Tool catalogue** (name, description, parameters), never trimmed
//! 3. **New user input**, never trimmed
//! 4. **Long-Term Memory** (recalled entries), oldest dropped first
//! 5. **Conversation History** (trailing window), oldest turns dropped
//!
//! Assembly is a pure transformation: it never mutates the history, and
//! identical inputs always produce identical documents.

use crate::context::token;
use jarvis_core::identity::Persona;
use jarvis_core::memory::MemoryEntry;
use jarvis_core::message::{ConversationHistory, ConversationId, Message, Role};
use jarvis_core::provider::ToolDefinition;
use jarvis_core::tool::ToolRegistry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Instructions telling the model how to express its decision.
pub const DECISION_FORMAT: &str = "[Response Format]\n\
Answer with a single JSON object and nothing else.\n\
To use a tool: {\"tool\": \"<tool name>\", \"arguments\": {<parameter>: <value>}}\n\
To answer directly: {\"reply\": \"<your answer>\"}\n\
Only use tools listed under [Available Tools]. If none fits, answer directly.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Token budget configuration.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    /// Total token budget for the whole document.
    pub total: usize,
    /// Optional per-section caps.
    pub per_layer: PerLayerBudget,
}

/// Per-section caps for the trimmable sections. `None` means "whatever remains".
#[derive(Debug, Clone, Default)]
pub struct PerLayerBudget {
    pub long_term_memory: Option<usize>,
    pub conversation_history: Option<usize>,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            total: 4096,
            per_layer: PerLayerBudget::default(),
        }
    }
}

impl TokenBudget {
    pub fn total(total: usize) -> Self {
        Self {
            total,
            per_layer: PerLayerBudget::default(),
        }
    }
}

/// Everything the assembler needs for one turn.
pub struct AssemblyInput<'a> {
    pub history: &'a ConversationHistory,
    pub registry: &'a ToolRegistry,
    /// Recalled memories, oldest first.
    pub memories: &'a [MemoryEntry],
    pub new_input: &'a str,
}

/// The structured prompt for one turn.
#[derive(Debug, Clone)]
pub struct PromptDocument {
    /// The session the document was built for.
    pub conversation_id: ConversationId,
    /// Persona instructions, decision format, catalogue and memories.
    pub system_message: String,
    /// History window followed by the new user turn.
    pub messages: Vec<Message>,
    /// Native function-calling definitions for the catalogue.
    pub tool_definitions: Vec<ToolDefinition>,
    pub metadata: AssemblyMetadata,
}

impl PromptDocument {
    /// The full message list: system message first.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(&self.system_message));
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// The new user input this document was built for.
    pub fn new_input(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
    }
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub total_tokens: usize,
    pub budget: usize,
    /// Budget utilization percentage (may exceed 100 when over budget).
    pub utilization_pct: f32,
    /// True when the untrimmable sections alone exceed the budget.
    pub over_budget: bool,
    pub per_layer: Vec<LayerStats>,
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub tokens: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Items dropped from a section during budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: String,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The prompt assembler. Stateless apart from its configuration.
pub struct PromptAssembler {
    persona: Persona,
    budget: TokenBudget,
}

impl PromptAssembler {
    pub fn new(persona: Persona, budget: TokenBudget) -> Self {
        Self { persona, budget }
    }

    /// Create an assembler with the default budget (4096 tokens).
    pub fn with_default_budget(persona: Persona) -> Self {
        Self::new(persona, TokenBudget::default())
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Assemble a document from history, the tool catalogue and the new input.
    pub fn assemble(
        &self,
        history: &ConversationHistory,
        registry: &ToolRegistry,
        new_input: &str,
    ) -> PromptDocument {
        self.assemble_input(&AssemblyInput {
            history,
            registry,
            memories: &[],
            new_input,
        })
    }

    /// Assemble a document, including recalled memories.
    ///
    /// # Algorithm
    ///
    /// 1. Reserve system instructions, catalogue and new input
    /// 2. If those alone exceed the budget, flag the document as over budget
    ///    and include nothing else
    /// 3. Fill the remainder with memories, then the newest history turns
    pub fn assemble_input(&self, input: &AssemblyInput<'_>) -> PromptDocument {
        let mut stats: Vec<LayerStats> = Vec::new();
        let mut drops: Vec<DropInfo> = Vec::new();

        // ── System instructions ────────────────────────────────────────────
        let instructions = format!("{}\n\n{}", self.persona.system_prompt, DECISION_FORMAT);
        let system_tokens = token::estimate_tokens(&instructions);
        stats.push(LayerStats {
            name: "system".into(),
            tokens: system_tokens,
            items_included: 1,
            items_total: 1,
        });

        // ── Tool catalogue ─────────────────────────────────────────────────
        let catalogue = render_catalogue(input.registry);
        let tool_definitions = input.registry.definitions();
        let catalogue_tokens =
            token::estimate_tokens(&catalogue) + token::estimate_tools_tokens(&tool_definitions);
        stats.push(LayerStats {
            name: "tool_catalogue".into(),
            tokens: catalogue_tokens,
            items_included: input.registry.len(),
            items_total: input.registry.len(),
        });

        // ── New user input ─────────────────────────────────────────────────
        let user_tokens = token::estimate_tokens(input.new_input) + token::MESSAGE_OVERHEAD;

        let reserved = system_tokens + catalogue_tokens + user_tokens;
        let over_budget = reserved > self.budget.total;
        if over_budget {
            warn!(
                reserved,
                budget = self.budget.total,
                "System instructions, catalogue and input exceed the prompt budget"
            );
        }
        let mut remaining = self.budget.total.saturating_sub(reserved);

        // ── Long-Term Memory ───────────────────────────────────────────────
        let (mem_section, mem_stats, mem_drop) = Self::render_memory_layer(
            input.memories,
            Self::effective_budget(self.budget.per_layer.long_term_memory, remaining),
        );
        remaining -= mem_stats.tokens;
        stats.push(mem_stats);
        if let Some(d) = mem_drop {
            drops.push(d);
        }

        // ── Conversation History ───────────────────────────────────────────
        let (mut messages, hist_stats, hist_drop) = Self::render_history_layer(
            input.history,
            Self::effective_budget(self.budget.per_layer.conversation_history, remaining),
        );
        stats.push(hist_stats);
        if let Some(d) = hist_drop {
            drops.push(d);
        }

        messages.push(Message::user(input.new_input));
        stats.push(LayerStats {
            name: "user_message".into(),
            tokens: user_tokens,
            items_included: 1,
            items_total: 1,
        });

        let mut sections = vec![instructions, catalogue];
        if !mem_section.is_empty() {
            sections.push(mem_section);
        }

        let total_tokens: usize = stats.iter().map(|s| s.tokens).sum();
        let utilization_pct = (total_tokens as f32 / self.budget.total.max(1) as f32) * 100.0;

        PromptDocument {
            conversation_id: input.history.id.clone(),
            system_message: sections.join("\n\n"),
            messages,
            tool_definitions,
            metadata: AssemblyMetadata {
                total_tokens,
                budget: self.budget.total,
                utilization_pct,
                over_budget,
                per_layer: stats,
                drops,
            },
        }
    }

    // ── Private layer renderers ───────────────────────────────────────────

    fn render_memory_layer(
        memories: &[MemoryEntry],
        budget: usize,
    ) -> (String, LayerStats, Option<DropInfo>) {
        let layer = "long_term_memory";
        if memories.is_empty() {
            return (String::new(), Self::empty_stats(layer, 0), None);
        }

        let header = "[Long-Term Memory]\n";
        let header_tokens = token::estimate_tokens(header);
        if header_tokens >= budget {
            let dropped_tokens: usize = memories
                .iter()
                .map(|m| token::estimate_tokens(&m.content) + 1)
                .sum();
            return (
                String::new(),
                Self::empty_stats(layer, memories.len()),
                Some(DropInfo {
                    layer: layer.into(),
                    items_dropped: memories.len(),
                    tokens_dropped: dropped_tokens,
                    reason: "No budget available for memory layer".into(),
                }),
            );
        }

        let mut used = header_tokens;
        let mut lines = Vec::new();
        let mut dropped = 0;
        let mut dropped_tokens = 0;

        // Newest first, so the oldest are the ones dropped.
        for entry in memories.iter().rev() {
            let line = format!("- {}\n", entry.content.replace('\n', " | "));
            let line_tokens = token::estimate_tokens(&line);
            if used + line_tokens <= budget {
                lines.push(line);
                used += line_tokens;
            } else {
                dropped += 1;
                dropped_tokens += line_tokens;
            }
        }
        lines.reverse();

        if lines.is_empty() {
            return (
                String::new(),
                Self::empty_stats(layer, memories.len()),
                Self::maybe_drop(layer, dropped, dropped_tokens, "Oldest entries dropped"),
            );
        }

        (
            format!("{}{}", header, lines.join("")).trim_end().to_string(),
            LayerStats {
                name: layer.into(),
                tokens: used,
                items_included: lines.len(),
                items_total: memories.len(),
            },
            Self::maybe_drop(layer, dropped, dropped_tokens, "Oldest entries dropped"),
        )
    }

    fn render_history_layer(
        history: &ConversationHistory,
        budget: usize,
    ) -> (Vec<Message>, LayerStats, Option<DropInfo>) {
        let layer = "conversation_history";
        if history.is_empty() {
            return (Vec::new(), Self::empty_stats(layer, 0), None);
        }

        let mut used = 0;
        let mut included = Vec::new();
        let mut dropped = 0;
        let mut dropped_tokens = 0;
        let mut window_closed = false;
        let mut considered = 0;

        // Contiguous trailing window: newest → oldest, and once a turn does
        // not fit every older turn is dropped too. System turns never enter
        // the window and are not counted.
        for turn in history.iter().rev() {
            if turn.role == Role::System {
                continue;
            }
            considered += 1;
            let turn_tokens = token::estimate_turn_tokens(turn);
            if !window_closed && used + turn_tokens <= budget {
                included.push(turn.to_message());
                used += turn_tokens;
            } else {
                window_closed = true;
                dropped += 1;
                dropped_tokens += turn_tokens;
            }
        }

        included.reverse();

        let included_count = included.len();
        (
            included,
            LayerStats {
                name: layer.into(),
                tokens: used,
                items_included: included_count,
                items_total: considered,
            },
            Self::maybe_drop(
                layer,
                dropped,
                dropped_tokens,
                "Oldest turns dropped (sliding window)",
            ),
        )
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    fn effective_budget(per_layer_limit: Option<usize>, remaining: usize) -> usize {
        match per_layer_limit {
            Some(limit) => limit.min(remaining),
            None => remaining,
        }
    }

    fn empty_stats(layer: &str, total: usize) -> LayerStats {
        LayerStats {
            name: layer.into(),
            tokens: 0,
            items_included: 0,
            items_total: total,
        }
    }

    fn maybe_drop(layer: &str, count: usize, tokens: usize, reason: &str) -> Option<DropInfo> {
        if count > 0 {
            Some(DropInfo {
                layer: layer.into(),
                items_dropped: count,
                tokens_dropped: tokens,
                reason: reason.into(),
            })
        } else {
            None
        }
    }
}

/// Render the tool catalogue in the human/model-readable form.
pub fn render_catalogue(registry: &ToolRegistry) -> String {
    let mut out = String::from("[Available Tools]");
    if registry.is_empty() {
        out.push_str("\n(none)");
        return out;
    }
    for tool in registry.list_all() {
        out.push_str(&format!("\n- {}: {}", tool.name, tool.description));
        for line in tool.schema.render_lines() {
            out.push_str("\n    ");
            out.push_str(&line);
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::registry_with_search as registry;
    use jarvis_core::message::ConversationTurn;

    fn history_of(n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new(100);
        for i in 0..n {
            if i % 2 == 0 {
                history.push(ConversationTurn::user(format!("question number {i} {}", "x".repeat(40))));
            } else {
                history.push(ConversationTurn::assistant(format!("answer number {i} {}", "y".repeat(40))));
            }
        }
        history
    }

    #[test]
    fn system_instructions_and_catalogue_always_included() {
        let asm = PromptAssembler::with_default_budget(Persona::default());
        let doc = asm.assemble(&ConversationHistory::default(), &registry(), "Hello");

        assert!(doc.system_message.starts_with(&Persona::default().system_prompt));
        assert!(doc.system_message.contains("[Response Format]"));
        assert!(doc.system_message.contains("- search_web: Search the web"));
        assert!(doc.system_message.contains("query (string, required): What to look up"));
        assert!(doc.system_message.contains("num_results (integer, optional, default 5)"));
        assert_eq!(doc.tool_definitions.len(), 1);
    }

    #[test]
    fn new_input_is_last_message() {
        let asm = PromptAssembler::with_default_budget(Persona::default());
        let doc = asm.assemble(&history_of(4), &registry(), "What's next?");
        assert_eq!(doc.messages.len(), 5);
        assert_eq!(doc.new_input(), "What's next?");
        assert_eq!(doc.messages.last().unwrap().role, Role::User);
    }

    #[test]
    fn empty_registry_renders_none() {
        let catalogue = render_catalogue(&ToolRegistry::new());
        assert_eq!(catalogue, "[Available Tools]\n(none)");
    }

    #[test]
    fn history_truncated_from_oldest_end() {
        let history = history_of(30);
        let unbounded = PromptAssembler::new(Persona::default(), TokenBudget::total(100_000))
            .assemble(&history, &registry(), "new question");
        assert_eq!(unbounded.messages.len(), 31);

        let reserved: usize = unbounded
            .metadata
            .per_layer
            .iter()
            .filter(|l| l.name != "conversation_history")
            .map(|l| l.tokens)
            .sum();
        // Room for roughly five turns of history.
        let budget = reserved + 5 * token::estimate_turn_tokens(history.iter().last().unwrap());
        let asm = PromptAssembler::new(Persona::default(), TokenBudget::total(budget));
        let doc = asm.assemble(&history, &registry(), "new question");

        let kept = doc.messages.len() - 1;
        assert!(kept > 0 && kept < 30, "kept {kept} turns");
        // The kept turns are exactly the newest ones, in order.
        let expected: Vec<&str> = history
            .iter()
            .skip(30 - kept)
            .map(|t| t.content.as_str())
            .collect();
        let actual: Vec<&str> = doc.messages[..kept].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(actual, expected);
        assert_eq!(doc.new_input(), "new question");

        let drop = doc
            .metadata
            .drops
            .iter()
            .find(|d| d.layer == "conversation_history")
            .unwrap();
        assert_eq!(drop.items_dropped, 30 - kept);
        assert!(!doc.metadata.over_budget);
    }

    #[test]
    fn history_window_is_contiguous() {
        let mut history = ConversationHistory::new(10);
        history.push(ConversationTurn::user("short"));
        history.push(ConversationTurn::assistant("z".repeat(4000)));
        history.push(ConversationTurn::user("latest short turn"));

        let asm = PromptAssembler::new(Persona::default(), TokenBudget::total(1000));
        let doc = asm.assemble(&history, &ToolRegistry::new(), "now");

        // The oversized turn closes the window; the older short turn is not
        // pulled in past the gap.
        let contents: Vec<&str> = doc.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["latest short turn", "now"]);
    }

    #[test]
    fn over_budget_keeps_instructions_and_input() {
        let asm = PromptAssembler::new(Persona::default(), TokenBudget::total(10));
        let long_input = "please ".repeat(200);
        let doc = asm.assemble(&history_of(6), &registry(), &long_input);

        assert!(doc.metadata.over_budget);
        assert!(doc.system_message.contains(&Persona::default().system_prompt));
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.new_input(), long_input);
        assert!(doc.metadata.utilization_pct > 100.0);
    }

    #[test]
    fn memories_injected_into_system_message() {
        let asm = PromptAssembler::with_default_budget(Persona::default());
        let memories = vec![
            MemoryEntry::new("The user lives in London"),
            MemoryEntry::new("User asked: remind me\nAssistant answered: Of course, Sir."),
        ];
        let doc = asm.assemble_input(&AssemblyInput {
            history: &ConversationHistory::default(),
            registry: &registry(),
            memories: &memories,
            new_input: "What's the weather?",
        });
        assert!(doc.system_message.contains("[Long-Term Memory]\n- The user lives in London"));
        assert!(doc.system_message.contains("User asked: remind me | Assistant answered"));
    }

    #[test]
    fn oldest_memories_dropped_first() {
        let memories: Vec<MemoryEntry> = (0..50)
            .map(|i| MemoryEntry::new(format!("memory {i} {}", "m".repeat(60))))
            .collect();
        let mut budget = TokenBudget::total(100_000);
        budget.per_layer.long_term_memory = Some(100);
        let asm = PromptAssembler::new(Persona::default(), budget);
        let doc = asm.assemble_input(&AssemblyInput {
            history: &ConversationHistory::default(),
            registry: &ToolRegistry::new(),
            memories: &memories,
            new_input: "hi",
        });
        assert!(doc.system_message.contains("memory 49"));
        assert!(!doc.system_message.contains("memory 0 "));
        assert!(doc.metadata.drops.iter().any(|d| d.layer == "long_term_memory"));
    }

    #[test]
    fn assembly_does_not_mutate_history_and_is_deterministic() {
        let history = history_of(8);
        let before = history.len();
        let asm = PromptAssembler::with_default_budget(Persona::default());
        let a = asm.assemble(&history, &registry(), "again");
        let b = asm.assemble(&history, &registry(), "again");
        assert_eq!(history.len(), before);
        assert_eq!(a.system_message, b.system_message);
        let ac: Vec<&str> = a.messages.iter().map(|m| m.content.as_str()).collect();
        let bc: Vec<&str> = b.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(ac, bc);
        assert_eq!(a.conversation_id, history.id);
    }

    #[test]
    fn system_turns_left_out_of_history_stats() {
        let mut history = history_of(2);
        history.push(ConversationTurn::system("Session resumed."));
        let doc = PromptAssembler::with_default_budget(Persona::default())
            .assemble(&history, &registry(), "hi");

        let stats = doc
            .metadata
            .per_layer
            .iter()
            .find(|l| l.name == "conversation_history")
            .unwrap();
        assert_eq!(stats.items_included, 2);
        assert_eq!(stats.items_total, 2);
        assert!(doc.metadata.drops.iter().all(|d| d.layer != "conversation_history"));
        assert!(doc.messages.iter().all(|m| m.content != "Session resumed."));
    }

    #[test]
    fn to_messages_puts_system_first() {
        let asm = PromptAssembler::with_default_budget(Persona::default());
        let doc = asm.assemble(&history_of(2), &registry(), "hi");
        let messages = doc.to_messages();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages.len(), 4);
    }
}
