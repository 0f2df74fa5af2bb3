//! Persona: the assistant's voice.
//!
//! The persona supplies the fixed system instructions placed at the top of
//! every prompt, the greeting used when a session opens, and the short
//! in-character acknowledgements that preface tool results.
//!
//! Instructions are resolved in order: an inline override, then a prompt
//! file, then the built-in butler instructions. Missing files fall back
//! silently to the built-in text.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where persona instructions may come from.
#[derive(Debug, Clone, Default)]
pub struct PersonaSource {
    /// Inline system prompt (skips file loading)
    pub system_prompt_override: Option<String>,

    /// A markdown/text file with the instructions
    pub prompt_file: Option<PathBuf>,
}

/// The assistant's identity and manner of speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// The assistant's name, e.g. "J.A.R.V.I.S."
    pub name: String,

    /// How the assistant addresses the user, e.g. "Sir"
    pub title: String,

    /// Fixed system instructions
    pub system_prompt: String,

    /// Short acknowledgements that preface the result of an action
    #[serde(default)]
    pub acknowledgements: Vec<String>,

    /// Where the instructions were loaded from (for diagnostics)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_from: Option<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self::butler("J.A.R.V.I.S.", "Sir")
    }
}

impl Persona {
    /// The built-in butler persona with the given name and form of address.
    pub fn butler(name: impl Into<String>, title: impl Into<String>) -> Self {
        let name = name.into();
        let title = title.into();
        Self {
            system_prompt: Self::butler_instructions(&name, &title),
            acknowledgements: vec![
                format!("Right away, {title}."),
                format!("At once, {title}."),
                format!("On it, {title}."),
                "Consider it done.".into(),
                "As you wish.".into(),
            ],
            name,
            title,
            loaded_from: None,
        }
    }

    fn butler_instructions(name: &str, title: &str) -> String {
        format!(
            "You are {name}, a personal assistant with the manner of a polite, articulate \
             British butler. Address the user as \"{title}\".\n\
             - Be concise, precise and calm. Dry wit is welcome; rudeness never is.\n\
             - You are an assistant, not a human, but never describe yourself as a language model.\n\
             - Offer a useful suggestion when one is obvious.\n\
             - Use the conversation so far and any recalled memories to keep replies personal and coherent."
        )
    }

    /// Resolve persona instructions from the given source.
    pub fn load(name: &str, title: &str, source: &PersonaSource) -> Self {
        let mut persona = Self::butler(name, title);

        if let Some(prompt) = &source.system_prompt_override {
            debug!("Using persona prompt override, skipping file loading");
            persona.system_prompt = prompt.clone();
            persona.loaded_from = Some("<override>".into());
            return persona;
        }

        if let Some(path) = &source.prompt_file {
            match read_prompt_file(path) {
                Some(content) => {
                    debug!(file = %path.display(), "Loaded persona prompt file");
                    persona.system_prompt = content;
                    persona.loaded_from = Some(path.display().to_string());
                }
                None => warn!(file = %path.display(), "Persona prompt file missing or empty, using built-in instructions"),
            }
        }

        persona
    }

    /// Time-of-day greeting for the start of a session.
    pub fn greeting(&self, hour: u32) -> String {
        let part = match hour {
            5..=11 => "Good morning",
            12..=17 => "Good afternoon",
            _ => "Good evening",
        };
        format!("{part}, {}. {} at your service. How may I assist you today?", self.title, self.name)
    }

    /// A deterministic acknowledgement for an action on `key`.
    ///
    /// The same key always yields the same phrase.
    pub fn acknowledgement(&self, key: &str) -> Option<&str> {
        if self.acknowledgements.is_empty() {
            return None;
        }
        let hash = key
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        self.acknowledgements
            .get(hash as usize % self.acknowledgements.len())
            .map(String::as_str)
    }
}

fn read_prompt_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
