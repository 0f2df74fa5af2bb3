//! Memory trait: what the assistant remembers across sessions.
//!
//! At the start of a session the most recent memories are recalled into the
//! prompt; when a session closes its exchanges are stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// A single memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this memory (assigned on store when empty)
    #[serde(default)]
    pub id: String,

    /// The content of the memory
    pub content: String,

    /// Tags for categorization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Source of the memory (conversation ID, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When this memory was last updated
    pub updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            tags: Vec::new(),
            source: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// The core MemoryBackend trait.
///
/// Implementations: in-memory (for testing) and JSONL file.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Store a new memory entry, returning its ID.
    async fn store(&self, entry: MemoryEntry) -> std::result::Result<String, MemoryError>;

    /// The most recent `limit` memories, oldest first.
    async fn recent(&self, limit: usize) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;

    /// Get total memory count.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;

    /// Clear all memories.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}
