//! In-memory backend: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use jarvis_core::error::MemoryError;
use jarvis_core::memory::{MemoryBackend, MemoryEntry};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory backend that stores memories in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryBackend {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str { "in_memory" }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.iter().skip(skip).cloned().collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_assigns_id() {
        let mem = InMemoryBackend::new();
        let id = mem.store(MemoryEntry::new("The user lives in London")).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_returns_newest_in_order() {
        let mem = InMemoryBackend::new();
        for i in 0..5 {
            mem.store(MemoryEntry::new(format!("memory {i}"))).await.unwrap();
        }
        let recent = mem.recent(2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["memory 3", "memory 4"]);
    }

    #[tokio::test]
    async fn recent_with_large_limit_returns_all() {
        let mem = InMemoryBackend::new();
        mem.store(MemoryEntry::new("only one")).await.unwrap();
        assert_eq!(mem.recent(10).await.unwrap().len(), 1);
        assert!(mem.recent(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_all() {
        let mem = InMemoryBackend::new();
        mem.store(MemoryEntry::new("a")).await.unwrap();
        mem.clear().await.unwrap();
        assert_eq!(mem.count().await.unwrap(), 0);
    }
}
