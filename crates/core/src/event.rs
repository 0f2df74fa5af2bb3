//! Domain event system: decoupled observation of the turn pipeline.
//!
//! Events are published as a turn moves through resolution, invocation and
//! composition. Observers subscribe without the engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn entered the pipeline
    TurnStarted {
        conversation_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The resolver reached a decision
    IntentResolved {
        conversation_id: String,
        /// Tool name, or `None` for a direct reply
        tool: Option<String>,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolInvoked {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The final reply for a turn was produced
    ResponseComposed {
        conversation_id: String,
        chars: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
