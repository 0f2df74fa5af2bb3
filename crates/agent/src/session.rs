//! Sessions: one conversation's state, and the queue that owns it.
//!
//! A `Session` is created when a user connects and consumed when they leave.
//! `SessionHandle` moves the session onto its own task and feeds it turns
//! through a bounded queue, so every input channel (console, voice, tests)
//! goes through a single writer. Separate sessions run independently.

use crate::assistant::Assistant;
use chrono::{DateTime, Utc};
use jarvis_core::error::Error;
use jarvis_core::memory::MemoryEntry;
use jarvis_core::message::{ConversationHistory, ConversationId, ConversationTurn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// One user input and the reply it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Per-connection conversation state.
#[derive(Debug)]
pub struct Session {
    history: ConversationHistory,
    memories: Vec<MemoryEntry>,
    exchanges: Vec<Exchange>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(max_history_turns: usize) -> Self {
        Self {
            history: ConversationHistory::new(max_history_turns),
            memories: Vec::new(),
            exchanges: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Memories recalled from earlier sessions, oldest first.
    pub fn with_memories(mut self, memories: Vec<MemoryEntry>) -> Self {
        self.memories = memories;
        self
    }

    pub fn id(&self) -> &ConversationId {
        &self.history.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn memories(&self) -> &[MemoryEntry] {
        &self.memories
    }

    /// Every exchange of the session, including ones evicted from history.
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a completed turn.
    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.history.push(ConversationTurn::user(user));
        self.history.push(ConversationTurn::assistant(assistant));
        self.exchanges.push(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
    }

    /// Append an assistant line with no user input before it (the greeting).
    pub fn record_assistant(&mut self, text: &str) {
        self.history.push(ConversationTurn::assistant(text));
    }
}

enum SessionCommand {
    Turn {
        input: String,
        reply: oneshot::Sender<String>,
    },
    Close {
        reply: oneshot::Sender<usize>,
    },
}

/// A cloneable handle to a session running on its own task.
#[derive(Clone)]
pub struct SessionHandle {
    id: ConversationId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Move `session` onto a task that processes one turn at a time.
    ///
    /// When the session is closed, or every handle is dropped, the session's
    /// exchanges are stored as memories.
    pub fn spawn(assistant: Arc<Assistant>, mut session: Session, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<SessionCommand>(capacity.max(1));
        let id = session.id().clone();

        tokio::spawn(async move {
            let mut closer = None;
            while let Some(command) = rx.recv().await {
                match command {
                    SessionCommand::Turn { input, reply } => {
                        let text = assistant.respond(&mut session, &input).await;
                        // The caller may have gone away; the turn is still recorded.
                        let _ = reply.send(text);
                    }
                    SessionCommand::Close { reply } => {
                        closer = Some(reply);
                        break;
                    }
                }
            }
            drop(rx);
            debug!(conversation_id = %session.id(), turns = session.exchanges().len(), "Session ending");
            let stored = assistant.close_session(session).await;
            if let Some(reply) = closer {
                let _ = reply.send(stored);
            }
        });

        Self { id, tx }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Queue one user input and wait for its reply.
    pub async fn send(&self, input: impl Into<String>) -> Result<String, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Turn {
                input: input.into(),
                reply,
            })
            .await
            .map_err(|_| Error::Internal("session is closed".into()))?;
        rx.await
            .map_err(|_| Error::Internal("session ended before replying".into()))
    }

    /// Close the session and wait for its memories to be stored.
    ///
    /// Returns how many exchanges were saved.
    pub async fn close(&self) -> Result<usize, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Close { reply })
            .await
            .map_err(|_| Error::Internal("session is closed".into()))?;
        rx.await
            .map_err(|_| Error::Internal("session ended before closing".into()))
    }
}
