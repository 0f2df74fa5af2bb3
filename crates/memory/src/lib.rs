//! Long-term memory backends for Jarvis.
//!
//! Memories survive across sessions: the most recent ones are recalled into
//! the prompt when a session opens, and the session's exchanges are stored
//! when it closes.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileBackend;
pub use in_memory::InMemoryBackend;
