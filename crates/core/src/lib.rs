//! # Jarvis Core
//!
//! Domain types, traits, and error definitions for the Jarvis assistant engine.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, tool, memory store) is a trait
//! here. Implementations live in their respective crates, so the engine can be
//! tested end-to-end with scripted stand-ins.

pub mod error;
pub mod event;
pub mod identity;
pub mod intent;
pub mod memory;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, ResolveError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use identity::{Persona, PersonaSource};
pub use intent::ResolvedIntent;
pub use memory::{MemoryBackend, MemoryEntry};
pub use message::{ConversationHistory, ConversationId, ConversationTurn, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use schema::{ParamType, ParameterSchema, ParameterSpec};
pub use tool::{Tool, ToolDescriptor, ToolErrorKind, ToolRegistry, ToolResult};
