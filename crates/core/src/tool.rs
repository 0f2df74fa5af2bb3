//! Tool trait: the abstraction over assistant capabilities.
//!
//! Tools are what let the assistant act: search the web, look up the
//! weather, drive the display. Any type implementing [`Tool`] qualifies;
//! its parameter schema is declared up front and captured in a
//! [`ToolDescriptor`] when it is registered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ParameterSchema;

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_web", "weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The declared parameters of this tool.
    fn schema(&self) -> ParameterSchema;

    /// Run the tool with validated arguments and return a structured payload.
    async fn invoke(&self, arguments: Map<String, Value>) -> std::result::Result<Value, ToolError>;
}

/// A registered tool: its contract plus the handle used to invoke it.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
    pub handle: Arc<dyn Tool>,
}

impl ToolDescriptor {
    /// Capture the contract of a tool.
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            schema: tool.schema(),
            handle: tool,
        }
    }

    /// Convert into a ToolDefinition for native function calling.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Why a tool call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Timeout,
    ExecutionFailed,
    InvalidArguments,
    UnknownTool,
}

impl ToolErrorKind {
    /// Short phrase used in user-facing apologies.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Timeout => "the action timed out",
            Self::ExecutionFailed => "the tool ran into a problem",
            Self::InvalidArguments => "I didn't have the details the tool needs",
            Self::UnknownTool => "I don't have a tool for that",
        }
    }
}

impl From<&ToolError> for ToolErrorKind {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::Timeout { .. } => Self::Timeout,
            ToolError::InvalidArguments { .. } => Self::InvalidArguments,
            ToolError::UnknownTool(_) | ToolError::DuplicateTool(_) => Self::UnknownTool,
            ToolError::ExecutionFailed { .. } => Self::ExecutionFailed,
        }
    }
}

/// The normalized outcome of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: Value },
    Failure { kind: ToolErrorKind, message: String },
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::failure(ToolErrorKind::from(&err), err.to_string())
    }
}

/// A registry of available tools, in registration order.
///
/// Built once at startup and then shared read-only (typically as
/// `Arc<ToolRegistry>`), so every turn sees the same catalogue.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken, leaving the
    /// registry unchanged.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let descriptor = ToolDescriptor::from_tool(tool);
        if self.index.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateTool(descriptor.name));
        }
        tracing::debug!(tool = %descriptor.name, "Registered tool");
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> std::result::Result<&ToolDescriptor, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Iterate descriptors in registration order. The iterator is lazy and
    /// can be cloned to restart from the same position.
    pub fn list_all(&self) -> std::slice::Iter<'_, ToolDescriptor> {
        self.entries.iter()
    }

    /// Tool definitions in registration order (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list_all().map(ToolDescriptor::to_definition).collect()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.list_all().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
