//! Error types for the Jarvis domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for Jarvis operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised by the tool registry, argument validation, and tool handles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument '{field}' for {tool}: {reason}")]
    InvalidArguments {
        tool: String,
        field: String,
        reason: String,
    },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Failures of the intent resolver.
///
/// `UnknownTool` and `InvalidArguments` carry whatever free text the model
/// supplied alongside its decision so the caller can degrade to a direct reply.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Model selected unknown tool '{name}'")]
    UnknownTool {
        name: String,
        fallback_text: Option<String>,
    },

    #[error("Invalid argument '{field}' for {tool}: {reason}")]
    InvalidArguments {
        tool: String,
        field: String,
        reason: String,
        fallback_text: Option<String>,
    },

    #[error("Malformed model output: {reason}")]
    MalformedOutput { raw: String, reason: String },

    #[error("Language model unavailable: {0}")]
    Provider(#[from] ProviderError),
}

impl ResolveError {
    /// Free text the model produced alongside a rejected decision, if any.
    pub fn fallback_text(&self) -> Option<&str> {
        match self {
            Self::UnknownTool { fallback_text, .. }
            | Self::InvalidArguments { fallback_text, .. } => fallback_text.as_deref(),
            Self::MalformedOutput { raw, .. } if !raw.trim().is_empty() => Some(raw.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}
