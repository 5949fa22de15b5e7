//! Error types for the Joi domain.
//!
//! One `thiserror` enum per bounded context.
//!
//! None of these cross the orchestration boundary: the turn runner turns
//! every fault into text (history or a notification) before returning.

use thiserror::Error;

/// A model provider could not produce a response.
///
/// Adapters never return these to their callers; they render them into the
/// single error fragment that stands in for the assistant's reply.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A tool handler failed.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool panicked: {tool_name}: {reason}")]
    Panicked { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Short machine-friendly name of the fault kind, used in result text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::Panicked { .. } => "Panicked",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::Io(_) => "Io",
        }
    }
}

/// Session store faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No chat history provided")]
    NoHistory,

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("A session holds exactly one system message; refusing to append another")]
    SystemMessageAppend,
}

/// Why a `TOOL_CALL::` line was skipped.
///
/// Only ever logged: a bad call line contributes nothing and parsing
/// continues with the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("marker found but no JSON payload followed")]
    EmptyPayload,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing or non-string 'tool' field")]
    MissingTool,

    #[error("missing or non-object 'args' field")]
    MissingArgs,

    #[error("tool '{0}' is not registered")]
    UnregisteredTool(String),
}
