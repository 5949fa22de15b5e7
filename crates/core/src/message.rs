//! Message domain types.
//!
//! These are the value objects that flow through the whole system:
//! the client sends text → the session stores it → the model adapter
//! translates it into its provider's vocabulary → the reply comes back.

use serde::{Deserialize, Serialize};

/// The canonical, adapter-agnostic role of a message.
///
/// Adapters own the translation to provider roles; nothing upstream of an
/// adapter ever sees a provider-specific role name. Deserialization accepts
/// the legacy spellings clients still send (`human`, `tool`, `model`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// System instructions (always exactly one, always first).
    #[serde(rename = "system")]
    System,
    /// The end user.
    #[serde(rename = "user", alias = "human")]
    User,
    /// The model.
    #[serde(rename = "assistant", alias = "model")]
    Assistant,
    /// Output of a tool execution, fed back to the model.
    #[serde(rename = "tool-result", alias = "tool", alias = "tool_result")]
    ToolResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolResult => "tool-result",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(Role::ToolResult, content)
    }
}
