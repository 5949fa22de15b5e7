//! # Joi Core
//!
//! Domain types, traits, and error definitions for the Joi assistant backend.
//! This crate has **no transport or provider dependencies**: it defines the
//! conversation model, the tool-call protocol, and the seams every other
//! crate implements against.
//!
//! ## Design Philosophy
//!
//! Model providers and tools are traits here; implementations live in their
//! own crates. The orchestration loop only ever sees canonical roles, plain
//! text fragments, and tool results rendered as text.

pub mod error;
pub mod message;
pub mod prompt;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProtocolError, ProviderError, SessionError, ToolError};
pub use message::{Message, Role};
pub use protocol::{TOOL_CALL_MARKER, ToolCall, extract_tool_calls, parse_call_line};
pub use provider::{ModelAdapter, ResponseStream};
pub use session::{Session, SessionHandle, SessionStore};
pub use tool::{FnTool, NO_OUTPUT, Tool, ToolArgs, ToolRegistry};
