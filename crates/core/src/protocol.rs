//! The inline tool-call protocol.
//!
//! A model requests a tool by writing, on its own line:
//!
//! ```text
//! TOOL_CALL::{"tool": "fs_list", "args": {"relative_path": "."}}
//! ```
//!
//! Everything else in a response is prose. Malformed call lines and calls
//! to unregistered tools are skipped with a diagnostic; they never abort
//! extraction of the lines that follow.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ProtocolError;
use crate::tool::{ToolArgs, ToolRegistry};

/// The literal marker that opens a call line.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL::";

/// A tool invocation extracted from an assistant response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: ToolArgs,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// The arguments rendered as compact JSON.
    pub fn args_json(&self) -> String {
        Value::Object(self.args.clone()).to_string()
    }
}

/// Parse a single line. Returns `None` when the line is prose.
///
/// Does not consult the registry; see [`extract_tool_calls`].
pub fn parse_call_line(line: &str) -> Option<Result<ToolCall, ProtocolError>> {
    let payload = line.trim().strip_prefix(TOOL_CALL_MARKER)?.trim();
    Some(parse_payload(payload))
}

fn parse_payload(payload: &str) -> Result<ToolCall, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    let name = match object.remove("tool") {
        Some(Value::String(name)) => name,
        _ => return Err(ProtocolError::MissingTool),
    };
    let args = match object.remove("args") {
        Some(Value::Object(args)) => args,
        _ => return Err(ProtocolError::MissingArgs),
    };

    Ok(ToolCall { name, args })
}

/// Extract every valid call line in `text`, in textual order, keeping only
/// calls to tools present in `registry`.
///
/// An empty result means the model is done with this turn.
pub fn extract_tool_calls(text: &str, registry: &ToolRegistry) -> Vec<ToolCall> {
    let mut calls = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let Some(parsed) = parse_call_line(line) else {
            continue;
        };

        let call = match parsed {
            Ok(call) if registry.contains(&call.name) => call,
            Ok(call) => {
                warn!(line = line_no, error = %ProtocolError::UnregisteredTool(call.name), "Skipping tool call");
                continue;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed tool call");
                continue;
            }
        };

        info!(line = line_no, tool = %call.name, args = %call.args_json(), "Extracted tool call");
        calls.push(call);
    }

    if calls.is_empty() {
        debug!("No valid tool calls found");
    } else {
        debug!(count = calls.len(), "Extracted tool calls");
    }

    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register_fn(name, "test tool", |_| Ok("ok".into()));
        }
        registry
    }

    #[test]
    fn extracts_single_call_between_prose() {
        let text = "Sure.\nTOOL_CALL::{\"tool\":\"sysinfo\",\"args\":{}}\nDone.";
        let calls = extract_tool_calls(text, &registry(&["sysinfo"]));
        assert_eq!(calls, vec![ToolCall::new("sysinfo", ToolArgs::new())]);
    }

    #[test]
    fn unregistered_tool_is_skipped() {
        let text = "Sure.\nTOOL_CALL::{\"tool\":\"sysinfo\",\"args\":{}}\nDone.";
        assert!(extract_tool_calls(text, &registry(&[])).is_empty());
    }

    #[test]
    fn bad_json_yields_nothing() {
        assert!(extract_tool_calls("TOOL_CALL::{bad json", &registry(&["sysinfo"])).is_empty());
    }

    #[test]
    fn calls_keep_textual_order_and_skip_bad_lines() {
        let text = "\
Let me look around.
  TOOL_CALL::{\"tool\": \"fs_list\", \"args\": {\"relative_path\": \".\"}}
TOOL_CALL::{\"tool\": \"fs_read\"}
TOOL_CALL::
TOOL_CALL::[1, 2]
TOOL_CALL::{\"tool\": 7, \"args\": {}}
TOOL_CALL::{\"tool\": \"fs_read\", \"args\": \"notes.txt\"}
TOOL_CALL::{\"tool\": \"fs_read\", \"args\": {\"relative_path\": \"notes.txt\"}}
";
        let calls = extract_tool_calls(text, &registry(&["fs_list", "fs_read"]));
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["fs_list", "fs_read"]);
        assert_eq!(calls[1].args_json(), json!({"relative_path": "notes.txt"}).to_string());
    }

    #[test]
    fn marker_must_start_the_line() {
        let text = "I will now emit TOOL_CALL::{\"tool\":\"sysinfo\",\"args\":{}}";
        assert!(extract_tool_calls(text, &registry(&["sysinfo"])).is_empty());
    }

    #[test]
    fn parse_errors_are_classified() {
        assert_eq!(
            parse_call_line("TOOL_CALL::   ").unwrap(),
            Err(ProtocolError::EmptyPayload)
        );
        assert_eq!(
            parse_call_line("TOOL_CALL::\"sysinfo\"").unwrap(),
            Err(ProtocolError::NotAnObject)
        );
        assert_eq!(
            parse_call_line("TOOL_CALL::{\"args\": {}}").unwrap(),
            Err(ProtocolError::MissingTool)
        );
        assert_eq!(
            parse_call_line("TOOL_CALL::{\"tool\": \"x\", \"args\": null}").unwrap(),
            Err(ProtocolError::MissingArgs)
        );
        assert!(matches!(
            parse_call_line("TOOL_CALL::{oops").unwrap(),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(parse_call_line("just prose").is_none());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let call = parse_call_line(r#"TOOL_CALL::{"tool": "app", "args": {"app_name": "notepad"}, "why": "asked"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(call.name, "app");
        assert_eq!(call.args.get("app_name"), Some(&json!("notepad")));
    }
}
