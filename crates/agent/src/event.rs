//! Turn events.
//!
//! `TurnEvent` is what the turn runner reports while it works. The gateway
//! forwards each one to the client as a `{"type": ..., "payload": ...}`
//! WebSocket frame; the CLI prints them.

use serde::{Deserialize, Serialize};

/// Events emitted by the turn runner, in the order they happen.
///
/// Wire names:
/// - `ai_chunk`: partial model text
/// - `status`: progress text ("Processing tool call 2/15")
/// - `tool_status`: a tool is about to run
/// - `tool_result`: a tool finished
/// - `warning`: the round bound was reached
/// - `error`: something went wrong outside the turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Partial text from the model.
    #[serde(rename = "ai_chunk")]
    Chunk(String),

    Status(String),

    ToolStatus(String),

    ToolResult(ToolResultPayload),

    Warning(String),

    Error(String),
}

/// A finished tool call as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool: String,
    pub args: serde_json::Value,
    pub result: String,
}

impl TurnEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk(_) => "ai_chunk",
            Self::Status(_) => "status",
            Self::ToolStatus(_) => "tool_status",
            Self::ToolResult(_) => "tool_result",
            Self::Warning(_) => "warning",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_uses_ai_chunk_tag() {
        let event = TurnEvent::Chunk("Hello".into());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "ai_chunk", "payload": "Hello"})
        );
        assert_eq!(event.event_type(), "ai_chunk");
    }

    #[test]
    fn tool_result_payload_shape() {
        let event = TurnEvent::ToolResult(ToolResultPayload {
            tool: "fs_list".into(),
            args: json!({"relative_path": "."}),
            result: "Workspace directory '.' is empty.".into(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "tool_result",
                "payload": {
                    "tool": "fs_list",
                    "args": {"relative_path": "."},
                    "result": "Workspace directory '.' is empty."
                }
            })
        );
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let events = [
            TurnEvent::Status("s".into()),
            TurnEvent::ToolStatus("t".into()),
            TurnEvent::Warning("w".into()),
            TurnEvent::Error("e".into()),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
        }
    }

    #[test]
    fn deserialize_round_trip() {
        let raw = r#"{"type":"warning","payload":"Reached maximum consecutive tool calls limit (15)"}"#;
        let event: TurnEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            TurnEvent::Warning("Reached maximum consecutive tool calls limit (15)".into())
        );
    }
}
