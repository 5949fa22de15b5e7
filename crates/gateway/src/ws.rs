//! `GET /ws/{client_id}`: the chat socket.
//!
//! Protocol:
//! - Client → Server: `{"type": "start_chat", "model": ...}`,
//!   `{"type": "load_chat", "history": [...], "model": ...}`,
//!   `{"type": "user_message", "payload": "...", "model": ...}`
//! - Server → Client: [`TurnEvent`] frames, `{"type": ..., "payload": ...}`
//!
//! A writer task drains the connection's event channel into the socket.
//! When the socket goes away the writer stops, the channel closes, and a
//! running turn stops after its current step.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use joi_agent::TurnEvent;
use joi_core::message::Message;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{AppState, SharedState};

/// Outbound frames buffered per connection.
const EVENT_BUFFER: usize = 256;

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartChat {
        #[serde(default)]
        model: Option<String>,
    },
    LoadChat {
        #[serde(default)]
        history: Vec<Message>,
        #[serde(default)]
        model: Option<String>,
    },
    UserMessage {
        #[serde(default)]
        payload: String,
        #[serde(default)]
        model: Option<String>,
    },
}

/// Decode a text frame; the error is the text of the `error` reply.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("Invalid message: {e}"))?;

    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or_default();
    if !matches!(kind, "start_chat" | "load_chat" | "user_message") {
        return Err(format!("Unknown message type: {kind}"));
    }
    serde_json::from_value(value).map_err(|e| format!("Invalid message: {e}"))
}

/// Session id for a new connection: `{client_id}_{8 hex chars}`.
pub fn connection_id(client_id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{client_id}_{}", &suffix[..8])
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(socket: WebSocket, state: SharedState, client_id: String) {
    let connection_id = connection_id(&client_id);
    info!(session_id = %connection_id, "WebSocket connection established");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<TurnEvent>(EVENT_BUFFER);

    let writer_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(session_id = %writer_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                debug!(session_id = %writer_id, "Socket closed while sending");
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue, // binary, ping, pong
            Err(e) => {
                warn!(session_id = %connection_id, error = %e, "WebSocket receive failed");
                let _ = tx.send(TurnEvent::Error(format!("Server error: {e}"))).await;
                break;
            }
        };

        dispatch(&state, &connection_id, text.as_str(), &tx).await;

        if tx.is_closed() {
            break;
        }
    }

    state.sessions.destroy(&connection_id).await;
    drop(tx);
    let _ = writer.await;
    info!(session_id = %connection_id, "WebSocket disconnected");
}

/// Handle one client frame for `connection_id`, reporting through `events`.
///
/// A `user_message` runs the whole turn before returning, so frames from
/// one connection are handled strictly in order.
pub async fn dispatch(
    state: &AppState,
    connection_id: &str,
    text: &str,
    events: &mpsc::Sender<TurnEvent>,
) {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(reply) => {
            warn!(session_id = %connection_id, reason = %reply, "Rejected client frame");
            let _ = events.send(TurnEvent::Error(reply)).await;
            return;
        }
    };

    match message {
        ClientMessage::StartChat { model } => {
            let model = model.unwrap_or_else(|| state.sessions.default_model().to_string());
            state.sessions.create(connection_id, &model).await;
            let _ = events
                .send(TurnEvent::Status(format!("New chat started with {model} model")))
                .await;
        }
        ClientMessage::LoadChat { history, model } => {
            let model = model.unwrap_or_else(|| state.sessions.default_model().to_string());
            let reply = match state.sessions.load(connection_id, history, &model).await {
                Ok(_) => TurnEvent::Status(format!("Loaded existing chat with {model} model")),
                Err(e) => TurnEvent::Error(e.to_string()),
            };
            let _ = events.send(reply).await;
        }
        ClientMessage::UserMessage { payload, model } => {
            let handle = state
                .sessions
                .get_or_create_default(connection_id, model.as_deref())
                .await;
            // Held for the whole turn: a second message for this session waits.
            let mut session = handle.lock().await;
            session.push_user(payload, model.as_deref());
            state.runner.run_turn(&mut session, events).await;
        }
    }
}
