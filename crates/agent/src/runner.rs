//! The turn runner: drives one user turn to completion.
//!
//! Per round: ask the session's model for a reply (streaming fragments out
//! as they arrive), append the reply as an assistant message, pull
//! `TOOL_CALL::` lines out of it, run each call in order and append every
//! result as a tool-result message. A reply without calls ends the turn.
//!
//! Rounds that ran tools are counted. Once `max_rounds` of them have run,
//! the model gets one closing reply. If that reply still asks for tools,
//! the calls are not executed and the turn ends with a warning.

use std::sync::Arc;

use joi_config::AppConfig;
use joi_core::message::Message;
use joi_core::protocol::{ToolCall, extract_tool_calls};
use joi_core::session::Session;
use joi_core::tool::ToolRegistry;
use joi_providers::AdapterRouter;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::event::{ToolResultPayload, TurnEvent};

/// Default bound on consecutive tool-executing rounds per turn.
pub const DEFAULT_MAX_ROUNDS: usize = 15;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model answered without calling a tool.
    Completed,
    /// The round bound was reached with tool calls still pending.
    RoundLimit,
    /// The event receiver went away; the turn stopped after the step in
    /// flight.
    Disconnected,
}

/// Summary of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Rounds in which at least one tool ran.
    pub rounds: usize,
    /// Tool calls executed across all rounds.
    pub tool_calls: usize,
    pub status: TurnStatus,
}

/// Runs turns against shared adapters and tools.
///
/// The runner holds no per-turn state; the round counter lives on the stack
/// of [`run_turn`](TurnRunner::run_turn), and the caller hands in the
/// session it has locked for the turn.
pub struct TurnRunner {
    adapters: Arc<AdapterRouter>,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    streaming: bool,
}

impl TurnRunner {
    pub fn new(adapters: Arc<AdapterRouter>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            adapters,
            tools,
            max_rounds: DEFAULT_MAX_ROUNDS,
            streaming: true,
        }
    }

    /// Runner with `max_tool_rounds` and `streaming` taken from config.
    pub fn from_config(
        adapters: Arc<AdapterRouter>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self::new(adapters, tools)
            .with_max_rounds(config.max_tool_rounds)
            .with_streaming(config.streaming)
    }

    /// Set the bound on tool-executing rounds. Zero is treated as one.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Stream fragments as they arrive, or fetch each reply whole.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn adapters(&self) -> &Arc<AdapterRouter> {
        &self.adapters
    }

    /// Run one turn on `session`, whose last message is the user's.
    ///
    /// Never fails: provider faults arrive as reply text, tool faults as
    /// result text. If `events` is closed the turn finishes the step in
    /// flight, records it in history, and returns
    /// [`TurnStatus::Disconnected`].
    pub async fn run_turn(
        &self,
        session: &mut Session,
        events: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        let mut sink = EventSink::new(events);
        let mut outcome = TurnOutcome {
            rounds: 0,
            tool_calls: 0,
            status: TurnStatus::Completed,
        };

        info!(
            session_id = %session.id(),
            model = %session.model(),
            messages = session.messages().len(),
            "Starting turn"
        );

        loop {
            let reply = self.model_reply(session, &mut sink).await;
            append(session, Message::assistant(reply.clone()));

            if !sink.connected {
                outcome.status = TurnStatus::Disconnected;
                break;
            }

            let calls = extract_tool_calls(&reply, &self.tools);
            if calls.is_empty() {
                break;
            }

            // Calls left over after the last allowed round are not run.
            if outcome.rounds >= self.max_rounds {
                warn!(
                    session_id = %session.id(),
                    rounds = outcome.rounds,
                    pending = calls.len(),
                    "Tool round limit reached"
                );
                sink.emit(TurnEvent::Warning(format!(
                    "Reached maximum consecutive tool calls limit ({})",
                    self.max_rounds
                )))
                .await;
                outcome.status = TurnStatus::RoundLimit;
                break;
            }

            outcome.rounds += 1;
            debug!(session_id = %session.id(), round = outcome.rounds, calls = calls.len(), "Executing tool round");

            let total = calls.len();
            for (i, call) in calls.iter().enumerate() {
                sink.emit(TurnEvent::ToolStatus(format!(
                    "Executing tool call {}/{}: {}",
                    i + 1,
                    total,
                    call.name
                )))
                .await;

                let result = self.tools.execute(&call.name, &call.args).await;
                outcome.tool_calls += 1;

                sink.emit(TurnEvent::ToolResult(ToolResultPayload {
                    tool: call.name.clone(),
                    args: Value::Object(call.args.clone()),
                    result: result.clone(),
                }))
                .await;
                append(session, Message::tool_result(self.history_entry(call, &result)));

                if !sink.connected {
                    break;
                }
            }

            if !sink.connected {
                outcome.status = TurnStatus::Disconnected;
                break;
            }

            sink.emit(TurnEvent::Status(format!(
                "Processing tool call {}/{}",
                outcome.rounds, self.max_rounds
            )))
            .await;
        }

        info!(
            session_id = %session.id(),
            rounds = outcome.rounds,
            tool_calls = outcome.tool_calls,
            status = ?outcome.status,
            "Turn finished"
        );
        outcome
    }

    /// History text for a tool result.
    pub fn history_entry(&self, call: &ToolCall, result: &str) -> String {
        format!(
            "{} tool execution result for '{}':\n\n{}",
            self.tools.label(&call.name),
            call.args_json(),
            result
        )
    }

    /// Get the model's reply for the current history, forwarding fragments.
    async fn model_reply(&self, session: &Session, sink: &mut EventSink<'_>) -> String {
        let selector = session.model();

        if !self.streaming {
            let text = self.adapters.complete(selector, session.messages()).await;
            if !text.is_empty() {
                sink.emit(TurnEvent::Chunk(text.clone())).await;
            }
            return text;
        }

        let mut stream = self.adapters.stream(selector, session.messages()).await;
        while let Some(fragment) = stream.next_fragment().await {
            // Keep draining after a disconnect so history gets the whole reply.
            sink.emit(TurnEvent::Chunk(fragment)).await;
        }
        stream.text().to_string()
    }
}

fn append(session: &mut Session, message: Message) {
    if let Err(e) = session.append(message) {
        error!(session_id = %session.id(), error = %e, "Failed to append message to history");
    }
}

/// Forwards events until the receiver goes away, then remembers that it did.
struct EventSink<'a> {
    tx: &'a mpsc::Sender<TurnEvent>,
    connected: bool,
}

impl<'a> EventSink<'a> {
    fn new(tx: &'a mpsc::Sender<TurnEvent>) -> Self {
        Self {
            tx,
            connected: !tx.is_closed(),
        }
    }

    async fn emit(&mut self, event: TurnEvent) {
        if !self.connected {
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped; finishing the current step");
            self.connected = false;
        }
    }
}
