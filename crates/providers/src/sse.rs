//! Server-sent events plumbing shared by the streaming adapters.
//!
//! Both providers stream `data: {...}` lines. A spawned reader task turns the
//! HTTP byte stream into text fragments on an mpsc channel; each adapter only
//! supplies the function that pulls text out of one JSON payload.

use futures::StreamExt;
use joi_core::error::ProviderError;
use joi_core::provider::ResponseStream;
use tracing::{trace, warn};

/// One complete SSE line of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// The payload of a `data:` line.
    Data(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Reassembles SSE lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        // Split on raw bytes so a UTF-8 sequence cut across chunks stays intact
        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&line))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    // Skip empty lines, comments, and non-data fields
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_string()))
}

/// Spawn the reader task for a successful streaming response.
///
/// `extract` pulls the text delta out of one `data:` payload; payloads it
/// can't parse are skipped. A transport failure mid-stream becomes a final
/// fragment starting with `error_prefix`.
pub(crate) fn spawn_reader<F>(
    response: reqwest::Response,
    adapter: String,
    error_prefix: String,
    extract: F,
) -> ResponseStream
where
    F: Fn(&str) -> serde_json::Result<Option<String>> + Send + 'static,
{
    let (tx, stream) = ResponseStream::channel();

    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    let fault = ProviderError::StreamInterrupted(e.to_string());
                    warn!(adapter = %adapter, error = %fault, "Stream interrupted");
                    let _ = tx.send(format!("{error_prefix}{fault}")).await;
                    return;
                }
            };

            for event in lines.push(&bytes) {
                match event {
                    SseEvent::Done => return,
                    SseEvent::Data(data) => match extract(&data) {
                        Ok(Some(text)) if !text.is_empty() => {
                            if tx.send(text).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            trace!(adapter = %adapter, data = %data, error = %e, "Ignoring unparseable SSE chunk");
                        }
                    },
                }
            }
        }

        if let Some(SseEvent::Data(data)) = lines.finish()
            && let Ok(Some(text)) = extract(&data)
        {
            let _ = tx.send(text).await;
        }
    });

    stream
}
