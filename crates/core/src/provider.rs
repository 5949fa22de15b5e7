//! Model adapter trait: the abstraction over LLM backends.
//!
//! An adapter knows how to send a canonical conversation to one provider and
//! stream the reply back as text fragments. Adapters are infallible at this
//! boundary: a provider fault becomes a single error fragment, so the agent
//! loop treats it exactly like any other assistant reply.
//!
//! Implementations: OpenAI-compatible chat completions, Google Gemini.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::Message;

/// Capacity of the fragment channel between an adapter's reader task and
/// the consumer.
pub const FRAGMENT_BUFFER: usize = 64;

/// A finite, non-restartable stream of response fragments.
///
/// The stream accumulates everything it yields; once [`next_fragment`]
/// returns `None`, [`text`] is the full response.
///
/// [`next_fragment`]: ResponseStream::next_fragment
/// [`text`]: ResponseStream::text
#[derive(Debug)]
pub struct ResponseStream {
    rx: mpsc::Receiver<String>,
    text: String,
    finished: bool,
}

impl ResponseStream {
    /// Wrap the receiving end of a fragment channel.
    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self {
            rx,
            text: String::new(),
            finished: false,
        }
    }

    /// Create a fragment channel and the stream reading from it.
    pub fn channel() -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        (tx, Self::from_receiver(rx))
    }

    /// A stream that yields exactly one fragment.
    ///
    /// Used for non-streaming responses and for provider error text.
    pub fn single(text: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(text.into());
        Self::from_receiver(rx)
    }

    /// Wait for the next fragment. Returns `None` once the stream is done.
    pub async fn next_fragment(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Some(fragment) if fragment.is_empty() => continue,
                Some(fragment) => {
                    self.text.push_str(&fragment);
                    return Some(fragment);
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    /// Everything received so far (the full response once finished).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain the remaining fragments and return the full text.
    pub async fn collect_text(mut self) -> String {
        while self.next_fragment().await.is_some() {}
        self.text
    }
}

/// The core model adapter trait.
///
/// The agent loop calls `stream()` (or `complete()` when streaming is
/// disabled) without knowing which provider is behind it.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// The selector this adapter answers to (e.g., "openai", "gemini").
    fn name(&self) -> &str;

    /// Send the conversation and stream the reply.
    ///
    /// Never fails: provider errors are rendered as the stream's only fragment.
    async fn stream(&self, messages: &[Message]) -> ResponseStream;

    /// Send the conversation and wait for the whole reply.
    ///
    /// Default implementation drains `stream()`.
    async fn complete(&self, messages: &[Message]) -> String {
        self.stream(messages).await.collect_text().await
    }

    /// Whether the adapter has credentials to attempt a request.
    fn is_configured(&self) -> bool {
        true
    }
}
