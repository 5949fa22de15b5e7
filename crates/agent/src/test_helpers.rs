//! Shared test helpers for turn tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use joi_core::message::Message;
use joi_core::provider::{ModelAdapter, ResponseStream};
use joi_providers::AdapterRouter;
use tokio::sync::mpsc;

use crate::event::TurnEvent;

/// A model adapter that replies from a script.
///
/// The n-th request gets the n-th reply; once the script runs out the last
/// reply repeats, which makes an always-calling model a one-line script.
/// Replies are streamed word by word.
pub struct ScriptedAdapter {
    replies: Vec<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedAdapter {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: replies.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history the adapter was given on request `index`.
    pub fn seen(&self, index: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, messages: &[Message]) -> ResponseStream {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());

        let reply = self
            .replies
            .get(n)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();

        let (tx, stream) = ResponseStream::channel();
        tokio::spawn(async move {
            for fragment in reply.split_inclusive(' ') {
                if tx.send(fragment.to_string()).await.is_err() {
                    break;
                }
            }
        });
        stream
    }
}

/// A router whose only adapter is `adapter`, selected as "mock".
pub fn router_with(adapter: Arc<ScriptedAdapter>) -> Arc<AdapterRouter> {
    let mut router = AdapterRouter::new("mock");
    router.register(adapter);
    Arc::new(router)
}

/// Everything currently buffered in `rx`.
pub fn drain(rx: &mut mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Events other than `ai_chunk`.
pub fn non_chunks(events: &[TurnEvent]) -> Vec<TurnEvent> {
    events
        .iter()
        .filter(|e| !matches!(e, TurnEvent::Chunk(_)))
        .cloned()
        .collect()
}

/// Concatenation of every `ai_chunk` payload.
pub fn chunk_text(events: &[TurnEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Chunk(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
