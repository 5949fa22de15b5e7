//! Sessions and the session store.
//!
//! A session is one connection's conversation: its history and the model
//! selector currently answering it. The history always starts with exactly
//! one system message.
//!
//! Each session sits behind its own `tokio::sync::Mutex`. A turn holds that
//! lock from the user message until the loop is done, so a second message
//! for the same session queues behind the first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::message::{Message, Role};

/// Shared handle to a live session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// One conversation's state.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    messages: Vec<Message>,
    model: String,
    created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session holding only the system prompt.
    pub fn new(id: impl Into<String>, model: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            id: id.into(),
            messages: vec![Message::system(system_prompt)],
            model: model.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a session from caller-supplied history.
    ///
    /// If no system message is present the prompt is inserted at position 0.
    /// A system message found later in the history is moved to the front, and
    /// any further system messages are dropped.
    pub fn from_history(
        id: impl Into<String>,
        model: impl Into<String>,
        system_prompt: &str,
        history: Vec<Message>,
    ) -> Result<Self, SessionError> {
        if history.is_empty() {
            return Err(SessionError::NoHistory);
        }

        let mut system = None;
        let mut rest = Vec::with_capacity(history.len());
        for message in history {
            match message.role {
                Role::System if system.is_none() => system = Some(message),
                Role::System => warn!("Dropping extra system message from loaded history"),
                _ => rest.push(message),
            }
        }

        let mut messages = Vec::with_capacity(rest.len() + 1);
        messages.push(system.unwrap_or_else(|| Message::system(system_prompt)));
        messages.extend(rest);

        Ok(Self {
            id: id.into(),
            messages,
            model: model.into(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The active model selector.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switch the model selector for this and all later turns.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a user, assistant or tool-result message.
    pub fn append(&mut self, message: Message) -> Result<(), SessionError> {
        if message.role == Role::System {
            return Err(SessionError::SystemMessageAppend);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append a user message, optionally switching the model selector first.
    pub fn push_user(&mut self, text: impl Into<String>, model_override: Option<&str>) {
        if let Some(model) = model_override {
            self.model = model.to_string();
        }
        self.messages.push(Message::user(text));
    }
}

/// Owns every live session, keyed by connection id.
#[derive(Debug)]
pub struct SessionStore {
    system_prompt: String,
    default_model: String,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new(system_prompt: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            default_model: default_model.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Start a new chat, replacing any existing session under `id`.
    pub async fn create(&self, id: &str, model: &str) -> SessionHandle {
        let session = Session::new(id, model, &self.system_prompt);
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.to_string(), handle.clone());
        info!(session_id = %id, model = %model, "New chat started");
        handle
    }

    /// Replace the session under `id` with caller-supplied history.
    ///
    /// An empty history is rejected and leaves the store untouched.
    pub async fn load(
        &self,
        id: &str,
        history: Vec<Message>,
        model: &str,
    ) -> Result<SessionHandle, SessionError> {
        let session = Session::from_history(id, model, &self.system_prompt, history)?;
        let len = session.messages().len();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.to_string(), handle.clone());
        info!(session_id = %id, model = %model, messages = len, "Loaded existing chat");
        Ok(handle)
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Fetch the session under `id`, creating one if none exists.
    ///
    /// A new session uses `model` when given, otherwise the store default.
    pub async fn get_or_create_default(&self, id: &str, model: Option<&str>) -> SessionHandle {
        if let Some(handle) = self.get(id).await {
            return handle;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                let model = model.unwrap_or(self.default_model.as_str());
                debug!(session_id = %id, model = %model, "Creating default session");
                Arc::new(Mutex::new(Session::new(id, model, &self.system_prompt)))
            })
            .clone()
    }

    /// Append a user message to `id`, creating the session if needed.
    /// A model override sticks for later turns.
    pub async fn append_user_message(
        &self,
        id: &str,
        text: &str,
        model_override: Option<&str>,
    ) -> SessionHandle {
        let handle = self.get_or_create_default(id, model_override).await;
        handle.lock().await.push_user(text, model_override);
        handle
    }

    /// Append an assistant or tool-result message to an existing session.
    pub async fn append_message(&self, id: &str, message: Message) -> Result<(), SessionError> {
        let handle = self
            .get(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        handle.lock().await.append(message)
    }

    /// Drop the session under `id`. Returns whether one existed.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "Session destroyed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
