//! OpenAI-compatible adapter.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Groq, and any endpoint that
//! speaks `/v1/chat/completions`.
//!
//! Supports:
//! - Streaming SSE completions (`data:` lines, `[DONE]` terminator)
//! - Plain, non-streaming completions

use async_trait::async_trait;
use joi_config::ProviderConfig;
use joi_core::error::ProviderError;
use joi_core::message::{Message, Role};
use joi_core::provider::{ModelAdapter, ResponseStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{http, sse};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_TOP_P: f32 = 1.0;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// An OpenAI-compatible chat completions adapter.
pub struct OpenAiAdapter {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    error_prefix: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Create a new OpenAI-compatible adapter.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let name = name.into();
        let error_prefix = if name == "openai" {
            "Error with OpenAI API: ".to_string()
        } else {
            format!("Error with {name} API: ")
        };

        Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
            error_prefix,
            client: http::client(),
        }
    }

    /// The stock OpenAI endpoint (convenience constructor).
    pub fn openai(api_key: Option<String>) -> Self {
        Self::new("openai", DEFAULT_BASE_URL, api_key)
    }

    /// Build from a `[providers.<name>]` section.
    pub fn from_config(name: &str, base_url: &str, config: &ProviderConfig) -> Self {
        let mut adapter = Self::new(
            name,
            config.api_url.as_deref().unwrap_or(base_url),
            config.api_key.clone(),
        );
        if let Some(model) = &config.model {
            adapter.model = model.clone();
        }
        if let Some(t) = config.temperature {
            adapter.temperature = t;
        }
        if let Some(p) = config.top_p {
            adapter.top_p = p;
        }
        if let Some(m) = config.max_tokens {
            adapter.max_tokens = m;
        }
        adapter
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Translate canonical roles: tool results travel as system messages.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::ToolResult => "system",
                },
                content: &m.content,
            })
            .collect()
    }

    fn request_body(&self, messages: &[Message], stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("no API key configured for '{}'", self.name))
        })
    }

    async fn send(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        debug!(adapter = %self.name, model = %self.model, stream, messages = messages.len(), "Sending chat completion request");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(messages, stream));
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        http::check_status(response).await
    }

    async fn try_stream(&self, messages: &[Message]) -> Result<ResponseStream, ProviderError> {
        let response = self.send(messages, true).await?;
        Ok(sse::spawn_reader(
            response,
            self.name.clone(),
            self.error_prefix.clone(),
            parse_stream_chunk,
        ))
    }

    async fn try_complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let response = self.send(messages, false).await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    fn error_text(&self, error: &ProviderError) -> String {
        warn!(adapter = %self.name, error = %error, "Model request failed");
        format!("{}{}", self.error_prefix, error)
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, messages: &[Message]) -> ResponseStream {
        match self.try_stream(messages).await {
            Ok(stream) => stream,
            Err(e) => ResponseStream::single(self.error_text(&e)),
        }
    }

    async fn complete(&self, messages: &[Message]) -> String {
        match self.try_complete(messages).await {
            Ok(text) => text,
            Err(e) => self.error_text(&e),
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Text delta from one streaming chunk.
fn parse_stream_chunk(data: &str) -> serde_json::Result<Option<String>> {
    let chunk: StreamResponse = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
