//! Google Gemini adapter (Generative Language API).
//!
//! Gemini has no system or tool role in `contents`: the system message goes
//! into `systemInstruction`, assistant turns become `model`, and tool results
//! are fed back as `user` turns. Consecutive turns with the same role are
//! merged into one content with several parts.

use async_trait::async_trait;
use joi_config::ProviderConfig;
use joi_core::error::ProviderError;
use joi_core::message::{Message, Role};
use joi_core::provider::{ModelAdapter, ResponseStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{http, sse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_TOP_P: f32 = 0.95;
const DEFAULT_TOP_K: u32 = 64;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const ERROR_PREFIX: &str = "Error communicating with Gemini API: ";

pub struct GeminiAdapter {
    base_url: String,
    api_key: Option<String>,
    model: String,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.into(),
            generation: GenerationConfig::default(),
            client: http::client(),
        }
    }

    /// Build from the `[providers.gemini]` section.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut adapter = Self::new(config.api_key.clone());
        if let Some(url) = &config.api_url {
            adapter = adapter.with_base_url(url);
        }
        if let Some(model) = &config.model {
            adapter.model = model.clone();
        }
        if let Some(t) = config.temperature {
            adapter.generation.temperature = t;
        }
        if let Some(p) = config.top_p {
            adapter.generation.top_p = p;
        }
        if let Some(k) = config.top_k {
            adapter.generation.top_k = k;
        }
        if let Some(m) = config.max_tokens {
            adapter.generation.max_output_tokens = m;
        }
        adapter
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&self, messages: &'a [Message]) -> GenerateRequest<'a> {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::System => {
                    system_parts.push(Part::text(&message.content));
                    continue;
                }
                Role::User | Role::ToolResult => "user",
                Role::Assistant => "model",
            };

            match contents.last_mut() {
                Some(last) if last.role == Some(role) => last.parts.push(Part::text(&message.content)),
                _ => contents.push(Content {
                    role: Some(role),
                    parts: vec![Part::text(&message.content)],
                }),
            }
        }

        GenerateRequest {
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: None,
                parts: system_parts,
            }),
            contents,
            generation_config: self.generation.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured("no API key configured for 'gemini'".into())
        })
    }

    async fn send(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key()?;
        let url = if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        };

        debug!(adapter = "gemini", model = %self.model, stream, messages = messages.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        http::check_status(response).await
    }

    async fn try_stream(&self, messages: &[Message]) -> Result<ResponseStream, ProviderError> {
        let response = self.send(messages, true).await?;
        Ok(sse::spawn_reader(
            response,
            "gemini".into(),
            ERROR_PREFIX.into(),
            parse_chunk,
        ))
    }

    async fn try_complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let response = self.send(messages, false).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;
        if body.candidates.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "No candidates in response".into(),
            ));
        }
        Ok(body.text())
    }
}

fn error_text(error: &ProviderError) -> String {
    warn!(adapter = "gemini", error = %error, "Model request failed");
    format!("{ERROR_PREFIX}{error}")
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, messages: &[Message]) -> ResponseStream {
        match self.try_stream(messages).await {
            Ok(stream) => stream,
            Err(e) => ResponseStream::single(error_text(&e)),
        }
    }

    async fn complete(&self, messages: &[Message]) -> String {
        match self.try_complete(messages).await {
            Ok(text) => text,
            Err(e) => error_text(&e),
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_chunk(data: &str) -> serde_json::Result<Option<String>> {
    let chunk: GenerateResponse = serde_json::from_str(data)?;
    Ok(Some(chunk.text()))
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Part<'a> {
    fn text(text: &'a str) -> Self {
        Self { text }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            response_mime_type: "text/plain",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_translated_and_merged() {
        let adapter = GeminiAdapter::new(Some("k".into()));
        let messages = vec![
            Message::system("Be brief."),
            Message::user("What OS is this?"),
            Message::assistant("TOOL_CALL::{\"tool\":\"sysinfo\",\"args\":{}}"),
            Message::tool_result("Sysinfo tool execution result for '{}':\n\nLinux"),
            Message::tool_result("Fs_list tool execution result for '{}':\n\nnotes.txt"),
        ];
        let body = serde_json::to_value(adapter.request_body(&messages)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(body["systemInstruction"].get("role").is_none());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn generation_config_defaults() {
        let adapter = GeminiAdapter::new(Some("k".into()));
        let body = serde_json::to_value(adapter.request_body(&[Message::user("hi")])).unwrap();
        let config = &body["generationConfig"];
        assert_eq!(config["topK"], 64);
        assert_eq!(config["maxOutputTokens"], 8192);
        assert_eq!(config["responseMimeType"], "text/plain");
        assert_eq!(adapter.model(), "gemini-2.5-flash");
    }

    #[test]
    fn parse_chunk_joins_parts() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(parse_chunk(data).unwrap().as_deref(), Some("Hello"));
        let empty = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{}}"#;
        assert_eq!(parse_chunk(empty).unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn missing_key_becomes_error_fragment() {
        let adapter = GeminiAdapter::new(None);
        assert!(!adapter.is_configured());
        let text = adapter.complete(&[Message::user("hi")]).await;
        assert!(text.starts_with("Error communicating with Gemini API: "));
    }
}
