//! Adapter router: maps model selectors to adapters.
//!
//! Sessions carry a selector string ("openai", "gemini", ...). The router
//! resolves it per round; an unknown selector is a provider fault like any
//! other and surfaces as error text in place of the reply.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use joi_core::message::Message;
use joi_core::provider::{ModelAdapter, ResponseStream};
use tracing::warn;

use crate::gemini::GeminiAdapter;
use crate::openai::OpenAiAdapter;

/// Routes model requests to the adapter behind a selector.
pub struct AdapterRouter {
    adapters: HashMap<String, Arc<dyn ModelAdapter>>,
    default_model: String,
}

impl AdapterRouter {
    /// Create a new router with a default selector.
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            adapters: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    /// Register an adapter under its own name.
    pub fn register(&mut self, adapter: Arc<dyn ModelAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Get a specific adapter by selector.
    pub fn get(&self, selector: &str) -> Option<Arc<dyn ModelAdapter>> {
        self.adapters.get(selector).cloned()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// List all registered selectors, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Which selectors have credentials, for the health endpoint.
    pub fn availability(&self) -> BTreeMap<String, bool> {
        self.adapters
            .iter()
            .map(|(name, adapter)| (name.clone(), adapter.is_configured()))
            .collect()
    }

    /// Stream a reply from the adapter behind `selector`.
    pub async fn stream(&self, selector: &str, messages: &[Message]) -> ResponseStream {
        match self.adapters.get(selector) {
            Some(adapter) => adapter.stream(messages).await,
            None => ResponseStream::single(self.unknown_selector(selector)),
        }
    }

    /// Whole reply from the adapter behind `selector`.
    pub async fn complete(&self, selector: &str, messages: &[Message]) -> String {
        match self.adapters.get(selector) {
            Some(adapter) => adapter.complete(messages).await,
            None => self.unknown_selector(selector),
        }
    }

    fn unknown_selector(&self, selector: &str) -> String {
        warn!(adapter = %selector, "Unknown model selector");
        format!(
            "Error: Unknown model '{}'. Available models: {}",
            selector,
            self.list().join(", ")
        )
    }
}

/// Build adapters from configuration.
///
/// `openai` and `gemini` are always present (unconfigured ones answer with
/// an error fragment); any other `[providers.<name>]` section gets an
/// OpenAI-compatible adapter.
pub fn build_from_config(config: &joi_config::AppConfig) -> AdapterRouter {
    let mut router = AdapterRouter::new(&config.default_model);

    router.register(Arc::new(OpenAiAdapter::from_config(
        "openai",
        crate::openai::DEFAULT_BASE_URL,
        &config.provider("openai"),
    )));
    router.register(Arc::new(GeminiAdapter::from_config(
        &config.provider("gemini"),
    )));

    for (name, provider_config) in &config.providers {
        if joi_config::KNOWN_PROVIDERS.contains(&name.as_str()) {
            continue;
        }
        let base_url = default_base_url(name);
        router.register(Arc::new(OpenAiAdapter::from_config(
            name,
            &base_url,
            provider_config,
        )));
    }

    if router.get(&config.default_model).is_none() {
        warn!(default_model = %config.default_model, "Default model has no adapter");
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => crate::openai::DEFAULT_BASE_URL.into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
