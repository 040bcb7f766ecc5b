//! AI completion providers.
//!
//! Each back-end family implements [`ProviderClient`]; the
//! [`ProviderRegistry`] picks the client for a config's [`ProviderKind`].

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, info};

use snipline_core::types::{ProviderConfig, ProviderKind};

use crate::error::ActionError;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// One request/response cycle against an AI back-end.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send `prompt` and return the completion text.
    ///
    /// `schema` is a parsed JSON schema asking for structured output.
    async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError>;
}

/// Clients keyed by provider kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a client for every [`ProviderKind`], sharing one HTTP
    /// client.
    pub fn with_defaults(http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        let openai: Arc<dyn ProviderClient> = Arc::new(OpenAiClient::new(http.clone()));
        for kind in [
            ProviderKind::OpenAI,
            ProviderKind::Groq,
            ProviderKind::Grok,
            ProviderKind::Custom,
        ] {
            registry.register(kind, Arc::clone(&openai));
        }
        registry.register(
            ProviderKind::Anthropic,
            Arc::new(AnthropicClient::new(http.clone())),
        );
        registry.register(ProviderKind::Gemini, Arc::new(GeminiClient::new(http.clone())));
        registry.register(ProviderKind::Ollama, Arc::new(OllamaClient::new(http)));
        registry
    }

    pub fn register(&mut self, kind: ProviderKind, client: Arc<dyn ProviderClient>) {
        info!(provider = %kind, "Registered provider client");
        self.clients.insert(kind, client);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&kind).cloned()
    }

    /// Resolve the client for `config` and run one completion.
    pub async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError> {
        let client = self.get(config.provider).ok_or_else(|| {
            ActionError::config(format!("No client registered for provider {}", config.provider))
        })?;
        client.complete(config, prompt, schema).await
    }
}

/// The configured key, or `MissingCredential`.
pub(crate) fn require_key(config: &ProviderConfig) -> Result<&str, ActionError> {
    config
        .api_key()
        .ok_or_else(|| ActionError::MissingCredential(config.provider.to_string()))
}

/// `base` with any trailing slash removed, followed by `suffix`.
pub(crate) fn join_url(base: &str, suffix: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), suffix)
}

/// Pull a human-readable message out of a provider error body.
///
/// Handles `{"error": {"message": ...}}` and `{"error": "..."}`.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(obj.clone()).to_string())),
        _ => None,
    }
}

/// Send `request` and return the parsed JSON body.
///
/// Non-2xx statuses and bodies carrying an `error` field become
/// `ActionError::Provider` with the provider's own message.
pub(crate) async fn send_json(
    request: RequestBuilder,
    provider: ProviderKind,
) -> Result<Value, ActionError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    debug!(provider = %provider, status = status.as_u16(), bytes = text.len(), "Provider responded");

    let parsed: Result<Value, _> = serde_json::from_str(&text);

    if !status.is_success() {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(error_message)
            .unwrap_or(text);
        return Err(ActionError::Provider(format!(
            "{} API error ({}): {}",
            provider,
            status.as_u16(),
            message
        )));
    }

    let body = parsed.map_err(|e| ActionError::UnparsableResponse {
        provider: provider.to_string(),
        detail: format!("invalid JSON: {}", e),
    })?;

    if let Some(message) = error_message(&body) {
        return Err(ActionError::Provider(format!("{} API error: {}", provider, message)));
    }
    Ok(body)
}

/// Read a string at `pointer` in `body`, or report the shape mismatch.
pub(crate) fn extract_text(
    body: &Value,
    pointer: &str,
    provider: ProviderKind,
) -> Result<String, ActionError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ActionError::UnparsableResponse {
            provider: provider.to_string(),
            detail: format!("no text at {} in {}", pointer, truncate_for_error(body)),
        })
}

fn truncate_for_error(body: &Value) -> String {
    const MAX: usize = 300;
    let s = body.to_string();
    if s.len() <= MAX {
        return s;
    }
    let cut = (0..=MAX).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
    format!("{}...", &s[..cut])
}
