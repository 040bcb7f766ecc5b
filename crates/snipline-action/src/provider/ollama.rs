//! Ollama `/api/chat`. Self-hosted, so no key is required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use snipline_core::types::{ProviderConfig, ProviderKind};

use super::{extract_text, join_url, send_json, ProviderClient};
use crate::error::ActionError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct Options {
    num_predict: u32,
}

pub struct OllamaClient {
    http: Client,
}

impl OllamaClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ProviderClient for OllamaClient {
    async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError> {
        let url = join_url(&config.api_endpoint, "/api/chat");
        info!(provider = %config.provider, model = %config.model, "Requesting local chat");

        let body = ChatRequest {
            model: &config.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            stream: false,
            format: schema,
            options: config.max_tokens.map(|n| Options { num_predict: n }),
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = config.api_key() {
            request = request.bearer_auth(key);
        }
        let response = send_json(request, ProviderKind::Ollama).await?;
        extract_text(&response, "/message/content", ProviderKind::Ollama)
    }
}
