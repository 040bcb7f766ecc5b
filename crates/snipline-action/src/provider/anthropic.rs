//! Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use snipline_core::types::{ProviderConfig, ProviderKind};

use super::{join_url, require_key, send_json, ProviderClient};
use crate::error::ActionError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The API rejects requests without `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Client for `/messages`. Structured output is requested through the
/// system prompt since the API has no schema parameter.
pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Endpoints may be configured with or without the `/messages` suffix.
    fn messages_url(endpoint: &str) -> String {
        let trimmed = endpoint.trim_end_matches('/');
        if trimmed.ends_with("/messages") {
            trimmed.to_string()
        } else {
            join_url(trimmed, "/messages")
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError> {
        let key = require_key(config)?;
        let url = Self::messages_url(&config.api_endpoint);
        info!(provider = %config.provider, model = %config.model, "Requesting message");

        let body = MessagesRequest {
            model: &config.model,
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            system: schema.map(|s| {
                format!(
                    "Respond only with a JSON document that conforms to this JSON schema:\n{}",
                    s
                )
            }),
        };

        let request = self
            .http
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = send_json(request, ProviderKind::Anthropic).await?;

        response
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ActionError::UnparsableResponse {
                provider: ProviderKind::Anthropic.to_string(),
                detail: "no text block in content".to_string(),
            })
    }
}
