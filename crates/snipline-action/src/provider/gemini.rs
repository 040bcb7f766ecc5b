//! Google Gemini `generateContent`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use snipline_core::types::{ProviderConfig, ProviderKind};

use super::{extract_text, join_url, require_key, send_json, ProviderClient};
use crate::error::ActionError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

/// Client for `{endpoint}/{model}:generateContent`. Schemas use the native
/// `responseSchema` parameter.
pub struct GeminiClient {
    http: Client,
}

impl GeminiClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    fn build_body<'a>(
        config: &ProviderConfig,
        prompt: &'a str,
        schema: Option<&'a Value>,
    ) -> GenerateRequest<'a> {
        let generation_config = if config.max_tokens.is_some() || schema.is_some() {
            Some(GenerationConfig {
                max_output_tokens: config.max_tokens,
                response_mime_type: schema.map(|_| "application/json"),
                response_schema: schema,
            })
        } else {
            None
        };
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError> {
        let key = require_key(config)?;
        let url = join_url(
            &config.api_endpoint,
            &format!("/{}:generateContent", config.model),
        );
        info!(provider = %config.provider, model = %config.model, "Requesting content generation");

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&Self::build_body(config, prompt, schema));
        let body = send_json(request, ProviderKind::Gemini).await?;
        extract_text(&body, "/candidates/0/content/parts/0/text", ProviderKind::Gemini)
    }
}
