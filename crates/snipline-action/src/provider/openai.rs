//! OpenAI-compatible chat completions (OpenAI, Groq, Grok, custom endpoints).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use snipline_core::types::ProviderConfig;

use super::{extract_text, join_url, require_key, send_json, ProviderClient};
use crate::error::ActionError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Client for `/chat/completions` with bearer auth.
///
/// A schema is requested through `response_format: json_object` plus a
/// system message carrying the schema text.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    fn build_body<'a>(
        config: &'a ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> ChatRequest<'a> {
        let mut messages = vec![ChatMessage {
            role: "user",
            content: prompt.to_string(),
        }];
        if let Some(schema) = schema {
            messages.push(ChatMessage {
                role: "system",
                content: format!("json:{}", schema),
            });
        }
        ChatRequest {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            response_format: schema.map(|_| ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn complete(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ActionError> {
        let key = require_key(config)?;
        let url = join_url(&config.api_endpoint, "/chat/completions");
        info!(provider = %config.provider, model = %config.model, "Requesting chat completion");

        let request = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&Self::build_body(config, prompt, schema));
        let body = send_json(request, config.provider).await?;
        extract_text(&body, "/choices/0/message/content", config.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use snipline_core::types::ProviderKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> ProviderConfig {
        ProviderConfig {
            id: "openai".to_string(),
            provider: ProviderKind::OpenAI,
            model: "gpt-4o".to_string(),
            api_endpoint: endpoint,
            api_key: Some("sk-test".to_string()),
            max_tokens: Some(256),
        }
    }

    #[tokio::test]
    async fn test_completion_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new());
        let out = client
            .complete(&config(format!("{}/v1", server.uri())), "hello", None)
            .await
            .unwrap();
        assert_eq!(out, "hi there");
    }

    #[tokio::test]
    async fn test_schema_adds_response_format_and_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "user", "content": "translate"},
                    {"role": "system", "content": "json:{\"type\":\"object\"}"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"a\":1}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new());
        let schema = json!({"type": "object"});
        let out = client
            .complete(&config(server.uri()), "translate", Some(&schema))
            .await
            .unwrap();
        assert_eq!(out, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.api_key = None;
        let err = OpenAiClient::new(Client::new())
            .complete(&cfg, "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_non_2xx_preserves_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let err = OpenAiClient::new(Client::new())
            .complete(&config(server.uri()), "hello", None)
            .await
            .unwrap_err();
        match err {
            ActionError::Provider(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Incorrect API key provided"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_unparsable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "?"})))
            .mount(&server)
            .await;

        let err = OpenAiClient::new(Client::new())
            .complete(&config(server.uri()), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::UnparsableResponse { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let err = OpenAiClient::new(Client::new())
            .complete(&config("http://127.0.0.1:1".to_string()), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Transport(_)));
    }
}
