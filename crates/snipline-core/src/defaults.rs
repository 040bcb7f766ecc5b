//! Settings written on first run.

use std::collections::BTreeMap;

use crate::types::{
    FeatureSettings, HttpMethod, PromptConfig, ProviderConfig, ProviderKind, SearchEngine,
    WebhookConfig,
};

pub const POST_TEST_WEBHOOK_ID: &str = "post-test-webhook";
pub const GET_TEST_WEBHOOK_ID: &str = "get-test-webhook";

const TRANSLATION_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "source_language_content": {
      "type": "string"
    },
    "target_language_content": {
      "type": "string"
    }
  },
  "required": [
    "source_language_content",
    "target_language_content"
  ]
}"#;

fn provider(
    id: &str,
    kind: ProviderKind,
    endpoint: &str,
    model: &str,
    max_tokens: u32,
) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        provider: kind,
        model: model.to_string(),
        api_endpoint: endpoint.to_string(),
        api_key: None,
        max_tokens: Some(max_tokens),
    }
}

/// One config per supported back-end, keys left empty.
pub fn providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "openai",
            ProviderKind::OpenAI,
            "https://api.openai.com/v1",
            "gpt-4o",
            4096,
        ),
        provider(
            "groq",
            ProviderKind::Groq,
            "https://api.groq.com/openai/v1",
            "deepseek-r1-distill-llama-70b",
            4096,
        ),
        provider(
            "gemini",
            ProviderKind::Gemini,
            "https://generativelanguage.googleapis.com/v1beta/models",
            "gemini-2.0-flash",
            4096,
        ),
        provider(
            "grok",
            ProviderKind::Grok,
            "https://api.x.ai/v1",
            "grok-3-latest",
            2048,
        ),
        provider(
            "anthropic",
            ProviderKind::Anthropic,
            "https://api.anthropic.com/v1/messages",
            "claude-3-opus-latest",
            50000,
        ),
        provider(
            "ollama",
            ProviderKind::Ollama,
            "http://localhost:11434",
            "llama3.1:8b",
            2048,
        ),
    ]
}

pub fn prompts() -> Vec<PromptConfig> {
    vec![
        PromptConfig {
            id: "summary".to_string(),
            name: "Summarize".to_string(),
            provider_config_id: "openai".to_string(),
            template: "Summarize the key points of the following:\n{{text}}".to_string(),
            response_schema: None,
            enabled: true,
            webhook_id: Some(POST_TEST_WEBHOOK_ID.to_string()),
        },
        PromptConfig {
            id: "translate".to_string(),
            name: "Translate to Traditional Chinese".to_string(),
            provider_config_id: "gemini".to_string(),
            template: "Translate the following text into plain Traditional Chinese:\n{{text}}"
                .to_string(),
            response_schema: Some(TRANSLATION_SCHEMA.to_string()),
            enabled: true,
            webhook_id: Some(POST_TEST_WEBHOOK_ID.to_string()),
        },
        PromptConfig {
            id: "rewrite".to_string(),
            name: "Rewrite".to_string(),
            provider_config_id: "groq".to_string(),
            template: "Rewrite the following article as a new article:\n{{text}}".to_string(),
            response_schema: None,
            enabled: true,
            webhook_id: Some(POST_TEST_WEBHOOK_ID.to_string()),
        },
    ]
}

pub fn webhooks() -> Vec<WebhookConfig> {
    let headers = BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]);
    vec![
        WebhookConfig {
            id: POST_TEST_WEBHOOK_ID.to_string(),
            name: "POST - Test Webhook".to_string(),
            url: "http://localhost:5678/webhook-test/n8n".to_string(),
            method: HttpMethod::Post,
            headers: headers.clone(),
            body: Some(r#"{ "test": "{{text}}" }"#.to_string()),
            enabled: true,
        },
        WebhookConfig {
            id: GET_TEST_WEBHOOK_ID.to_string(),
            name: "GET - Test Webhook".to_string(),
            url: "http://localhost:5678/webhook-test/n8n?text={{text}}".to_string(),
            method: HttpMethod::Get,
            headers,
            body: None,
            enabled: true,
        },
    ]
}

fn engine(id: &str, name: &str, url: &str, query_template: &str) -> SearchEngine {
    SearchEngine {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        enabled: true,
        query_template: Some(query_template.to_string()),
    }
}

pub fn search_engines() -> Vec<SearchEngine> {
    vec![
        engine(
            "chatgpt",
            "ChatGPT - 5W2H explanation",
            "https://chatgpt.com/?hints=search&q=%s",
            "Explain {{text}} in detail using 5W2H",
        ),
        engine(
            "grok",
            "Grok - pros and cons",
            "https://grok.com/?q=%s",
            "Analyse the pros and cons of:\n{{text}}",
        ),
        engine(
            "perplexity",
            "Perplexity - related results",
            "https://www.perplexity.ai/?q=%s&copilot=true",
            "Find information related to {{text}}",
        ),
        engine(
            "felo",
            "Felo - latest results",
            "https://felo.ai/search?q=%s",
            "Give me the latest information on {{text}}",
        ),
    ]
}

pub fn features() -> FeatureSettings {
    FeatureSettings::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_prompt_binds_a_known_provider() {
        let provider_ids: HashSet<String> = providers().into_iter().map(|p| p.id).collect();
        for prompt in prompts() {
            assert!(
                provider_ids.contains(&prompt.provider_config_id),
                "prompt {} references unknown provider",
                prompt.name
            );
        }
    }

    #[test]
    fn test_prompt_webhooks_resolve_to_post() {
        let hooks = webhooks();
        for prompt in prompts() {
            let id = prompt.webhook_id.unwrap();
            let hook = hooks.iter().find(|w| w.id == id).unwrap();
            assert_eq!(hook.method, HttpMethod::Post);
        }
    }

    #[test]
    fn test_names_and_ids_unique() {
        let names: HashSet<String> = prompts().into_iter().map(|p| p.name).collect();
        assert_eq!(names.len(), prompts().len());
        let ids: HashSet<String> = webhooks().into_iter().map(|w| w.id).collect();
        assert_eq!(ids.len(), webhooks().len());
    }

    #[test]
    fn test_translation_schema_is_valid_json() {
        let prompt = prompts().into_iter().find(|p| p.id == "translate").unwrap();
        let schema: serde_json::Value =
            serde_json::from_str(prompt.response_schema.as_deref().unwrap()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn test_search_engines_have_query_slot() {
        for e in search_engines() {
            assert!(e.url.contains("%s"), "{} has no %s", e.id);
        }
    }

    #[test]
    fn test_default_keys_are_empty() {
        assert!(providers().iter().all(|p| p.api_key.is_none()));
        assert!(!features().webhook);
    }
}
