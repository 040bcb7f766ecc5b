//! Text capture entry points.
//!
//! Each capture appends a fresh history record, then optionally runs an
//! action against it through the [`Dispatcher`].

use serde::Serialize;
use tracing::info;

use snipline_core::template;
use snipline_core::types::{HistoryRecord, RecordId, SearchEngine};

use crate::dispatcher::Dispatcher;
use crate::error::ActionError;
use crate::types::{
    ActionCatalog, ActionRequest, ActionResponse, CatalogEntry, PromptAction, PromptEntry,
    WebhookAction, WebhookEntry,
};

/// A captured record and the outcome of the action run against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOutcome {
    pub record_id: RecordId,
    pub response: ActionResponse,
}

/// Result of a search capture: where to send the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub url: String,
    pub record_id: RecordId,
}

#[derive(Clone)]
pub struct CaptureService {
    dispatcher: Dispatcher,
}

impl CaptureService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Store `text` as a new history record.
    pub async fn save_text(
        &self,
        text: &str,
        source_url: Option<String>,
    ) -> Result<HistoryRecord, ActionError> {
        ensure_text(text)?;
        let record = HistoryRecord::new(text, source_url);
        self.dispatcher.ledger().append(record.clone()).await?;
        info!(record_id = %record.id, chars = text.chars().count(), "Text captured");
        Ok(record)
    }

    /// Build the search URL for `engine_id` and record the text.
    pub async fn search(
        &self,
        engine_id: &str,
        text: &str,
        source_url: Option<String>,
    ) -> Result<SearchOutcome, ActionError> {
        ensure_text(text)?;
        let engine = self.dispatcher.resolver().search_engine(engine_id)?;
        if !engine.enabled {
            return Err(ActionError::config(format!(
                "Search engine is disabled: {}",
                engine.name
            )));
        }
        let url = search_url(&engine, text);
        let record = self.save_text(text, source_url).await?;
        info!(record_id = %record.id, engine = %engine.id, "Search captured");
        Ok(SearchOutcome {
            url,
            record_id: record.id,
        })
    }

    /// Capture `text` and run the named prompt against it.
    pub async fn capture_and_prompt(
        &self,
        prompt_name: &str,
        text: &str,
        source_url: Option<String>,
    ) -> Result<CaptureOutcome, ActionError> {
        ensure_text(text)?;
        let prompt = self.dispatcher.resolver().prompt(prompt_name)?;
        let record = self.save_text(text, source_url).await?;
        let response = self
            .dispatcher
            .dispatch(ActionRequest::ExecutePrompt(PromptAction {
                record_id: record.id,
                prompt_name: prompt.name,
                text: text.to_string(),
            }))
            .await;
        Ok(CaptureOutcome {
            record_id: record.id,
            response,
        })
    }

    /// Capture `text` and send it to an enabled webhook.
    pub async fn capture_and_webhook(
        &self,
        webhook_id: &str,
        text: &str,
        source_url: Option<String>,
    ) -> Result<CaptureOutcome, ActionError> {
        ensure_text(text)?;
        let webhook = self.dispatcher.resolver().webhook(webhook_id)?;
        if !webhook.enabled {
            return Err(ActionError::config(format!(
                "Webhook is disabled: {}",
                webhook.name
            )));
        }
        let record = self.save_text(text, source_url).await?;
        let response = self
            .dispatcher
            .dispatch(ActionRequest::ExecuteWebhook(WebhookAction {
                record_id: record.id,
                webhook_id: webhook.id,
                text: text.to_string(),
            }))
            .await;
        Ok(CaptureOutcome {
            record_id: record.id,
            response,
        })
    }

    /// Actions currently offered for selected text, gated by feature flags.
    pub fn catalog(&self) -> Result<ActionCatalog, ActionError> {
        let settings = self.dispatcher.resolver().settings();
        let features = settings.features()?;

        let search_engines = settings
            .search_engines()?
            .into_iter()
            .filter(|e| e.enabled)
            .map(|e| CatalogEntry {
                id: e.id,
                name: e.name,
            })
            .collect();

        let prompts = if features.ai_assistant {
            let providers = settings.providers()?;
            settings
                .prompts()?
                .into_iter()
                .filter(|p| p.enabled)
                .map(|p| {
                    let missing_credential = providers
                        .iter()
                        .find(|c| c.id == p.provider_config_id)
                        .map_or(true, |c| c.is_missing_credential());
                    PromptEntry {
                        name: p.name,
                        provider_config_id: p.provider_config_id,
                        missing_credential,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let webhooks = if features.webhook {
            settings
                .webhooks()?
                .into_iter()
                .filter(|w| w.enabled)
                .map(|w| WebhookEntry {
                    id: w.id,
                    name: w.name,
                    method: w.method,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(ActionCatalog {
            grouped: features.context_menu_parent,
            search_engines,
            prompts,
            webhooks,
        })
    }
}

fn ensure_text(text: &str) -> Result<(), ActionError> {
    if text.trim().is_empty() {
        return Err(ActionError::config("No text to capture"));
    }
    Ok(())
}

/// The engine's query template applied to `text`, percent-encoded into every
/// `%s` of the engine URL.
pub fn search_url(engine: &SearchEngine, text: &str) -> String {
    let query = match engine.query_template.as_deref().filter(|t| !t.is_empty()) {
        Some(tpl) => template::render_text(tpl, text),
        None => text.to_string(),
    };
    engine.url.replace("%s", &urlencoding::encode(&query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use snipline_core::types::FeatureSettings;
    use snipline_storage::{HistoryLedger, MemoryStore, SettingsStore};

    use crate::provider::ProviderRegistry;
    use crate::resolver::SettingsResolver;
    use crate::webhook::WebhookClient;

    fn service() -> CaptureService {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::new(store.clone(), 10);
        settings.seed_defaults().unwrap();
        let ledger = HistoryLedger::spawn(store, 10).unwrap();
        let http = reqwest::Client::new();
        let dispatcher = Dispatcher::new(
            ledger,
            SettingsResolver::new(settings),
            ProviderRegistry::with_defaults(http.clone()),
            WebhookClient::new(http),
        );
        CaptureService::new(dispatcher)
    }

    #[test]
    fn test_search_url_renders_and_encodes() {
        let engine = SearchEngine {
            id: "e".to_string(),
            name: "E".to_string(),
            url: "https://s.example/?q=%s&again=%s".to_string(),
            enabled: true,
            query_template: Some("about {{text}}".to_string()),
        };
        assert_eq!(
            search_url(&engine, "rust & go"),
            "https://s.example/?q=about%20rust%20%26%20go&again=about%20rust%20%26%20go"
        );

        let plain = SearchEngine {
            query_template: None,
            ..engine
        };
        assert_eq!(
            search_url(&plain, "x y"),
            "https://s.example/?q=x%20y&again=x%20y"
        );
    }

    #[tokio::test]
    async fn test_save_text_appends_record() {
        let svc = service();
        let record = svc
            .save_text("hello", Some("https://page".to_string()))
            .await
            .unwrap();
        let list = svc.dispatcher().ledger().list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, record.id);
        assert_eq!(list[0].source_url.as_deref(), Some("https://page"));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let svc = service();
        assert!(svc.save_text("   ", None).await.is_err());
        assert!(svc.dispatcher().ledger().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_records_text_and_returns_url() {
        let svc = service();
        let out = svc.search("felo", "tokio", None).await.unwrap();
        assert!(out.url.starts_with("https://felo.ai/search?q="));
        assert!(out.url.contains("tokio"));
        let record = svc
            .dispatcher()
            .ledger()
            .get(out.record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.text, "tokio");
    }

    #[tokio::test]
    async fn test_unknown_prompt_creates_no_record() {
        let svc = service();
        assert!(svc.capture_and_prompt("Nope", "text", None).await.is_err());
        assert!(svc.dispatcher().ledger().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_webhook_is_rejected() {
        let svc = service();
        let settings = svc.dispatcher().resolver().settings();
        let mut hooks = settings.webhooks().unwrap();
        hooks[0].enabled = false;
        let id = hooks[0].id.clone();
        settings.set_webhooks(&hooks).unwrap();

        let err = svc.capture_and_webhook(&id, "text", None).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
        assert!(svc.dispatcher().ledger().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capture_and_prompt_without_key_records_error() {
        let svc = service();
        let out = svc
            .capture_and_prompt("Summarize", "text", None)
            .await
            .unwrap();
        assert_eq!(
            out.response.error_message(),
            Some("No API key configured for OpenAI")
        );
        let record = svc
            .dispatcher()
            .ledger()
            .get(out.record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.prompt_status("Summarize"),
            snipline_core::types::ExecutionStatus::Error
        );
    }

    #[tokio::test]
    async fn test_catalog_respects_feature_flags() {
        let svc = service();
        let catalog = svc.catalog().unwrap();
        assert_eq!(catalog.search_engines.len(), 4);
        assert!(catalog.prompts.is_empty());
        assert!(catalog.webhooks.is_empty());
        assert!(!catalog.grouped);

        let settings = svc.dispatcher().resolver().settings();
        settings
            .set_features(&FeatureSettings {
                webhook: true,
                ai_assistant: true,
                context_menu_parent: true,
            })
            .unwrap();
        let mut providers = settings.providers().unwrap();
        providers
            .iter_mut()
            .find(|p| p.id == "gemini")
            .unwrap()
            .api_key = Some("key".to_string());
        settings.set_providers(&providers).unwrap();

        let catalog = svc.catalog().unwrap();
        assert!(catalog.grouped);
        assert_eq!(catalog.webhooks.len(), 2);
        assert_eq!(catalog.prompts.len(), 3);
        let translate = catalog
            .prompts
            .iter()
            .find(|p| p.provider_config_id == "gemini")
            .unwrap();
        assert!(!translate.missing_credential);
        let summary = catalog
            .prompts
            .iter()
            .find(|p| p.name == "Summarize")
            .unwrap();
        assert!(summary.missing_credential);
    }
}
