//! Lookup of prompt, provider, webhook, and search engine settings.
//!
//! Every call reads the store afresh, so settings edits take effect on the
//! next action without a restart.

use serde_json::Value;

use snipline_core::types::{PromptConfig, ProviderConfig, SearchEngine, WebhookConfig};
use snipline_storage::SettingsStore;

use crate::error::ActionError;

#[derive(Clone)]
pub struct SettingsResolver {
    settings: SettingsStore,
}

impl SettingsResolver {
    pub fn new(settings: SettingsStore) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn prompt(&self, name: &str) -> Result<PromptConfig, ActionError> {
        self.settings
            .prompts()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ActionError::config(format!("Prompt not found: {}", name)))
    }

    pub fn provider(&self, id: &str) -> Result<ProviderConfig, ActionError> {
        self.settings
            .providers()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ActionError::config(format!("Provider config not found: {}", id)))
    }

    pub fn webhook(&self, id: &str) -> Result<WebhookConfig, ActionError> {
        self.settings
            .webhooks()?
            .into_iter()
            .find(|w| w.id == id)
            .ok_or_else(|| ActionError::config(format!("Webhook not found: {}", id)))
    }

    pub fn search_engine(&self, id: &str) -> Result<SearchEngine, ActionError> {
        self.settings
            .search_engines()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ActionError::config(format!("Search engine not found: {}", id)))
    }

    /// The prompt's response schema parsed as JSON, if one is configured.
    pub fn prompt_schema(&self, prompt: &PromptConfig) -> Result<Option<Value>, ActionError> {
        if !prompt.has_schema() {
            return Ok(None);
        }
        let raw = prompt.response_schema.as_deref().unwrap_or_default();
        serde_json::from_str(raw).map(Some).map_err(|e| {
            ActionError::config(format!(
                "Invalid response schema for prompt {}: {}",
                prompt.name, e
            ))
        })
    }
}
