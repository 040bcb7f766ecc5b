//! Typed access to the user-editable settings held in the key-value store.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use snipline_core::defaults;
use snipline_core::error::SniplineError;
use snipline_core::types::{
    FeatureSettings, PromptConfig, ProviderConfig, SearchEngine, WebhookConfig,
};

use crate::kv::{keys, KeyValueStore, KeyValueStoreExt};

/// Settings facade. Reads go to the store every time, so edits are seen by
/// the next caller.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    default_history_limit: usize,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>, default_history_limit: usize) -> Self {
        Self {
            store,
            default_history_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, SniplineError> {
        Ok(self.store.get_json(key)?.unwrap_or_default())
    }

    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SniplineError> {
        self.store.set_json(key, value)
    }

    pub fn providers(&self) -> Result<Vec<ProviderConfig>, SniplineError> {
        self.list(keys::PROVIDERS)
    }

    pub fn set_providers(&self, providers: &[ProviderConfig]) -> Result<(), SniplineError> {
        ensure_unique(providers.iter().map(|p| p.id.as_str()), "provider id")?;
        self.put(keys::PROVIDERS, providers)
    }

    pub fn prompts(&self) -> Result<Vec<PromptConfig>, SniplineError> {
        self.list(keys::PROMPTS)
    }

    /// Prompt names are lookup keys and must be unique.
    pub fn set_prompts(&self, prompts: &[PromptConfig]) -> Result<(), SniplineError> {
        ensure_unique(prompts.iter().map(|p| p.name.as_str()), "prompt name")?;
        self.put(keys::PROMPTS, prompts)
    }

    pub fn webhooks(&self) -> Result<Vec<WebhookConfig>, SniplineError> {
        self.list(keys::WEBHOOKS)
    }

    pub fn set_webhooks(&self, webhooks: &[WebhookConfig]) -> Result<(), SniplineError> {
        ensure_unique(webhooks.iter().map(|w| w.id.as_str()), "webhook id")?;
        self.put(keys::WEBHOOKS, webhooks)
    }

    pub fn search_engines(&self) -> Result<Vec<SearchEngine>, SniplineError> {
        self.list(keys::SEARCH_ENGINES)
    }

    pub fn set_search_engines(&self, engines: &[SearchEngine]) -> Result<(), SniplineError> {
        ensure_unique(engines.iter().map(|e| e.id.as_str()), "search engine id")?;
        self.put(keys::SEARCH_ENGINES, engines)
    }

    pub fn features(&self) -> Result<FeatureSettings, SniplineError> {
        Ok(self.store.get_json(keys::FEATURES)?.unwrap_or_default())
    }

    pub fn set_features(&self, features: &FeatureSettings) -> Result<(), SniplineError> {
        self.put(keys::FEATURES, features)
    }

    /// Stored history cap, or the configured default when none is stored.
    pub fn history_limit(&self) -> Result<usize, SniplineError> {
        Ok(self
            .store
            .get_json(keys::HISTORY_LIMIT)?
            .unwrap_or(self.default_history_limit))
    }

    pub fn set_history_limit(&self, limit: usize) -> Result<(), SniplineError> {
        self.put(keys::HISTORY_LIMIT, &limit)
    }

    /// Write the default providers, prompts, webhooks, and search engines
    /// into any list that is absent or empty. Existing lists are untouched.
    ///
    /// Returns the keys that were seeded.
    pub fn seed_defaults(&self) -> Result<Vec<&'static str>, SniplineError> {
        let mut seeded = Vec::new();

        if self.providers()?.is_empty() {
            self.set_providers(&defaults::providers())?;
            seeded.push(keys::PROVIDERS);
        }
        if self.prompts()?.is_empty() {
            self.set_prompts(&defaults::prompts())?;
            seeded.push(keys::PROMPTS);
        }
        if self.search_engines()?.is_empty() {
            self.set_search_engines(&defaults::search_engines())?;
            seeded.push(keys::SEARCH_ENGINES);
        }
        if self.webhooks()?.is_empty() {
            self.set_webhooks(&defaults::webhooks())?;
            seeded.push(keys::WEBHOOKS);
        }
        if self.store.get(keys::FEATURES)?.is_none() {
            self.set_features(&defaults::features())?;
            seeded.push(keys::FEATURES);
        }

        if !seeded.is_empty() {
            info!(keys = ?seeded, "Seeded default settings");
        }
        Ok(seeded)
    }
}

fn ensure_unique<'a>(
    values: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<(), SniplineError> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(SniplineError::Config(format!("duplicate {}: {}", what, value)));
        }
    }
    Ok(())
}
