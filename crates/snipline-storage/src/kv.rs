//! Key-value persistence used for settings and history.
//!
//! Every value is a JSON document stored under a well-known key. Each
//! `get`/`set` call is atomic on its own; sequences of calls are not.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use snipline_core::error::SniplineError;

use crate::db::Database;

/// Well-known store keys.
pub mod keys {
    pub const PROVIDERS: &str = "aiSettings";
    pub const PROMPTS: &str = "aiPromptSettings";
    pub const WEBHOOKS: &str = "webhookSettings";
    pub const SEARCH_ENGINES: &str = "searchSettings";
    pub const FEATURES: &str = "featureSettings";
    pub const HISTORY: &str = "historySettings";
    pub const HISTORY_LIMIT: &str = "historyLimit";
}

/// Capacity of the change broadcast channel. Slow subscribers lag rather
/// than block writers.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Notification that a key was written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub key: String,
}

/// Minimal get/set/subscribe store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SniplineError>;

    fn set(&self, key: &str, value: &str) -> Result<(), SniplineError>;

    /// Receive a [`StoreChange`] after every successful `set`.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Typed JSON helpers over any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SniplineError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SniplineError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// SQLite-backed store over the `kv` table.
pub struct SqliteStore {
    db: Arc<Database>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { db, changes }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, SniplineError> {
        self.db.read(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SniplineError> {
        self.db.upsert(key, value)?;
        debug!(key, bytes = value.len(), "Store key written");
        // No receivers is not an error.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// In-process store for tests and ephemeral runs.
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SniplineError> {
        let values = self
            .values
            .lock()
            .map_err(|e| SniplineError::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SniplineError> {
        {
            let mut values = self
                .values
                .lock()
                .map_err(|e| SniplineError::Storage(format!("Store lock poisoned: {}", e)))?;
            values.insert(key.to_string(), value.to_string());
        }
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
