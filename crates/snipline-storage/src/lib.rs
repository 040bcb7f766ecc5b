//! Snipline storage crate - SQLite key-value store, typed settings, and the
//! history ledger.
//!
//! Settings and history are JSON documents kept under well-known keys in a
//! WAL-mode SQLite database. The [`HistoryLedger`] owns the history list and
//! serializes every change to it.

pub mod db;
pub mod kv;
pub mod ledger;
pub mod migrations;
pub mod settings;

pub use db::Database;
pub use kv::{keys, KeyValueStore, KeyValueStoreExt, MemoryStore, SqliteStore, StoreChange};
pub use ledger::{HistoryLedger, Mutator};
pub use settings::SettingsStore;
