//! SQLite file holding the `kv` table.
//!
//! One connection behind a Mutex; every read or upsert takes the lock for a
//! single statement, so each call is atomic on its own.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use snipline_core::error::SniplineError;

use crate::migrations;

const READ_SQL: &str = "SELECT value FROM kv WHERE key = ?1";

const UPSERT_SQL: &str = "INSERT INTO kv (key, value, updated_at)
     VALUES (?1, ?2, strftime('%s', 'now'))
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// The settings and history database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file, creating parent directories.
    ///
    /// Writers share the file with readers through WAL; `busy_timeout`
    /// covers a second process holding the write lock.
    pub fn new(path: &Path) -> Result<Self, SniplineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            SniplineError::Storage(format!("Failed to open {}: {}", path.display(), e))
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| SniplineError::Storage(format!("Failed to set pragmas: {}", e)))?;

        let db = Self::migrated(conn)?;
        info!(path = %path.display(), keys = db.key_count()?, "Store database opened");
        Ok(db)
    }

    /// Ephemeral database for tests.
    pub fn in_memory() -> Result<Self, SniplineError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SniplineError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, SniplineError> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SniplineError> {
        self.conn
            .lock()
            .map_err(|e| SniplineError::Storage(format!("Database lock poisoned: {}", e)))
    }

    /// Raw JSON stored under `key`.
    pub fn read(&self, key: &str) -> Result<Option<String>, SniplineError> {
        self.lock()?
            .query_row(READ_SQL, rusqlite::params![key], |row| row.get(0))
            .optional()
            .map_err(|e| SniplineError::Storage(format!("Failed to read key {}: {}", key, e)))
    }

    /// Insert or replace the value under `key`.
    pub fn upsert(&self, key: &str, value: &str) -> Result<(), SniplineError> {
        self.lock()?
            .execute(UPSERT_SQL, rusqlite::params![key, value])
            .map_err(|e| SniplineError::Storage(format!("Failed to write key {}: {}", key, e)))?;
        Ok(())
    }

    /// Number of stored keys.
    pub fn key_count(&self) -> Result<usize, SniplineError> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .map_err(|e| SniplineError::Storage(format!("Failed to count keys: {}", e)))?;
        Ok(count as usize)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_starts_empty() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.key_count().unwrap(), 0);
        assert_eq!(db.read("aiSettings").unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_value() {
        let db = Database::in_memory().unwrap();
        db.upsert("historyLimit", "10").unwrap();
        db.upsert("historyLimit", "25").unwrap();
        assert_eq!(db.read("historyLimit").unwrap().as_deref(), Some("25"));
        assert_eq!(db.key_count().unwrap(), 1);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snipline.db");
        let db = Database::new(&path).unwrap();
        db.upsert("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        let mode: String = db
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_reopen_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        Database::new(&path).unwrap().upsert("k", "v").unwrap();
        let db = Database::new(&path).unwrap();
        assert_eq!(db.read("k").unwrap().as_deref(), Some("v"));
    }
}
