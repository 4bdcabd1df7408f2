//! Storage layer for productivity timers.
//!
//! Provides a durable key-value store using `rusqlite`, implementing
//! [`pt_core::KeyValueStore`] so it can back both the timer snapshot and the
//! idle marker.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without external
//! synchronization. The timer core is single-threaded, so callers share one
//! instance behind an `Rc`.
//!
//! # Schema
//!
//! A single `kv` table maps string keys to string values. Values are opaque to
//! this crate; versioning and validation of the snapshot live in `pt-core`.
//! `updated_at` is stored as RFC 3339 text in UTC so lexicographic order
//! matches chronological order.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use pt_core::{KeyValueStore, StoreError};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads the value stored under `key`.
    pub fn get_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Deletes `key`. Deleting a missing key is not an error.
    pub fn delete_value(&self, key: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_value(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_value(key, value).map_err(|err| {
            tracing::debug!(key, error = %err, "sqlite write failed");
            StoreError::from(err)
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Ok(self.delete_value(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use pt_core::{ManagerConfig, ManualClock, TimerManager};

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(table_columns(&db.conn, "kv"), vec!["key", "value", "updated_at"]);
    }

    #[test]
    fn init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.set_value("k", "v").unwrap();
        db.init().unwrap();
        assert_eq!(db.get_value("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.get_value("missing").unwrap(), None);

        db.set_value("k", "one").unwrap();
        db.set_value("k", "two").unwrap();
        assert_eq!(db.get_value("k").unwrap().as_deref(), Some("two"));

        db.delete_value("k").unwrap();
        db.delete_value("k").unwrap();
        assert_eq!(db.get_value("k").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pt.db");

        Database::open(&path).unwrap().set_value("k", "v").unwrap();

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.get_value("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn manager_state_persists_across_restarts() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pt.db");
        let clock = ManualClock::new(0);
        let config = ManagerConfig::default();

        let id = {
            let db = Rc::new(Database::open(&path).unwrap());
            let mut manager = TimerManager::new(Rc::clone(&db), clock.shared(), &config).unwrap();
            let id = manager.add_timer(Some("Writing")).unwrap().id().to_string();
            manager.start_timer(&id).unwrap();
            clock.advance_ms(90_000);
            manager.pause_timer(&id).unwrap();
            id
        };

        let db = Rc::new(Database::open(&path).unwrap());
        let manager = TimerManager::new(db, ManualClock::new(0).shared(), &config).unwrap();

        assert_eq!(manager.len(), 3);
        let restored = manager.get_timer(&id).unwrap();
        assert_eq!(restored.title().as_str(), "Writing");
        assert_eq!(restored.elapsed_ms(), 90_000);
    }

    #[test]
    fn stored_snapshot_is_versioned_json() {
        let db = Rc::new(Database::open_in_memory().unwrap());
        let mut manager =
            TimerManager::new(Rc::clone(&db), ManualClock::new(42).shared(), &ManagerConfig::default())
                .unwrap();
        manager.reset_all();

        let raw = db.get_value("productivity-timers-v1").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["savedAt"], 42);
        assert_eq!(value["payload"]["counters"].as_array().unwrap().len(), 2);
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        stmt.query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect columns")
    }
}
