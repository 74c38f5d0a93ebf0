//! Local SQLite store
//!
//! One connection guarded by a mutex; every table access goes through
//! `Database::with_conn`. Chat, settings and history operations live in the
//! submodules as `impl Database` blocks.

pub mod chat;
pub mod history;
pub mod settings;

pub use chat::{ChatMessage, ChatRole, ChatSession};
pub use history::HistoryEntry;
pub use settings::NotificationSettings;

use crate::error::StoreError;
use crate::samples::Timestamp;
use chrono::{TimeZone, Utc};
use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Handle to the application database; clones share the connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Run `f` against a clone of this handle on the blocking thread pool
    ///
    /// Async code reaches the store through here so SQLite calls stay off the
    /// runtime's worker threads.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    /// Run `f` inside a transaction, committing on success
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

pub(crate) fn to_millis(time: Timestamp) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id          TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at);

CREATE TABLE IF NOT EXISTS notification_settings (
    id                      TEXT PRIMARY KEY,
    enabled                 INTEGER NOT NULL,
    start_hour              INTEGER NOT NULL,
    end_hour                INTEGER NOT NULL,
    allow_overnight         INTEGER NOT NULL,
    check_interval_minutes  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    message     TEXT NOT NULL,
    timestamp   INTEGER NOT NULL,
    category    TEXT
);

CREATE INDEX IF NOT EXISTS idx_notification_history_timestamp ON notification_history(timestamp);
"#;
