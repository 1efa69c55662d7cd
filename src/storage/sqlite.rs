use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use tracing::debug;

use crate::storage::{SessionStore, StoreError};

/// SQLite-backed store that never touches disk; dropped with the session.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Session store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM session_kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO session_kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;

        Ok(())
    }
}
