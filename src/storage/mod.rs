use thiserror::Error;

mod memory;
mod sqlite;
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::config::StoreKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// String key-value store that lives only as long as the browsing session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub fn open_session_store(kind: StoreKind) -> Result<Box<dyn SessionStore>, StoreError> {
    let store: Box<dyn SessionStore> = match kind {
        StoreKind::Sqlite => Box::new(SqliteSessionStore::in_memory()?),
        StoreKind::Memory => Box::new(MemorySessionStore::new()),
    };
    Ok(store)
}
