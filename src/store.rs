use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::session::WritingSession;

pub const DRAFTS_KEY: &str = "writing_sessions.drafts";
pub const ANKYS_KEY: &str = "writing_sessions.ankys";
pub const LAST_WROTE_KEY: &str = "last_user_wrote";
pub const UPCOMING_PROMPT_KEY: &str = "upcoming_prompt";

/// Key-value store holding JSON values
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + Sync> KvStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// SQLite-backed store, one row per key
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;

        raw.map(|s| {
            serde_json::from_str(&s).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// Typed view over a [`KvStore`]: drafts, ankys, and small markers
pub struct SessionArchive<S: KvStore> {
    store: S,
}

impl<S: KvStore> SessionArchive<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.store
            .get(key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.store.set(key, &serde_json::to_value(value)?)
    }

    fn load_list(&self, key: &str) -> Result<Vec<WritingSession>, StoreError> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    fn append(&self, key: &str, session: &WritingSession) -> Result<(), StoreError> {
        let mut sessions = self.load_list(key)?;
        sessions.push(session.clone());
        self.save(key, &sessions)
    }

    pub fn drafts(&self) -> Result<Vec<WritingSession>, StoreError> {
        self.load_list(DRAFTS_KEY)
    }

    pub fn push_draft(&self, session: &WritingSession) -> Result<(), StoreError> {
        self.append(DRAFTS_KEY, session)
    }

    /// Look up a stored draft without removing it
    pub fn draft(&self, session_id: &str) -> Result<Option<WritingSession>, StoreError> {
        Ok(self
            .drafts()?
            .into_iter()
            .find(|d| d.session_id() == session_id))
    }

    /// Remove a draft from the queue and hand it to the caller
    pub fn take_draft(&self, session_id: &str) -> Result<Option<WritingSession>, StoreError> {
        let mut drafts = self.drafts()?;
        let Some(pos) = drafts.iter().position(|d| d.session_id() == session_id) else {
            return Ok(None);
        };
        let draft = drafts.remove(pos);
        self.save(DRAFTS_KEY, &drafts)?;
        Ok(Some(draft))
    }

    pub fn discard_draft(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.take_draft(session_id)?.is_some())
    }

    pub fn ankys(&self) -> Result<Vec<WritingSession>, StoreError> {
        self.load_list(ANKYS_KEY)
    }

    pub fn push_anky(&self, session: &WritingSession) -> Result<(), StoreError> {
        self.append(ANKYS_KEY, session)
    }

    pub fn mark_wrote(&self, day: NaiveDate) -> Result<(), StoreError> {
        self.save(LAST_WROTE_KEY, &day)
    }

    pub fn wrote_on(&self, day: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.load::<NaiveDate>(LAST_WROTE_KEY)? == Some(day))
    }

    pub fn upcoming_prompt(&self) -> Result<Option<String>, StoreError> {
        self.load(UPCOMING_PROMPT_KEY)
    }

    pub fn set_upcoming_prompt(&self, prompt: &str) -> Result<(), StoreError> {
        self.save(UPCOMING_PROMPT_KEY, &prompt)
    }

    pub fn clear_upcoming_prompt(&self) -> Result<(), StoreError> {
        self.store.remove(UPCOMING_PROMPT_KEY)
    }
}
