use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::TimerError;

/// Lifetime of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// Run-in-progress state, cleared on reset
    Session,
    /// User data that survives reset
    Durable,
}

/// Logical keys understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    CurrentSplit,
    CurrentTime,
    Splits,
    Status,
    TimestampRef,
    RecordedTimes,
    RunName,
    ErrorLog,
    Settings,
    Runs,
    SelectedRun,
}

impl StorageKey {
    pub const ALL: [StorageKey; 11] = [
        StorageKey::CurrentSplit,
        StorageKey::CurrentTime,
        StorageKey::Splits,
        StorageKey::Status,
        StorageKey::TimestampRef,
        StorageKey::RecordedTimes,
        StorageKey::RunName,
        StorageKey::ErrorLog,
        StorageKey::Settings,
        StorageKey::Runs,
        StorageKey::SelectedRun,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StorageKey::CurrentSplit => "currentSplit",
            StorageKey::CurrentTime => "currentTime",
            StorageKey::Splits => "splits",
            StorageKey::Status => "status",
            StorageKey::TimestampRef => "timestampRef",
            StorageKey::RecordedTimes => "recordedTimes",
            StorageKey::RunName => "runName",
            StorageKey::ErrorLog => "errorLog",
            StorageKey::Settings => "settings",
            StorageKey::Runs => "runs",
            StorageKey::SelectedRun => "selectedRun",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            StorageKey::CurrentSplit
            | StorageKey::CurrentTime
            | StorageKey::Splits
            | StorageKey::Status
            | StorageKey::TimestampRef
            | StorageKey::RecordedTimes
            | StorageKey::RunName => Scope::Session,
            StorageKey::ErrorLog
            | StorageKey::Settings
            | StorageKey::Runs
            | StorageKey::SelectedRun => Scope::Durable,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn session_keys() -> impl Iterator<Item = StorageKey> {
        Self::ALL.into_iter().filter(|k| k.scope() == Scope::Session)
    }
}

/// Key/value persistence capability. Values are JSON text.
pub trait Store {
    fn get_raw(&self, key: StorageKey) -> Option<&str>;
    fn set_raw(&mut self, key: StorageKey, value: String) -> Result<(), TimerError>;
    fn delete(&mut self, key: StorageKey) -> Result<(), TimerError>;

    /// Write several values as one unit: either all of them land or none do
    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), TimerError>;

    /// Remove every session-scoped value, leaving durable ones in place
    fn clear_session(&mut self) -> Result<(), TimerError> {
        for key in StorageKey::session_keys() {
            self.delete(key)?;
        }
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for &mut S {
    fn get_raw(&self, key: StorageKey) -> Option<&str> {
        (**self).get_raw(key)
    }

    fn set_raw(&mut self, key: StorageKey, value: String) -> Result<(), TimerError> {
        (**self).set_raw(key, value)
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), TimerError> {
        (**self).delete(key)
    }

    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), TimerError> {
        (**self).set_many(entries)
    }

    fn clear_session(&mut self) -> Result<(), TimerError> {
        (**self).clear_session()
    }
}

/// Typed access on top of [`Store`]
pub trait StoreExt: Store {
    fn get<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, TimerError> {
        match self.get_raw(key) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&mut self, key: StorageKey, value: &T) -> Result<(), TimerError> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

const UPSERT: &str = r#"
    INSERT INTO kv_store (key, value, scope) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
"#;

/// SQLite-backed store. All rows are read into a cache when opened and every
/// write goes through to the database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    cache: HashMap<StorageKey, String>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories as needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TimerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, TimerError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, TimerError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                scope TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        let mut cache = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT key, value FROM kv_store")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, value) = row?;
                match StorageKey::from_id(&id) {
                    Some(key) => {
                        cache.insert(key, value);
                    }
                    None => tracing::warn!(key = %id, "ignoring unknown storage key"),
                }
            }
        }

        Ok(Self { conn, cache })
    }
}

impl Store for SqliteStore {
    fn get_raw(&self, key: StorageKey) -> Option<&str> {
        self.cache.get(&key).map(String::as_str)
    }

    fn set_raw(&mut self, key: StorageKey, value: String) -> Result<(), TimerError> {
        self.conn.execute(
            UPSERT,
            params![key.id(), value, key.scope().to_string()],
        )?;
        self.cache.insert(key, value);
        Ok(())
    }

    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), TimerError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for (key, value) in &entries {
                stmt.execute(params![key.id(), value, key.scope().to_string()])?;
            }
        }
        tx.commit()?;

        // cache only sees the values once they are on disk
        self.cache.extend(entries);
        Ok(())
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), TimerError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key.id()])?;
        self.cache.remove(&key);
        Ok(())
    }

    fn clear_session(&mut self) -> Result<(), TimerError> {
        self.conn.execute(
            "DELETE FROM kv_store WHERE scope = ?1",
            params![Scope::Session.to_string()],
        )?;
        self.cache.retain(|k, _| k.scope() != Scope::Session);
        Ok(())
    }
}

/// In-memory store, used by tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<StorageKey, String>,
    writes: usize,
    rejected: Option<StorageKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values written so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn contains(&self, key: StorageKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Make every write touching `key` fail, as a full disk would
    pub fn reject_writes_to(&mut self, key: Option<StorageKey>) {
        self.rejected = key;
    }

    fn check_writable(&self, key: StorageKey) -> Result<(), TimerError> {
        if self.rejected == Some(key) {
            return Err(TimerError::Storage(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some(format!("write to {} rejected", key.id())),
            )));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get_raw(&self, key: StorageKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    fn set_raw(&mut self, key: StorageKey, value: String) -> Result<(), TimerError> {
        self.check_writable(key)?;
        self.writes += 1;
        self.values.insert(key, value);
        Ok(())
    }

    fn set_many(&mut self, entries: Vec<(StorageKey, String)>) -> Result<(), TimerError> {
        for (key, _) in &entries {
            self.check_writable(*key)?;
        }
        self.writes += entries.len();
        self.values.extend(entries);
        Ok(())
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), TimerError> {
        self.values.remove(&key);
        Ok(())
    }
}
