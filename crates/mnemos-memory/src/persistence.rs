//! Durable key-value backends.
//!
//! The engine only ever talks to a [`PersistenceBackend`]; it never knows
//! which store sits behind it. Two implementations ship with the crate:
//!
//! * [`InMemoryBackend`] – a `HashMap` behind a mutex, with a switch that
//!   makes every call fail (for exercising the error path).
//! * [`SqliteBackend`] – a local SQLite database.
//!
//! # SQLite layout
//!
//! A single table `conversation_memories` is created (if it does not already
//! exist) with the following columns:
//!
//! | column    | type | description                                  |
//! |-----------|------|----------------------------------------------|
//! | id        | TEXT | UUID v4 primary key                          |
//! | timestamp | TEXT | RFC-3339 creation time (UTC)                 |
//! | role      | TEXT | `user`, `assistant` or `system`              |
//! | content   | TEXT | Raw turn text                                |
//! | metadata  | TEXT | JSON-encoded resolved metadata               |
//! | vector    | BLOB | Little-endian f32 vector (4 × N bytes)       |

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_types::{EntryMetadata, MemoryRecord, Role};
use rusqlite::{Connection, params};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by durable backends. The engine logs and swallows these.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Backend lock poisoned")]
    Poisoned,
    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Persistence worker has shut down")]
    WorkerClosed,
    #[error("No Tokio runtime to run the persistence worker on")]
    NoRuntime,
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value interface the engine mirrors its entries into.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Insert or replace the record with `record.id`.
    async fn put(&self, record: MemoryRecord) -> Result<(), PersistenceError>;

    async fn get_all(&self) -> Result<Vec<MemoryRecord>, PersistenceError>;

    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError>;

    async fn clear(&self) -> Result<(), PersistenceError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// InMemoryBackend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: Mutex<HashMap<Uuid, MemoryRecord>>,
    failing: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with `records`, as if written by an earlier process.
    pub fn with_records(records: impl IntoIterator<Item = MemoryRecord>) -> Self {
        let backend = Self::new();
        if let Ok(mut map) = backend.records.lock() {
            map.extend(records.into_iter().map(|r| (r.id, r)));
        }
        backend
    }

    /// While `failing` is set every operation returns
    /// [`PersistenceError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.records
            .lock()
            .map(|m| m.contains_key(id))
            .unwrap_or(false)
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable("in-memory backend set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn put(&self, record: MemoryRecord) -> Result<(), PersistenceError> {
        self.check()?;
        let mut map = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        map.insert(record.id, record);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<MemoryRecord>, PersistenceError> {
        self.check()?;
        let map = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.check()?;
        let mut map = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        map.remove(&id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.check()?;
        let mut map = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        map.clear();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector serialisation helpers
// ─────────────────────────────────────────────────────────────────────────────

fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteBackend
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed durable store. Every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversation_memories (
                id        TEXT NOT NULL PRIMARY KEY,
                timestamp TEXT NOT NULL,
                role      TEXT NOT NULL,
                content   TEXT NOT NULL,
                metadata  TEXT NOT NULL,
                vector    BLOB NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, PersistenceError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| PersistenceError::Poisoned)?;
            f(&guard)
        })
        .await?
    }
}

fn insert_record(conn: &Connection, record: &MemoryRecord) -> Result<(), PersistenceError> {
    let metadata = serde_json::to_string(&record.metadata)?;
    conn.execute(
        "INSERT OR REPLACE INTO conversation_memories
             (id, timestamp, role, content, metadata, vector)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.timestamp.to_rfc3339(),
            record.role.as_str(),
            record.content,
            metadata,
            vector_to_bytes(&record.vector),
        ],
    )?;
    Ok(())
}

fn decode_row(
    id: String,
    timestamp: String,
    role: String,
    content: String,
    metadata: String,
    vector: Vec<u8>,
) -> Result<MemoryRecord, PersistenceError> {
    let corrupt = |reason: String| PersistenceError::Corrupt {
        id: id.clone(),
        reason,
    };
    let parsed_id = Uuid::parse_str(&id).map_err(|e| corrupt(e.to_string()))?;
    let timestamp = timestamp
        .parse::<DateTime<Utc>>()
        .map_err(|e| corrupt(e.to_string()))?;
    let role = role.parse::<Role>().map_err(|e| corrupt(e.to_string()))?;
    let metadata: EntryMetadata = serde_json::from_str(&metadata)?;
    Ok(MemoryRecord {
        id: parsed_id,
        timestamp,
        role,
        content,
        vector: bytes_to_vector(&vector),
        metadata,
    })
}

#[async_trait]
impl PersistenceBackend for SqliteBackend {
    async fn put(&self, record: MemoryRecord) -> Result<(), PersistenceError> {
        self.with_conn(move |conn| insert_record(conn, &record)).await
    }

    async fn get_all(&self) -> Result<Vec<MemoryRecord>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, role, content, metadata, vector
                 FROM conversation_memories
                 ORDER BY timestamp ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (id, timestamp, role, content, metadata, vector) = row?;
                match decode_row(id, timestamp, role, content, metadata, vector) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable memory record"),
                }
            }
            Ok(records)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM conversation_memories WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM conversation_memories", [])?;
            Ok(())
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
