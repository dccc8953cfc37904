//! [`MemoryEngine`] – the conversation memory facade.
//!
//! Owns one [`EntryStore`] behind a `RwLock`: every mutation (insert,
//! eviction, clear, replay) takes the write lock for its whole duration, so
//! readers always observe the store and its indexes in a consistent state.
//! Searches run synchronously under the read lock.
//!
//! Durable mirroring goes through an optional [`PersistenceGateway`];
//! queuing a write never waits for the backend.
//!
//! # Example
//!
//! ```rust
//! use mnemos_memory::{EngineConfig, MemoryEngine};
//! use mnemos_types::{MemoryMetadata, Role};
//!
//! let engine = MemoryEngine::new(EngineConfig::default()).unwrap();
//! engine.add_memory("I feel anxious about work", Role::User, MemoryMetadata::new());
//!
//! let hits = engine.search_similar("anxious about work", 10);
//! assert_eq!(hits.len(), 1);
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use mnemos_types::{MemoryEntry, MemoryMetadata, MemoryRecord, MemorySnapshot, MnemosError, Role};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, EngineConfig};
use crate::encoder::Encoder;
use crate::gateway::{ErrorCallback, PersistenceGateway};
use crate::persistence::PersistenceBackend;
use crate::retention::RetentionPolicy;
use crate::retrieval::{self, Ranker, SearchResult};
use crate::store::EntryStore;
use crate::summary::{self, MemorySummary};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_LOOKUP_LIMIT: usize = 20;
pub const DEFAULT_TOKEN_BUDGET: usize = 2000;

pub struct MemoryEngine {
    config: EngineConfig,
    encoder: Encoder,
    ranker: Ranker,
    retention: RetentionPolicy,
    state: RwLock<EntryStore>,
    gateway: Option<PersistenceGateway>,
}

impl MemoryEngine {
    /// Build an engine with no durable backend.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Build an engine mirroring its entries into `backend`.
    ///
    /// When `config.persistence_enabled` is false the backend is ignored.
    /// The write-behind worker needs a Tokio runtime; outside one the failure
    /// is reported and the engine runs in memory only.
    pub fn with_backend(
        config: EngineConfig,
        backend: Arc<dyn PersistenceBackend>,
        on_error: Option<ErrorCallback>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let gateway = if config.persistence_enabled {
            match PersistenceGateway::spawn(backend, on_error.clone()) {
                Ok(gateway) => Some(gateway),
                Err(e) => {
                    crate::gateway::report(on_error.as_ref(), &e, "spawn");
                    None
                }
            }
        } else {
            None
        };
        Self::build(config, gateway)
    }

    fn build(config: EngineConfig, gateway: Option<PersistenceGateway>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            encoder: Encoder::new(config.dimension),
            ranker: Ranker::new(config.similarity_threshold),
            retention: RetentionPolicy::new(config.max_entries),
            state: RwLock::new(EntryStore::new()),
            gateway,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    // ── lifecycle ────────────────────────────────────────────────────────────

    /// Replay every durable record into memory, returning how many were
    /// loaded. Stored vectors are used verbatim.
    ///
    /// Backend failures are reported and leave the engine empty-handed but
    /// usable; records whose vector length does not match the configured
    /// dimension are skipped.
    pub async fn initialize(&self) -> usize {
        let Some(gateway) = &self.gateway else {
            return 0;
        };
        let Some(records) = gateway.load_all().await else {
            return 0;
        };
        let loaded = self.replay(records, false);
        info!(loaded, "Conversation memory initialised");
        loaded
    }

    /// Restore entries from an [`export`][Self::export] snapshot.
    ///
    /// Restored entries are also mirrored to the durable backend.
    pub fn import_snapshot(&self, raw: &str) -> Result<usize, MnemosError> {
        let snapshot = MemorySnapshot::from_json(raw)?;
        if snapshot.dimension != self.config.dimension {
            return Err(MnemosError::DimensionMismatch {
                expected: self.config.dimension,
                actual: snapshot.dimension,
            });
        }
        let loaded = self.replay(snapshot.entries, true);
        info!(loaded, "Conversation memory snapshot imported");
        Ok(loaded)
    }

    fn replay(&self, mut records: Vec<MemoryRecord>, mirror: bool) -> usize {
        records.sort_by_key(|r| r.timestamp);
        let mut store = self.write();
        let mut loaded = 0;
        for record in records {
            if record.vector.len() != self.config.dimension {
                warn!(
                    memory_id = %record.id,
                    expected = self.config.dimension,
                    actual = record.vector.len(),
                    "Skipping memory with mismatched vector dimension"
                );
                continue;
            }
            if mirror && let Some(gateway) = &self.gateway {
                gateway.put(record.clone());
            }
            store.restore(MemoryEntry::from(record));
            loaded += 1;
        }
        self.enforce_capacity(&mut store);
        loaded
    }

    /// Forget everything, in memory and in the durable store.
    pub fn clear_all(&self) {
        let mut store = self.write();
        let dropped = store.len();
        store.clear();
        if let Some(gateway) = &self.gateway {
            gateway.clear();
        }
        info!(dropped, "Conversation memory cleared");
    }

    /// Serialisable snapshot of every entry, oldest first.
    pub fn export(&self) -> MemorySnapshot {
        let store = self.read();
        let entries = store.all().map(MemoryRecord::from).collect();
        MemorySnapshot::new(self.config.dimension, entries)
    }

    pub fn entry_count(&self) -> usize {
        self.read().len()
    }

    pub fn summary(&self) -> MemorySummary {
        summary::summarize(&self.read())
    }

    /// Wait until every queued durable write has been applied.
    pub async fn flush(&self) {
        if let Some(gateway) = &self.gateway {
            gateway.flush().await;
        }
    }

    // ── ingestion ────────────────────────────────────────────────────────────

    /// Store a new turn and return its id.
    pub fn add_memory(&self, content: impl Into<String>, role: Role, metadata: MemoryMetadata) -> Uuid {
        let content = content.into();
        let vector = self.encoder.embed(&content);

        let mut store = self.write();
        let entry = store.insert(content, role, metadata, vector, Utc::now());
        debug!(
            memory_id = %entry.id(),
            role = %role,
            topic = entry.metadata().topic(),
            "Memory added"
        );
        if let Some(gateway) = &self.gateway {
            gateway.put(MemoryRecord::from(&entry));
        }
        self.enforce_capacity(&mut store);
        entry.id()
    }

    fn enforce_capacity(&self, store: &mut EntryStore) {
        if !self.config.auto_cleanup || !self.retention.over_capacity(store) {
            return;
        }
        let evicted = self.retention.enforce(store, Utc::now().timestamp_millis());
        if let Some(gateway) = &self.gateway {
            for entry in &evicted {
                gateway.delete(entry.id());
            }
        }
        info!(evicted = evicted.len(), remaining = store.len(), "Evicted low-value memories");
    }

    // ── queries ──────────────────────────────────────────────────────────────

    pub fn get(&self, id: &Uuid) -> Option<MemoryEntry> {
        self.read().get(id).cloned()
    }

    /// Rank stored entries against `query` by blended relevance.
    pub fn search_similar(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let vector = self.encoder.embed(query);
        let results = self
            .ranker
            .rank(&self.read(), &vector, limit, Utc::now().timestamp_millis());
        debug!(hits = results.len(), limit, "Similarity search");
        results
    }

    pub fn search_by_topic(&self, topic: &str, limit: usize) -> Vec<MemoryEntry> {
        retrieval::by_topic(&self.read(), topic, limit)
    }

    pub fn search_by_emotion(&self, emotion: &str, limit: usize) -> Vec<MemoryEntry> {
        retrieval::by_emotion(&self.read(), emotion, limit)
    }

    pub fn recent(&self, limit: usize) -> Vec<MemoryEntry> {
        retrieval::recent(&self.read(), limit)
    }

    /// Text of the best matches for `query`, trimmed to `token_budget`.
    pub fn context_window(&self, query: &str, token_budget: usize) -> String {
        let results = self.search_similar(query, retrieval::CONTEXT_RESULTS);
        retrieval::context_window(&results, token_budget)
    }

    // ── locking ──────────────────────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, EntryStore> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntryStore> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
