//! `mnemos-memory` – semantic conversation memory.
//!
//! Stores short user/assistant turns, fingerprints each one into a fixed
//! width vector, indexes them by topic, emotion and time, and answers "what
//! said before is most relevant to this new utterance" within a bounded
//! entry budget.
//!
//! # Modules
//!
//! - [`encoder`] – [`Encoder`][encoder::Encoder]: deterministic
//!   vocabulary + trigram hashing encoder producing unit-length vectors.
//! - [`analysis`] – lexicon-based topic, sentiment and importance
//!   derivation for metadata the caller did not supply.
//! - [`index`] – [`SecondaryIndexes`][index::SecondaryIndexes]: topic,
//!   emotion and timeline views over entry ids.
//! - [`store`] – [`EntryStore`][store::EntryStore]: the canonical entry
//!   collection, kept in lock-step with its indexes.
//! - [`retrieval`] – [`Ranker`][retrieval::Ranker]: similarity / recency /
//!   importance blending, exact topic and emotion lookups, context windows.
//! - [`retention`] – [`RetentionPolicy`][retention::RetentionPolicy]:
//!   capacity-triggered eviction of the lowest-value entries.
//! - [`persistence`] – the [`PersistenceBackend`][persistence::PersistenceBackend]
//!   trait with in-memory and SQLite implementations.
//! - [`gateway`] – [`PersistenceGateway`][gateway::PersistenceGateway]:
//!   fire-and-forget write-behind worker.
//! - [`summary`] – aggregate statistics over all entries.
//! - [`engine`] – [`MemoryEngine`][engine::MemoryEngine]: the public facade.

pub mod analysis;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod gateway;
pub mod index;
pub mod persistence;
pub mod retention;
pub mod retrieval;
pub mod store;
pub mod summary;

pub use config::{ConfigError, EngineConfig};
pub use engine::{DEFAULT_LOOKUP_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TOKEN_BUDGET, MemoryEngine};
pub use gateway::ErrorCallback;
pub use persistence::{InMemoryBackend, PersistenceBackend, PersistenceError, SqliteBackend};
pub use retrieval::SearchResult;
pub use summary::MemorySummary;
