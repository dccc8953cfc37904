//! Entry Store.
//!
//! Owns the canonical collection of [`MemoryEntry`] values, assigns their
//! identity and timestamps, and keeps the [`SecondaryIndexes`] in lock-step:
//! [`EntryStore::insert`] indexes the new entry and [`EntryStore::remove`]
//! purges it from every index within the same call.
//!
//! Live timestamps never go backwards: if the wall clock reports a time
//! earlier than the previous insert, the previous timestamp is reused, so
//! the timeline order always matches insertion order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mnemos_types::{MemoryEntry, MemoryMetadata, Role};
use uuid::Uuid;

use crate::analysis::resolve_metadata;
use crate::index::SecondaryIndexes;

#[derive(Debug)]
struct Slot {
    sequence: u64,
    entry: MemoryEntry,
}

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<Uuid, Slot>,
    indexes: SecondaryIndexes,
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create, index and return a new entry.
    ///
    /// Unset topic, sentiment and importance are derived from `content`.
    pub fn insert(
        &mut self,
        content: String,
        role: Role,
        hints: MemoryMetadata,
        vector: Vec<f32>,
        now: DateTime<Utc>,
    ) -> MemoryEntry {
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        let metadata = resolve_metadata(&content, role, hints);
        let entry = MemoryEntry::new(Uuid::new_v4(), timestamp, role, content, vector, metadata);
        self.place(entry.clone());
        entry
    }

    /// Insert an already-built entry (replay or snapshot import).
    ///
    /// An existing entry with the same id is replaced.
    pub fn restore(&mut self, entry: MemoryEntry) {
        if let Some(previous) = self.entries.remove(&entry.id()) {
            self.indexes.purge(&previous.entry, previous.sequence);
        }
        self.place(entry);
    }

    fn place(&mut self, entry: MemoryEntry) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.last_timestamp.is_none_or(|last| entry.timestamp() > last) {
            self.last_timestamp = Some(entry.timestamp());
        }
        self.indexes.apply(&entry, sequence);
        self.entries.insert(entry.id(), Slot { sequence, entry });
    }

    pub fn get(&self, id: &Uuid) -> Option<&MemoryEntry> {
        self.entries.get(id).map(|slot| &slot.entry)
    }

    /// Insertion sequence of `id`, used to break ranking ties.
    pub fn sequence(&self, id: &Uuid) -> Option<u64> {
        self.entries.get(id).map(|slot| slot.sequence)
    }

    /// Every entry, oldest first.
    pub fn all(&self) -> impl DoubleEndedIterator<Item = &MemoryEntry> {
        self.indexes.timeline().filter_map(|id| self.get(id))
    }

    /// Every entry paired with its insertion sequence, in no particular order.
    pub fn slots(&self) -> impl Iterator<Item = (u64, &MemoryEntry)> {
        self.entries.values().map(|slot| (slot.sequence, &slot.entry))
    }

    /// Remove `id` from the store and from every secondary index.
    pub fn remove(&mut self, id: &Uuid) -> Option<MemoryEntry> {
        let slot = self.entries.remove(id)?;
        self.indexes.purge(&slot.entry, slot.sequence);
        Some(slot.entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.indexes.clear();
        self.last_timestamp = None;
    }

    pub fn indexes(&self) -> &SecondaryIndexes {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
