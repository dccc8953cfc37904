//! Retention Policy.
//!
//! Runs when the store grows past its configured capacity. Every entry gets
//! an eviction score
//!
//! ```text
//! score = importance + timestamp_ms / now_ms
//! ```
//!
//! which grows with both importance and recency. Entries are sorted
//! ascending by score (insertion order breaks ties, oldest first) and the
//! lowest 10% are removed, at least one, and always enough to bring the
//! store back within capacity.
//!
//! Unlike the ranker's recency term, the age component here is not clamped.

use mnemos_types::MemoryEntry;
use uuid::Uuid;

use crate::store::EntryStore;

/// Share of the store removed per eviction pass.
pub const EVICTION_FRACTION: f64 = 0.1;

pub fn eviction_score(entry: &MemoryEntry, now_ms: i64) -> f64 {
    let age_term = if now_ms == 0 {
        0.0
    } else {
        entry.timestamp_ms() as f64 / now_ms as f64
    };
    f64::from(entry.metadata().importance()) + age_term
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    max_entries: usize,
}

impl RetentionPolicy {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn over_capacity(&self, store: &EntryStore) -> bool {
        store.len() > self.max_entries
    }

    /// Ids to evict from `store`, lowest score first. Empty when the store
    /// is within capacity.
    pub fn select(&self, store: &EntryStore, now_ms: i64) -> Vec<Uuid> {
        let len = store.len();
        if len <= self.max_entries {
            return Vec::new();
        }
        let fraction = (len as f64 * EVICTION_FRACTION).floor() as usize;
        let count = fraction.max(len - self.max_entries).max(1);

        let mut scored: Vec<(f64, u64, Uuid)> = store
            .slots()
            .map(|(sequence, entry)| (eviction_score(entry, now_ms), sequence, entry.id()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(count).map(|(_, _, id)| id).collect()
    }

    /// Remove the selected entries and return them.
    pub fn enforce(&self, store: &mut EntryStore, now_ms: i64) -> Vec<MemoryEntry> {
        self.select(store, now_ms)
            .iter()
            .filter_map(|id| store.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mnemos_types::{MemoryMetadata, Role};

    fn fill(store: &mut EntryStore, importances: &[f32]) -> Vec<Uuid> {
        let now = Utc::now();
        importances
            .iter()
            .enumerate()
            .map(|(i, &importance)| {
                store
                    .insert(
                        format!("turn {i}"),
                        Role::User,
                        MemoryMetadata::new().with_importance(importance),
                        vec![1.0],
                        now,
                    )
                    .id()
            })
            .collect()
    }

    #[test]
    fn score_grows_with_importance_and_recency() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        let old = store.insert("old".into(), Role::User, MemoryMetadata::new().with_importance(0.5), vec![1.0], now - Duration::days(400));
        let new = store.insert("new".into(), Role::User, MemoryMetadata::new().with_importance(0.5), vec![1.0], now);
        let now_ms = now.timestamp_millis();
        assert!(eviction_score(&new, now_ms) > eviction_score(&old, now_ms));
        assert!((eviction_score(&new, now_ms) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn within_capacity_selects_nothing() {
        let mut store = EntryStore::new();
        fill(&mut store, &[0.5; 10]);
        let policy = RetentionPolicy::new(10);
        assert!(!policy.over_capacity(&store));
        assert!(policy.select(&store, Utc::now().timestamp_millis()).is_empty());
    }

    #[test]
    fn eleven_into_ten_removes_lowest_score() {
        let mut store = EntryStore::new();
        let mut importances = [0.8f32; 11];
        importances[6] = 0.2;
        let ids = fill(&mut store, &importances);

        let policy = RetentionPolicy::new(10);
        let evicted = policy.enforce(&mut store, Utc::now().timestamp_millis());
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id(), ids[6]);
        assert_eq!(store.len(), 10);
        assert!(!store.indexes().references(&ids[6]));
    }

    #[test]
    fn ties_evict_oldest_insert_first() {
        let mut store = EntryStore::new();
        let ids = fill(&mut store, &[0.5; 4]);
        let evicted = RetentionPolicy::new(3).select(&store, Utc::now().timestamp_millis());
        assert_eq!(evicted, vec![ids[0]]);
    }

    #[test]
    fn large_store_evicts_ten_percent() {
        let mut store = EntryStore::new();
        fill(&mut store, &[0.5; 41]);
        let evicted = RetentionPolicy::new(40).enforce(&mut store, Utc::now().timestamp_millis());
        assert_eq!(evicted.len(), 4);
        assert_eq!(store.len(), 37);
    }

    #[test]
    fn far_over_capacity_returns_within_bound() {
        let mut store = EntryStore::new();
        fill(&mut store, &[0.5; 30]);
        RetentionPolicy::new(5).enforce(&mut store, Utc::now().timestamp_millis());
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(RetentionPolicy::new(0).max_entries(), 1);
    }
}
