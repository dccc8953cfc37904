//! Secondary indexes over the entry store.
//!
//! Three derived views, none of which owns entry data:
//!
//! | index | key | value |
//! |---|---|---|
//! | topic | topic label | set of entry ids |
//! | emotion | emotion label | set of entry ids (unlabelled entries are not indexed) |
//! | timeline | `(timestamp_ms, sequence)` | entry id |
//!
//! Every update is derived purely from an entry's metadata, so applying the
//! same entry twice leaves the indexes unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};

use mnemos_types::MemoryEntry;
use uuid::Uuid;

/// Ordering key of the timeline: creation time, then insertion sequence.
pub type TimeKey = (i64, u64);

#[derive(Debug, Default)]
pub struct SecondaryIndexes {
    topics: HashMap<String, HashSet<Uuid>>,
    emotions: HashMap<String, HashSet<Uuid>>,
    timeline: BTreeMap<TimeKey, Uuid>,
}

impl SecondaryIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `entry` under its topic, emotion and time key.
    pub fn apply(&mut self, entry: &MemoryEntry, sequence: u64) {
        let meta = entry.metadata();
        self.topics
            .entry(meta.topic().to_string())
            .or_default()
            .insert(entry.id());
        if let Some(emotion) = meta.emotion() {
            self.emotions
                .entry(emotion.to_string())
                .or_default()
                .insert(entry.id());
        }
        self.timeline
            .insert((entry.timestamp_ms(), sequence), entry.id());
    }

    /// Remove every reference to `entry`, dropping labels left empty.
    pub fn purge(&mut self, entry: &MemoryEntry, sequence: u64) {
        let meta = entry.metadata();
        remove_from(&mut self.topics, meta.topic(), entry.id());
        if let Some(emotion) = meta.emotion() {
            remove_from(&mut self.emotions, emotion, entry.id());
        }
        self.timeline.remove(&(entry.timestamp_ms(), sequence));
    }

    pub fn clear(&mut self) {
        self.topics.clear();
        self.emotions.clear();
        self.timeline.clear();
    }

    pub fn topic_ids(&self, topic: &str) -> impl Iterator<Item = &Uuid> {
        self.topics.get(topic).into_iter().flatten()
    }

    pub fn emotion_ids(&self, emotion: &str) -> impl Iterator<Item = &Uuid> {
        self.emotions.get(emotion).into_iter().flatten()
    }

    /// Ids oldest first.
    pub fn timeline(&self) -> impl DoubleEndedIterator<Item = &Uuid> {
        self.timeline.values()
    }

    /// Number of entries per topic label.
    pub fn topic_counts(&self) -> BTreeMap<String, usize> {
        self.topics
            .iter()
            .map(|(topic, ids)| (topic.clone(), ids.len()))
            .collect()
    }

    /// True when `id` appears in any of the three indexes.
    #[cfg(test)]
    pub(crate) fn references(&self, id: &Uuid) -> bool {
        self.topics.values().any(|ids| ids.contains(id))
            || self.emotions.values().any(|ids| ids.contains(id))
            || self.timeline.values().any(|v| v == id)
    }

    /// Every id referenced by any index.
    #[cfg(test)]
    pub(crate) fn referenced_ids(&self) -> HashSet<Uuid> {
        self.topics
            .values()
            .chain(self.emotions.values())
            .flatten()
            .chain(self.timeline.values())
            .copied()
            .collect()
    }
}

fn remove_from(index: &mut HashMap<String, HashSet<Uuid>>, label: &str, id: Uuid) {
    if let Some(ids) = index.get_mut(label) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mnemos_types::{EntryMetadata, Role, Sentiment};

    fn entry(topic: &str, emotion: Option<&str>, ms: i64) -> MemoryEntry {
        MemoryEntry::new(
            Uuid::new_v4(),
            Utc.timestamp_millis_opt(ms).unwrap(),
            Role::User,
            "text".to_string(),
            vec![1.0],
            EntryMetadata::new(
                topic.to_string(),
                emotion.map(str::to_string),
                Sentiment::Neutral,
                0.5,
                None,
            ),
        )
    }

    #[test]
    fn apply_indexes_topic_emotion_and_time() {
        let mut idx = SecondaryIndexes::new();
        let e = entry("work", Some("tired"), 1_000);
        idx.apply(&e, 0);

        assert_eq!(idx.topic_ids("work").collect::<Vec<_>>(), vec![&e.id()]);
        assert_eq!(idx.emotion_ids("tired").collect::<Vec<_>>(), vec![&e.id()]);
        assert_eq!(idx.timeline().collect::<Vec<_>>(), vec![&e.id()]);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut idx = SecondaryIndexes::new();
        let e = entry("work", Some("tired"), 1_000);
        idx.apply(&e, 7);
        idx.apply(&e, 7);

        assert_eq!(idx.topic_ids("work").count(), 1);
        assert_eq!(idx.emotion_ids("tired").count(), 1);
        assert_eq!(idx.timeline().count(), 1);
    }

    #[test]
    fn missing_emotion_is_not_indexed() {
        let mut idx = SecondaryIndexes::new();
        let e = entry("sleep", None, 1_000);
        idx.apply(&e, 0);
        assert!(idx.emotions.is_empty());
        assert_eq!(idx.topic_ids("sleep").count(), 1);
    }

    #[test]
    fn purge_removes_every_reference() {
        let mut idx = SecondaryIndexes::new();
        let keep = entry("work", Some("tired"), 1_000);
        let gone = entry("work", Some("tired"), 2_000);
        idx.apply(&keep, 0);
        idx.apply(&gone, 1);

        idx.purge(&gone, 1);
        assert!(!idx.references(&gone.id()));
        assert!(idx.references(&keep.id()));
        assert_eq!(idx.topic_counts().get("work"), Some(&1));
    }

    #[test]
    fn purge_drops_empty_labels() {
        let mut idx = SecondaryIndexes::new();
        let e = entry("grief", Some("sad"), 1_000);
        idx.apply(&e, 0);
        idx.purge(&e, 0);
        assert!(idx.topic_counts().is_empty());
        assert!(idx.referenced_ids().is_empty());
    }

    #[test]
    fn timeline_orders_by_timestamp_then_sequence() {
        let mut idx = SecondaryIndexes::new();
        let late = entry("a", None, 5_000);
        let early = entry("a", None, 1_000);
        let tie = entry("a", None, 1_000);
        idx.apply(&late, 0);
        idx.apply(&early, 1);
        idx.apply(&tie, 2);

        let order: Vec<Uuid> = idx.timeline().copied().collect();
        assert_eq!(order, vec![early.id(), tie.id(), late.id()]);
        assert_eq!(idx.timeline().next_back(), Some(&late.id()));
    }
}
