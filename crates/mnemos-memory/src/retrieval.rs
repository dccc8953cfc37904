//! Retrieval Ranker.
//!
//! Scores every stored entry against a query vector and returns a capped,
//! ordered result set:
//!
//! ```text
//! similarity = cosine(query, entry.vector)            (hard cutoff at threshold)
//! recency    = 1 - (now - entry.timestamp) / 30 days
//! relevance  = similarity * 0.5 + max(0, recency) * 0.3 + importance * 0.2
//! ```
//!
//! Results are sorted by descending relevance; equal relevance keeps
//! insertion order. Topic and emotion lookups skip vector scoring and return
//! exact index matches, most recent first.

use mnemos_types::MemoryEntry;
use serde::Serialize;
use uuid::Uuid;

use crate::encoder::cosine_similarity;
use crate::store::EntryStore;

pub const THIRTY_DAYS_MS: f64 = 30.0 * 24.0 * 60.0 * 60.0 * 1000.0;

pub const SIMILARITY_WEIGHT: f32 = 0.5;
pub const RECENCY_WEIGHT: f32 = 0.3;
pub const IMPORTANCE_WEIGHT: f32 = 0.2;

/// Number of similarity hits folded into a context window.
pub const CONTEXT_RESULTS: usize = 5;

/// Characters-to-tokens approximation used by the context window.
pub const TOKENS_PER_CHAR: f64 = 0.25;

/// One ranked hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(serialize_with = "serialize_entry")]
    pub entry: MemoryEntry,
    pub similarity: f32,
    pub relevance: f32,
}

fn serialize_entry<S: serde::Serializer>(entry: &MemoryEntry, s: S) -> Result<S::Ok, S::Error> {
    mnemos_types::MemoryRecord::from(entry).serialize(s)
}

/// Unclamped recency of an entry created at `timestamp_ms`.
///
/// Negative once the entry is older than thirty days.
pub fn recency(now_ms: i64, timestamp_ms: i64) -> f64 {
    1.0 - (now_ms - timestamp_ms) as f64 / THIRTY_DAYS_MS
}

pub fn relevance(similarity: f32, recency: f64, importance: f32) -> f32 {
    similarity * SIMILARITY_WEIGHT
        + recency.max(0.0) as f32 * RECENCY_WEIGHT
        + importance * IMPORTANCE_WEIGHT
}

/// Similarity ranker with a hard similarity cutoff.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    threshold: f32,
}

impl Ranker {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Rank every entry in `store` against `query`, returning at most
    /// `limit` results.
    pub fn rank(
        &self,
        store: &EntryStore,
        query: &[f32],
        limit: usize,
        now_ms: i64,
    ) -> Vec<SearchResult> {
        if limit == 0 || query.iter().all(|&x| x == 0.0) {
            return Vec::new();
        }
        let mut scored: Vec<(u64, SearchResult)> = store
            .slots()
            .filter_map(|(sequence, entry)| {
                let similarity = cosine_similarity(query, entry.vector());
                if similarity < self.threshold {
                    return None;
                }
                let relevance = relevance(
                    similarity,
                    recency(now_ms, entry.timestamp_ms()),
                    entry.metadata().importance(),
                );
                Some((
                    sequence,
                    SearchResult {
                        entry: entry.clone(),
                        similarity,
                        relevance,
                    },
                ))
            })
            .collect();

        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| seq_a.cmp(seq_b))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(_, result)| result).collect()
    }
}

/// Entries filed under `topic`, most recent first.
pub fn by_topic(store: &EntryStore, topic: &str, limit: usize) -> Vec<MemoryEntry> {
    newest_first(store, store.indexes().topic_ids(topic), limit)
}

/// Entries tagged with `emotion`, most recent first.
pub fn by_emotion(store: &EntryStore, emotion: &str, limit: usize) -> Vec<MemoryEntry> {
    newest_first(store, store.indexes().emotion_ids(emotion), limit)
}

/// The `limit` most recent entries, newest first.
pub fn recent(store: &EntryStore, limit: usize) -> Vec<MemoryEntry> {
    store.all().rev().take(limit).cloned().collect()
}

fn newest_first<'a>(
    store: &'a EntryStore,
    ids: impl Iterator<Item = &'a Uuid>,
    limit: usize,
) -> Vec<MemoryEntry> {
    let mut hits: Vec<(i64, u64, &MemoryEntry)> = ids
        .filter_map(|id| Some((store.get(id)?, store.sequence(id)?)))
        .map(|(entry, sequence)| (entry.timestamp_ms(), sequence, entry))
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    hits.into_iter().take(limit).map(|(_, _, e)| e.clone()).collect()
}

/// Concatenate the content of `results` as `role: content` lines, stopping
/// before the approximate token count of the whole text, newlines included,
/// would exceed `token_budget`.
pub fn context_window(results: &[SearchResult], token_budget: usize) -> String {
    let mut window = String::new();
    for result in results.iter().take(CONTEXT_RESULTS) {
        let separator = if window.is_empty() { "" } else { "\n" };
        let line = format!("{separator}{}: {}", result.entry.role(), result.entry.content());
        let chars = window.chars().count() + line.chars().count();
        if chars as f64 * TOKENS_PER_CHAR > token_budget as f64 {
            break;
        }
        window.push_str(&line);
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use mnemos_types::{EntryMetadata, MemoryMetadata, Role, Sentiment};

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn add(
        store: &mut EntryStore,
        content: &str,
        vector: Vec<f32>,
        importance: f32,
        at: DateTime<Utc>,
    ) -> MemoryEntry {
        store.insert(
            content.to_string(),
            Role::User,
            MemoryMetadata::new().with_importance(importance),
            vector,
            at,
        )
    }

    fn restore_at(store: &mut EntryStore, topic: &str, emotion: Option<&str>, at: DateTime<Utc>) -> Uuid {
        let entry = MemoryEntry::new(
            Uuid::new_v4(),
            at,
            Role::User,
            format!("{topic} entry"),
            vec![1.0, 0.0],
            EntryMetadata::new(topic.into(), emotion.map(str::to_string), Sentiment::Neutral, 0.5, None),
        );
        let id = entry.id();
        store.restore(entry);
        id
    }

    // ── scoring ──────────────────────────────────────────────────────────────

    #[test]
    fn recency_is_one_now_and_negative_after_thirty_days() {
        assert!((recency(1_000, 1_000) - 1.0).abs() < 1e-9);
        assert!((recency(15 * DAY_MS, 0) - 0.5).abs() < 1e-9);
        assert!(recency(45 * DAY_MS, 0) < 0.0);
    }

    #[test]
    fn relevance_clamps_negative_recency() {
        let fresh = relevance(1.0, 1.0, 1.0);
        assert!((fresh - 1.0).abs() < 1e-6);
        let stale = relevance(0.8, -2.0, 0.5);
        assert!((stale - (0.4 + 0.1)).abs() < 1e-6);
    }

    // ── rank ─────────────────────────────────────────────────────────────────

    #[test]
    fn rank_applies_hard_threshold() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        add(&mut store, "match", vec![1.0, 0.0], 0.5, now);
        add(&mut store, "orthogonal", vec![0.0, 1.0], 1.0, now);

        let results = Ranker::new(0.3).rank(&store, &[1.0, 0.0], 10, now.timestamp_millis());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.content(), "match");
        assert!(results.iter().all(|r| r.similarity >= 0.3));
    }

    #[test]
    fn rank_orders_by_relevance_and_caps_limit() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        add(&mut store, "weak", vec![0.6, 0.8], 0.1, now);
        add(&mut store, "strong", vec![1.0, 0.0], 0.9, now);
        add(&mut store, "mid", vec![0.8, 0.6], 0.5, now);

        let results = Ranker::new(0.0).rank(&store, &[1.0, 0.0], 2, now.timestamp_millis());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.content(), "strong");
        assert_eq!(results[1].entry.content(), "mid");
        assert!(results[0].relevance >= results[1].relevance);
    }

    #[test]
    fn rank_breaks_ties_by_insertion_order() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        let ids: Vec<Uuid> = (0..4)
            .map(|i| add(&mut store, &format!("twin {i}"), vec![1.0, 0.0], 0.5, now).id())
            .collect();

        let results = Ranker::new(0.0).rank(&store, &[1.0, 0.0], 10, now.timestamp_millis());
        let order: Vec<Uuid> = results.iter().map(|r| r.entry.id()).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn rank_keeps_old_entries_without_recency_bonus() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        restore_at(&mut store, "old", None, now - Duration::days(90));

        let results = Ranker::new(0.3).rank(&store, &[1.0, 0.0], 10, now.timestamp_millis());
        assert_eq!(results.len(), 1);
        // similarity 1.0 * 0.5 + 0 recency + 0.5 importance * 0.2
        assert!((results[0].relevance - 0.6).abs() < 1e-6);
    }

    #[test]
    fn rank_zero_query_or_empty_store_returns_nothing() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        assert!(Ranker::new(0.3).rank(&store, &[1.0, 0.0], 10, 0).is_empty());
        add(&mut store, "x", vec![1.0, 0.0], 0.5, now);
        assert!(Ranker::new(0.3).rank(&store, &[0.0, 0.0], 10, 0).is_empty());
        assert!(Ranker::new(0.3).rank(&store, &[1.0, 0.0], 0, 0).is_empty());
    }

    // ── exact lookups ────────────────────────────────────────────────────────

    #[test]
    fn by_topic_returns_newest_first() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        let old = restore_at(&mut store, "work", None, now - Duration::days(2));
        let new = restore_at(&mut store, "work", None, now);
        restore_at(&mut store, "sleep", None, now);

        let hits: Vec<Uuid> = by_topic(&store, "work", 20).iter().map(|e| e.id()).collect();
        assert_eq!(hits, vec![new, old]);
        assert_eq!(by_topic(&store, "work", 1).len(), 1);
        assert!(by_topic(&store, "missing", 20).is_empty());
    }

    #[test]
    fn by_emotion_is_exact_match() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        let sad = restore_at(&mut store, "grief", Some("sad"), now);
        restore_at(&mut store, "grief", Some("sadness"), now);
        restore_at(&mut store, "grief", None, now);

        let hits: Vec<Uuid> = by_emotion(&store, "sad", 20).iter().map(|e| e.id()).collect();
        assert_eq!(hits, vec![sad]);
    }

    #[test]
    fn recent_returns_newest_first() {
        let mut store = EntryStore::new();
        let now = Utc::now();
        let a = add(&mut store, "a", vec![1.0], 0.5, now).id();
        let b = add(&mut store, "b", vec![1.0], 0.5, now).id();
        let c = add(&mut store, "c", vec![1.0], 0.5, now).id();
        let hits: Vec<Uuid> = recent(&store, 2).iter().map(|e| e.id()).collect();
        assert_eq!(hits, vec![c, b]);
        assert_eq!(recent(&store, 10).last().map(|e| e.id()), Some(a));
    }

    // ── context_window ───────────────────────────────────────────────────────

    fn result(content: &str) -> SearchResult {
        SearchResult {
            entry: MemoryEntry::new(
                Uuid::new_v4(),
                Utc::now(),
                Role::User,
                content.to_string(),
                vec![1.0],
                EntryMetadata::new("general".into(), None, Sentiment::Neutral, 0.5, None),
            ),
            similarity: 1.0,
            relevance: 1.0,
        }
    }

    #[test]
    fn context_window_joins_lines_within_budget() {
        // "user: " + 14 chars = 20 chars = 5 tokens; the newline tips a
        // second line to 10.25.
        let results = vec![result("aaaaaaaaaaaaaa"), result("bbbbbbbbbbbbbb"), result("cccccccccccccc")];
        assert_eq!(context_window(&results, 10), "user: aaaaaaaaaaaaaa");
        assert_eq!(
            context_window(&results, 11),
            "user: aaaaaaaaaaaaaa\nuser: bbbbbbbbbbbbbb"
        );
    }

    #[test]
    fn context_window_counts_separators_against_budget() {
        let results: Vec<SearchResult> = (0..5).map(|_| result(&"a".repeat(14))).collect();
        for budget in [5, 10, 11, 20, 25, 26] {
            let text = context_window(&results, budget);
            assert!(
                text.chars().count() as f64 * TOKENS_PER_CHAR <= budget as f64,
                "budget {budget} exceeded by {text:?}"
            );
        }
        assert_eq!(context_window(&results, 25).lines().count(), 4);
        assert_eq!(context_window(&results, 26).lines().count(), 5);
    }

    #[test]
    fn context_window_stops_at_first_overflow() {
        let results = vec![result("short"), result(&"x".repeat(400)), result("tiny")];
        let text = context_window(&results, 20);
        assert_eq!(text, "user: short");
    }

    #[test]
    fn context_window_uses_at_most_five_results() {
        let results: Vec<SearchResult> = (0..8).map(|i| result(&format!("line {i}"))).collect();
        let text = context_window(&results, 10_000);
        assert_eq!(text.lines().count(), CONTEXT_RESULTS);
    }

    #[test]
    fn context_window_empty_inputs() {
        assert_eq!(context_window(&[], 2000), "");
        assert_eq!(context_window(&[result("hello")], 0), "");
    }
}
