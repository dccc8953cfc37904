//! Aggregate view over everything remembered.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use mnemos_types::Role;
use serde::Serialize;

use crate::analysis::DEFAULT_TOPIC;
use crate::store::EntryStore;

const TOP_TOPICS: usize = 5;
const TREND_WINDOW: usize = 10;
const CONCERN_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timespan {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySummary {
    pub total_entries: usize,
    pub topic_counts: BTreeMap<String, usize>,
    /// Emotions of the most recent emotion-tagged entries, oldest first.
    pub emotion_trend: Vec<String>,
    /// Top topics by count; ties are alphabetical.
    pub most_discussed_topics: Vec<(String, usize)>,
    /// Distinct non-general topics of the latest user turns, newest first.
    pub recent_concerns: Vec<String>,
    pub timespan: Option<Timespan>,
}

pub fn summarize(store: &EntryStore) -> MemorySummary {
    let topic_counts = store.indexes().topic_counts();

    let mut most_discussed: Vec<(String, usize)> = topic_counts
        .iter()
        .map(|(topic, count)| (topic.clone(), *count))
        .collect();
    most_discussed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    most_discussed.truncate(TOP_TOPICS);

    let mut emotion_trend: Vec<String> = store
        .all()
        .rev()
        .filter_map(|e| e.metadata().emotion().map(str::to_string))
        .take(TREND_WINDOW)
        .collect();
    emotion_trend.reverse();

    let mut seen = HashSet::new();
    let recent_concerns = store
        .all()
        .rev()
        .filter(|e| e.role() == Role::User)
        .take(CONCERN_WINDOW)
        .map(|e| e.metadata().topic())
        .filter(|topic| *topic != DEFAULT_TOPIC && seen.insert(*topic))
        .map(str::to_string)
        .collect();

    let timespan = match (store.all().next(), store.all().next_back()) {
        (Some(first), Some(last)) => Some(Timespan {
            first: first.timestamp(),
            last: last.timestamp(),
            days: (last.timestamp_ms() - first.timestamp_ms()) as f64 / 86_400_000.0,
        }),
        _ => None,
    };

    MemorySummary {
        total_entries: store.len(),
        topic_counts,
        emotion_trend,
        most_discussed_topics: most_discussed,
        recent_concerns,
        timespan,
    }
}
