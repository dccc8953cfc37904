//! `mnemos-types` – shared domain types for the Mnemos conversation memory.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the conversational [`Role`] of a turn, the caller-supplied
//! [`MemoryMetadata`] hints, the resolved and immutable [`EntryMetadata`],
//! the stored [`MemoryEntry`] itself and its portable [`MemoryRecord`] /
//! [`MemorySnapshot`] forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Current version of the [`MemorySnapshot`] layout.
pub const SNAPSHOT_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Who produced a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = MnemosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(MnemosError::UnknownRole(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sentiment
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse polarity of a turn's wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Map a signed lexicon score onto a polarity by its sign.
    pub fn from_score(score: i32) -> Self {
        match score.signum() {
            1 => Sentiment::Positive,
            -1 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Optional hints a caller may attach when adding a turn.
///
/// Any field left as `None` is derived from the content at insertion time
/// (except `emotion` and `session_id`, which stay absent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub topic: Option<String>,
    pub emotion: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub importance: Option<f32>,
    pub session_id: Option<String>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Fully resolved metadata of a stored entry.
///
/// Built once when the entry is created and exposed read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<String>,
    sentiment: Sentiment,
    importance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl EntryMetadata {
    /// `importance` is clamped to `[0.0, 1.0]`.
    pub fn new(
        topic: String,
        emotion: Option<String>,
        sentiment: Sentiment,
        importance: f32,
        session_id: Option<String>,
    ) -> Self {
        Self {
            topic,
            emotion,
            sentiment,
            importance: clamp_importance(importance),
            session_id,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn emotion(&self) -> Option<&str> {
        self.emotion.as_deref()
    }

    pub fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    pub fn importance(&self) -> f32 {
        self.importance
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

fn clamp_importance(importance: f32) -> f32 {
    if importance.is_nan() {
        0.0
    } else {
        importance.clamp(0.0, 1.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryEntry
// ─────────────────────────────────────────────────────────────────────────────

/// One stored conversational turn with its fingerprint vector.
///
/// All fields are fixed at construction; there are no setters.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    id: Uuid,
    timestamp: DateTime<Utc>,
    role: Role,
    content: String,
    vector: Vec<f32>,
    metadata: EntryMetadata,
}

impl MemoryEntry {
    pub fn new(
        id: Uuid,
        timestamp: DateTime<Utc>,
        role: Role,
        content: String,
        vector: Vec<f32>,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            id,
            timestamp,
            role,
            content,
            vector,
            metadata,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Portable forms
// ─────────────────────────────────────────────────────────────────────────────

/// Portable representation of an entry, as handed to durable stores and
/// written into snapshots. The vector is a plain numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

impl From<&MemoryEntry> for MemoryRecord {
    fn from(entry: &MemoryEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            role: entry.role,
            content: entry.content.clone(),
            vector: entry.vector.clone(),
            metadata: entry.metadata.clone(),
        }
    }
}

impl From<MemoryRecord> for MemoryEntry {
    fn from(record: MemoryRecord) -> Self {
        MemoryEntry::new(
            record.id,
            record.timestamp,
            record.role,
            record.content,
            record.vector,
            record.metadata,
        )
    }
}

/// Serialized export of every entry held by an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub dimension: usize,
    pub entries: Vec<MemoryRecord>,
}

impl MemorySnapshot {
    pub fn new(dimension: usize, entries: Vec<MemoryRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            dimension,
            entries,
        }
    }

    pub fn to_json(&self) -> Result<String, MnemosError> {
        serde_json::to_string_pretty(self).map_err(|e| MnemosError::Snapshot(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, MnemosError> {
        let snapshot: MemorySnapshot =
            serde_json::from_str(raw).map_err(|e| MnemosError::Snapshot(e.to_string()))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(MnemosError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors shared across the Mnemos crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MnemosError {
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}
