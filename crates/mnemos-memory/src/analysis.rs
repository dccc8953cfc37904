//! Lexicon-based metadata derivation.
//!
//! Fills in the metadata fields a caller did not supply when a turn is
//! ingested:
//!
//! * **topic** – first concern in [`CONCERN_KEYWORDS`] with a keyword
//!   contained in the text, falling back to [`DEFAULT_TOPIC`].
//! * **sentiment** – `+1` per positive-lexicon token, `-1` per
//!   negative-lexicon token, mapped by sign.
//! * **importance** – base `0.5`, `+0.1` each for a user turn, a text longer
//!   than 200 characters, a question mark, and any emotional keyword;
//!   capped at `1.0`.

use mnemos_types::{EntryMetadata, MemoryMetadata, Role, Sentiment};

use crate::encoder::tokenize;

/// Topic assigned when no concern keyword matches.
pub const DEFAULT_TOPIC: &str = "general";

const BASE_IMPORTANCE: f32 = 0.5;
const IMPORTANCE_STEP: f32 = 0.1;
const LONG_TEXT_CHARS: usize = 200;

/// Concern label → keywords, checked in order. Keywords are matched as
/// substrings of the lower-cased text.
pub const CONCERN_KEYWORDS: &[(&str, &[&str])] = &[
    ("anxiety", &["anxious", "anxiety", "worried", "worry", "panic", "nervous", "fear"]),
    ("depression", &["depressed", "depression", "hopeless", "empty", "worthless", "numb"]),
    ("stress", &["stress", "overwhelmed", "pressure", "burnout", "too much"]),
    ("grief", &["grief", "loss", "died", "passed away", "funeral", "mourning"]),
    ("sleep", &["sleep", "insomnia", "nightmare", "awake", "rest"]),
    ("relationships", &["partner", "relationship", "marriage", "divorce", "breakup", "boyfriend", "girlfriend"]),
    ("family", &["family", "mother", "father", "parents", "sister", "brother", "kids"]),
    ("work", &["work", "job", "career", "boss", "office", "deadline", "coworker"]),
    ("self_esteem", &["confidence", "worth", "ashamed", "failure", "not good enough"]),
    ("anger", &["angry", "anger", "furious", "rage", "irritated"]),
    ("health", &["health", "sick", "pain", "illness", "doctor", "body"]),
];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "better", "calm", "grateful", "thankful", "hopeful",
    "love", "glad", "relieved", "proud", "excited", "peaceful", "wonderful",
    "joy", "relaxed", "safe", "progress", "improving",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "sad", "angry", "anxious", "worried", "scared", "afraid", "terrible",
    "awful", "depressed", "hopeless", "lonely", "stressed", "stressful",
    "overwhelmed", "hurt", "hate", "upset", "worse", "tired", "exhausted",
    "frustrated", "guilty", "panic", "grief",
];

/// Keywords marking an emotionally charged turn, matched as substrings.
pub const EMOTIONAL_KEYWORDS: &[&str] = &[
    "feel", "scared", "afraid", "anxious", "worried", "sad", "angry", "hurt",
    "lonely", "hopeless", "overwhelmed", "panic", "cry", "grief", "hate", "love",
];

/// Return the first concern whose keywords occur in `text`.
pub fn detect_topic(text: &str) -> String {
    let lower = text.to_lowercase();
    CONCERN_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(topic, _)| (*topic).to_string())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
}

/// Signed lexicon score of `text`.
pub fn sentiment_score(text: &str) -> i32 {
    tokenize(text)
        .iter()
        .map(|token| {
            if POSITIVE_WORDS.contains(&token.as_str()) {
                1
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                -1
            } else {
                0
            }
        })
        .sum()
}

pub fn detect_sentiment(text: &str) -> Sentiment {
    Sentiment::from_score(sentiment_score(text))
}

pub fn score_importance(text: &str, role: Role) -> f32 {
    let lower = text.to_lowercase();
    let mut importance = BASE_IMPORTANCE;
    if role == Role::User {
        importance += IMPORTANCE_STEP;
    }
    if text.chars().count() > LONG_TEXT_CHARS {
        importance += IMPORTANCE_STEP;
    }
    if text.contains('?') {
        importance += IMPORTANCE_STEP;
    }
    if EMOTIONAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        importance += IMPORTANCE_STEP;
    }
    importance.min(1.0)
}

/// Resolve caller hints into the immutable metadata stored with an entry.
pub fn resolve_metadata(content: &str, role: Role, hints: MemoryMetadata) -> EntryMetadata {
    let topic = hints
        .topic
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| detect_topic(content));
    let emotion = hints.emotion.filter(|e| !e.trim().is_empty());
    let sentiment = hints.sentiment.unwrap_or_else(|| detect_sentiment(content));
    let importance = hints
        .importance
        .unwrap_or_else(|| score_importance(content, role));
    EntryMetadata::new(topic, emotion, sentiment, importance, hints.session_id)
}
