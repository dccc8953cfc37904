//! Deterministic text encoder.
//!
//! Maps raw text to a fixed-width, L2-normalised fingerprint vector without
//! any learned state. Two signals are combined:
//!
//! 1. **Vocabulary terms** – every token found in [`VOCABULARY`] scatters its
//!    term frequency (`count / total_tokens`) into [`VOCAB_SCATTER`] hashed
//!    positions with alternating sign.
//! 2. **Character trigrams** – every token, known or not, adds
//!    [`NGRAM_WEIGHT`] to one hashed position per 3-character window, so
//!    misspellings and out-of-vocabulary words still carry signal.
//!
//! Tokens are produced by lower-casing the input, splitting on every
//! non-alphanumeric character and keeping pieces longer than two characters.
//!
//! Hashing uses 64-bit FNV-1a with fixed constants, so the same text yields
//! bit-identical vectors across processes and restarts.
//!
//! # Example
//!
//! ```rust
//! use mnemos_memory::encoder::{Encoder, cosine_similarity};
//!
//! let encoder = Encoder::new(256);
//! let a = encoder.embed("I feel anxious about work");
//! let b = encoder.embed("I feel anxious about work");
//! assert_eq!(a, b);
//! assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
//! ```

use std::collections::HashMap;

/// Number of hashed positions each vocabulary hit is scattered into.
pub const VOCAB_SCATTER: u64 = 4;

/// Contribution of a single character trigram.
pub const NGRAM_WEIGHT: f32 = 0.1;

const NGRAM_LEN: usize = 3;
const MIN_TOKEN_LEN: usize = 3;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Salts keep vocabulary and trigram positions in separate hash streams.
const VOCAB_SALT: u8 = 0x56;
const NGRAM_SALT: u8 = 0x4e;

/// Curated vocabulary: emotion terms, concern/topic terms and frequent
/// function words. The position of a word in this list is its index.
pub const VOCABULARY: &[&str] = &[
    // emotions
    "happy", "sad", "angry", "anxious", "anxiety", "worried", "worry", "scared",
    "afraid", "fear", "nervous", "calm", "relaxed", "stressed", "stress",
    "stressful", "overwhelmed", "lonely", "alone", "hopeless", "hopeful",
    "grateful", "frustrated", "upset", "depressed", "depression", "tired",
    "exhausted", "guilty", "ashamed", "proud", "excited", "peaceful", "panic",
    "hurt", "grief", "loss", "crying", "love", "hate", "feel", "feeling",
    "feelings", "mood",
    // concerns and topics
    "work", "job", "career", "boss", "office", "deadline", "money", "school",
    "exam", "family", "mother", "father", "parents", "partner", "friend",
    "friends", "relationship", "marriage", "divorce", "breakup", "sleep",
    "insomnia", "night", "health", "sick", "pain", "body", "death", "died",
    "funeral", "therapy", "breathe", "breathing", "meditation", "future",
    "past", "change", "life", "help", "support", "myself", "confidence",
    // function words
    "the", "and", "but", "about", "with", "that", "this", "what", "when",
    "why", "how", "you", "your", "not", "can", "cannot", "don't", "really",
    "always", "never", "today", "again", "just", "like", "think", "want",
    "need",
];

// ─────────────────────────────────────────────────────────────────────────────
// Encoder
// ─────────────────────────────────────────────────────────────────────────────

/// Pure text-to-vector encoder with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct Encoder {
    dimension: usize,
    vocabulary: HashMap<&'static str, usize>,
}

impl Encoder {
    /// Build an encoder producing vectors of length `dimension`
    /// (values below 1 are raised to 1).
    pub fn new(dimension: usize) -> Self {
        let vocabulary = VOCABULARY
            .iter()
            .enumerate()
            .map(|(index, word)| (*word, index))
            .collect();
        Self {
            dimension: dimension.max(1),
            vocabulary,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Encode `text` into a unit-length vector, or the zero vector when the
    /// text contributes no tokens.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        let total = tokens.len() as f32;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        for token in &tokens {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                let weight = counts[token.as_str()] as f32 / total;
                for i in 0..VOCAB_SCATTER {
                    let pos = self.slot(vocab_hash(index, i));
                    let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                    vector[pos] += sign * weight;
                }
            }

            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(NGRAM_LEN) {
                let gram: String = window.iter().collect();
                vector[self.slot(ngram_hash(&gram))] += NGRAM_WEIGHT;
            }
        }

        normalize(&mut vector);
        vector
    }

    fn slot(&self, hash: u64) -> usize {
        (hash % self.dimension as u64) as usize
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Lower-case `text` and split it into alphanumeric tokens longer than two
/// characters. Apostrophes inside a word are kept (`"don't"`).
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|piece| piece.trim_matches('\''))
        .filter(|piece| piece.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Compute the cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` if either vector has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// 64-bit FNV-1a. Must stay stable across releases so persisted vectors keep
/// matching freshly encoded queries; pinned by `fnv1a_matches_reference_values`.
fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    bytes.into_iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn vocab_hash(index: usize, i: u64) -> u64 {
    let bytes = std::iter::once(VOCAB_SALT)
        .chain((index as u64).to_le_bytes())
        .chain(i.to_le_bytes());
    fnv1a(bytes)
}

fn ngram_hash(gram: &str) -> u64 {
    fnv1a(std::iter::once(NGRAM_SALT).chain(gram.bytes()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    // ── tokenize ─────────────────────────────────────────────────────────────

    #[test]
    fn tokenize_drops_short_tokens_and_lowercases() {
        assert_eq!(
            tokenize("I am SO Worried, about it!"),
            vec!["worried".to_string(), "about".to_string()]
        );
    }

    #[test]
    fn tokenize_keeps_inner_apostrophes() {
        assert_eq!(tokenize("I don't know"), vec!["don't", "know"]);
        assert_eq!(tokenize("'quoted'"), vec!["quoted"]);
    }

    #[test]
    fn tokenize_punctuation_only_is_empty() {
        assert!(tokenize("?!... --- ;;").is_empty());
    }

    // ── embed ────────────────────────────────────────────────────────────────

    #[test]
    fn embed_is_deterministic() {
        let enc = Encoder::new(256);
        let text = "That sounds stressful, let's breathe";
        assert_eq!(enc.embed(text), enc.embed(text));
        // A fresh encoder instance must agree bit-for-bit.
        assert_eq!(enc.embed(text), Encoder::new(256).embed(text));
    }

    #[test]
    fn embed_has_configured_dimension() {
        assert_eq!(Encoder::new(64).embed("hello world").len(), 64);
        assert_eq!(Encoder::new(0).dimension(), 1);
    }

    #[test]
    fn embed_is_unit_length() {
        let enc = Encoder::new(256);
        for text in ["I feel anxious about work", "qwertyuiop", "grief and loss"] {
            let v = enc.embed(text);
            assert!((norm(&v) - 1.0).abs() < 1e-5, "norm for {text:?} was {}", norm(&v));
        }
    }

    #[test]
    fn embed_empty_and_punctuation_are_zero() {
        let enc = Encoder::new(32);
        assert!(enc.embed("").iter().all(|&x| x == 0.0));
        assert!(enc.embed("?! ...").iter().all(|&x| x == 0.0));
        assert!(enc.embed("a an I").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn embed_out_of_vocabulary_still_contributes() {
        let enc = Encoder::new(256);
        let v = enc.embed("zyzzyva");
        assert!(norm(&v) > 0.0);
    }

    #[test]
    fn misspelling_stays_close() {
        let enc = Encoder::new(256);
        let right = enc.embed("meditation");
        let typo = enc.embed("meditaton");
        let other = enc.embed("spreadsheet");
        assert!(cosine_similarity(&right, &typo) > cosine_similarity(&right, &other));
    }

    #[test]
    fn related_turns_rank_above_unrelated() {
        let enc = Encoder::new(256);
        let query = enc.embed("I'm worried about my job");
        let work = enc.embed("I feel anxious about work");
        let grief = enc.embed("Coping with grief and loss");
        assert!(cosine_similarity(&query, &work) > cosine_similarity(&query, &grief));
    }

    // ── cosine_similarity ────────────────────────────────────────────────────

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_returns_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_length_mismatch_returns_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    // ── hashing ──────────────────────────────────────────────────────────────

    #[test]
    fn fnv1a_matches_reference_values() {
        // Published FNV-1a 64-bit test vectors.
        assert_eq!(fnv1a(std::iter::empty()), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a".bytes()), 0xaf63_dc4c_8601_ec8c);
    }
}
