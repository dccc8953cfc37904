//! Engine configuration knobs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_entries must be at least 1")]
    ZeroCapacity,
    #[error("dimension must be at least 1")]
    ZeroDimension,
    #[error("similarity_threshold must lie in [-1.0, 1.0], got {0}")]
    ThresholdOutOfRange(f32),
}

/// Tunables for a [`MemoryEngine`][crate::engine::MemoryEngine].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard upper bound on stored entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Length of every fingerprint vector.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Minimum cosine similarity for a search hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Evict low-value entries when the store exceeds `max_entries`.
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,

    /// Mirror mutations to the durable backend, when one is attached.
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,
}

fn default_max_entries() -> usize {
    10_000
}
fn default_dimension() -> usize {
    256
}
fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            dimension: default_dimension(),
            similarity_threshold: default_similarity_threshold(),
            auto_cleanup: true,
            persistence_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.similarity_threshold));
        }
        Ok(())
    }
}
