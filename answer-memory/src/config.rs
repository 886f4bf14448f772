//! Cache configuration

use serde::{Deserialize, Serialize};

use crate::scoring::FuzzyConfig;

/// Default storage key. The suffix is bumped whenever the document format changes.
pub const DEFAULT_STORAGE_KEY: &str = "answer_memory_v1";

/// Configuration for [`AnswerMemory`](crate::AnswerMemory)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of entries kept in the cache
    pub max_entries: usize,

    /// Fraction of `max_entries` kept after an eviction (0.0-1.0)
    pub retain_fraction: f64,

    /// Maximum size of the persisted document in bytes
    pub max_persisted_bytes: usize,

    /// Key under which the document is stored
    pub storage_key: String,

    /// Fuzzy matching parameters
    pub fuzzy: FuzzyConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            retain_fraction: 0.8,
            max_persisted_bytes: 4 * 1024 * 1024,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Number of entries kept after an eviction pass
    pub fn retain_target(&self) -> usize {
        let fraction = self.retain_fraction.clamp(0.0, 1.0);
        (self.max_entries as f64 * fraction).floor() as usize
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the retained fraction
    pub fn with_retain_fraction(mut self, retain_fraction: f64) -> Self {
        self.retain_fraction = retain_fraction;
        self
    }

    /// Set the persisted byte budget
    pub fn with_max_persisted_bytes(mut self, max_persisted_bytes: usize) -> Self {
        self.max_persisted_bytes = max_persisted_bytes;
        self
    }

    /// Set the storage key
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the fuzzy matching parameters
    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }
}
