//! Word-overlap scoring for fuzzy recall.
//!
//! A query and a cached fingerprint are both reduced to their sets of
//! significant words (words of at least `min_word_len` characters). The
//! overlap score is
//!
//! ```text
//! |common words| / max(|query words|, |candidate words|)
//! ```
//!
//! which is 1.0 for identical word sets and 0.0 when nothing is shared.

use serde::{Deserialize, Serialize};

use crate::fingerprint::significant_words;

/// Configuration for fuzzy matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// A candidate is accepted only if its score is strictly above this value
    pub threshold: f64,

    /// Minimum length of a word to count as significant
    pub min_word_len: usize,

    /// Minimum number of significant words the query needs
    pub min_query_words: usize,

    /// Maximum number of cached entries inspected per lookup
    pub max_candidates: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_word_len: 4,
            min_query_words: 2,
            max_candidates: 100,
        }
    }
}

/// Best candidate found by a fuzzy scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyHit<'a> {
    /// Fingerprint of the matching entry
    pub fingerprint: &'a str,
    /// Overlap score in (threshold, 1.0]
    pub score: f64,
}

/// Scores query fingerprints against cached ones.
#[derive(Debug, Clone, Default)]
pub struct FuzzyScorer {
    config: FuzzyConfig,
}

impl FuzzyScorer {
    /// Creates a new scorer with the given configuration.
    pub fn new(config: FuzzyConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    /// Computes the overlap score between two word sets.
    ///
    /// Returns 0.0 if either set is empty.
    pub fn overlap_score(&self, query_words: &[&str], candidate_words: &[&str]) -> f64 {
        if query_words.is_empty() || candidate_words.is_empty() {
            return 0.0;
        }

        let common = query_words
            .iter()
            .filter(|word| candidate_words.contains(word))
            .count();

        common as f64 / query_words.len().max(candidate_words.len()) as f64
    }

    /// Finds the best fuzzy match for `query` among `candidates`.
    ///
    /// At most `max_candidates` candidates are inspected, in iteration order.
    /// Earlier candidates win ties.
    pub fn best_match<'a, I>(&self, query: &str, candidates: I) -> Option<FuzzyHit<'a>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let query_words = significant_words(query, self.config.min_word_len);
        if query_words.len() < self.config.min_query_words {
            return None;
        }

        let mut best: Option<FuzzyHit<'a>> = None;
        for candidate in candidates.into_iter().take(self.config.max_candidates) {
            let candidate_words = significant_words(candidate, self.config.min_word_len);
            let score = self.overlap_score(&query_words, &candidate_words);

            if score > self.config.threshold && best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(FuzzyHit {
                    fingerprint: candidate,
                    score,
                });
            }
        }

        best
    }
}
