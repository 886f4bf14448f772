//! Cache entries and the persisted document shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of characters of the original question kept on an entry.
pub const MAX_QUESTION_CHARS: usize = 200;

/// How an entry was learned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearnSource {
    /// Discovered by the trial loop
    #[default]
    Auto,
    /// Supplied directly by the caller
    Manual,
    /// Loaded from an import payload
    Import,
    /// Accepted when one fixed answer was submitted to every question
    Fixed,
}

/// One remembered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Answer that was accepted as correct
    #[serde(rename = "a")]
    pub answer: String,

    /// Times this entry has been learned or reinforced
    #[serde(rename = "count", default = "default_hit_count")]
    pub hit_count: u32,

    /// Epoch milliseconds of the last write
    #[serde(rename = "time", default)]
    pub last_updated: i64,

    /// Original question text, truncated
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    /// How the entry was learned
    #[serde(default)]
    pub source: LearnSource,
}

impl LearnSource {
    /// Map a free-form source label from an export. Unknown labels count as imports.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "auto" | "learning" => Self::Auto,
            "manual" => Self::Manual,
            "fixed" | "spam" => Self::Fixed,
            _ => Self::Import,
        }
    }
}

fn default_hit_count() -> u32 {
    1
}

impl Entry {
    /// Create a fresh entry with a hit count of 1
    pub fn new(answer: impl Into<String>, last_updated: i64, source: LearnSource) -> Self {
        Self {
            answer: answer.into(),
            hit_count: 1,
            last_updated,
            question: None,
            source,
        }
    }

    /// Attach the original question text, truncated to [`MAX_QUESTION_CHARS`]
    pub fn with_question(mut self, question: &str) -> Self {
        self.question = Some(question.trim().chars().take(MAX_QUESTION_CHARS).collect());
        self
    }
}

/// Aggregate counters persisted next to the entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Successful `learn` calls since the data was created or cleared
    #[serde(default)]
    pub learned: u64,

    /// Epoch milliseconds of the last mutation
    #[serde(default)]
    pub last_update: i64,
}

/// The JSON document written to the store and used for export/import
///
/// ```json
/// { "questions": { "<fingerprint>": { "a": "...", "count": 1, "time": 0 } },
///   "stats": { "learned": 1, "lastUpdate": 0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Entries keyed by fingerprint
    pub questions: BTreeMap<String, Entry>,

    /// Aggregate counters
    #[serde(default)]
    pub stats: MemoryStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_wire_names() {
        let entry = Entry::new("Paris", 1_700_000_000_000, LearnSource::Auto)
            .with_question("What is the capital of France?");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            value,
            json!({
                "a": "Paris",
                "count": 1,
                "time": 1_700_000_000_000i64,
                "q": "What is the capital of France?",
                "source": "auto"
            })
        );
    }

    #[test]
    fn test_entry_optional_fields_default() {
        let entry: Entry = serde_json::from_value(json!({ "a": "B" })).unwrap();

        assert_eq!(entry.answer, "B");
        assert_eq!(entry.hit_count, 1);
        assert_eq!(entry.last_updated, 0);
        assert_eq!(entry.question, None);
        assert_eq!(entry.source, LearnSource::Auto);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(LearnSource::from_label("learning"), LearnSource::Auto);
        assert_eq!(LearnSource::from_label(" Manual "), LearnSource::Manual);
        assert_eq!(LearnSource::from_label("spam"), LearnSource::Fixed);
        assert_eq!(LearnSource::from_label("other"), LearnSource::Import);
    }

    #[test]
    fn test_question_truncated() {
        let long = "q".repeat(MAX_QUESTION_CHARS * 2);
        let entry = Entry::new("A", 0, LearnSource::Manual).with_question(&long);
        assert_eq!(entry.question.unwrap().len(), MAX_QUESTION_CHARS);
    }

    #[test]
    fn test_document_without_stats() {
        let doc: MemoryDocument = serde_json::from_value(json!({
            "questions": { "some question text": { "a": "C", "count": 3, "time": 5 } }
        }))
        .unwrap();

        assert_eq!(doc.questions.len(), 1);
        assert_eq!(doc.questions["some question text"].hit_count, 3);
        assert_eq!(doc.stats, MemoryStats::default());
    }
}
