//! The answer memory cache.
//!
//! [`AnswerMemory`] maps question fingerprints to answers that were accepted
//! before. Lookups try the exact fingerprint first and fall back to
//! word-overlap scoring. All cache operations are synchronous and run on the
//! owning task; persistence is handed to a background [`FlushWorker`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::entry::{Entry, LearnSource, MAX_QUESTION_CHARS, MemoryDocument, MemoryStats};
use crate::errors::{MemoryError, Result};
use crate::fingerprint::{MIN_FINGERPRINT_CHARS, fingerprint, normalize};
use crate::flush::{FlushState, FlushWorker, MemoryEvent};
use crate::scoring::FuzzyScorer;
use crate::store::PersistentStore;

/// Capacity of the status event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How a recalled answer was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    /// The query's fingerprint is a cached key
    Exact,
    /// Found through word overlap
    Fuzzy {
        /// Overlap score of the chosen entry
        score: f64,
    },
}

/// A remembered answer returned by [`AnswerMemory::recall`]
#[derive(Debug, Clone, PartialEq)]
pub struct Recall {
    /// The remembered answer
    pub answer: String,
    /// Hit count of the matched entry
    pub hit_count: u32,
    /// How the entry was found
    pub kind: MatchKind,
    /// `hit_count` for exact matches, `hit_count * score` for fuzzy ones
    pub confidence: f64,
}

impl Recall {
    /// True for exact matches
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, MatchKind::Exact)
    }
}

/// Outcome of loading persisted data at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing was stored yet
    Fresh,
    /// Entries were restored from the store
    Restored {
        /// Number of entries restored
        entries: usize,
    },
    /// Stored data did not parse; started empty
    Corrupt,
    /// The store failed; running in memory-only mode
    Unavailable,
}

#[derive(Serialize)]
struct DocumentView<'a, Q> {
    questions: Q,
    stats: &'a MemoryStats,
}

/// Import-side entry: every field but the answer is optional
#[derive(Deserialize)]
struct ImportedEntry {
    a: String,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// Persistent question-to-answer cache with fuzzy recall
pub struct AnswerMemory {
    config: MemoryConfig,
    scorer: FuzzyScorer,
    entries: BTreeMap<String, Entry>,
    stats: MemoryStats,
    load_status: LoadStatus,
    events: broadcast::Sender<MemoryEvent>,
    flusher: FlushWorker,
}

impl AnswerMemory {
    /// Load the cache from `store` and start the background flush worker.
    ///
    /// Never fails: missing data gives an empty cache, corrupt data gives an
    /// empty cache, and a failing store gives an empty cache in memory-only
    /// mode. Must be called from within a tokio runtime.
    pub async fn open(config: MemoryConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self::open_subscribed(config, store).await.0
    }

    /// Like [`open`](Self::open), also returning a receiver that already
    /// holds the [`MemoryEvent::Loaded`] or [`MemoryEvent::LoadFailed`] event
    pub async fn open_subscribed(
        config: MemoryConfig,
        store: Arc<dyn PersistentStore>,
    ) -> (Self, broadcast::Receiver<MemoryEvent>) {
        let (events, receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(FlushState::default());

        let (document, load_status) = match store.get(&config.storage_key).await {
            Ok(None) => (MemoryDocument::default(), LoadStatus::Fresh),
            Ok(Some(raw)) => match serde_json::from_str::<MemoryDocument>(&raw) {
                Ok(document) => {
                    let entries = document.questions.len();
                    info!("Restored {} remembered answers", entries);
                    let _ = events.send(MemoryEvent::Loaded { entries });
                    (document, LoadStatus::Restored { entries })
                },
                Err(e) => {
                    warn!("Stored answer memory is corrupt, starting empty: {}", e);
                    let _ = events.send(MemoryEvent::LoadFailed {
                        reason: e.to_string(),
                    });
                    (MemoryDocument::default(), LoadStatus::Corrupt)
                },
            },
            Err(e) => {
                warn!("Answer memory store unavailable, memory-only mode: {}", e);
                state.set_memory_only();
                let _ = events.send(MemoryEvent::LoadFailed {
                    reason: e.to_string(),
                });
                (MemoryDocument::default(), LoadStatus::Unavailable)
            },
        };

        let flusher = FlushWorker::spawn(store, config.storage_key.clone(), events.clone(), state);

        let mut memory = Self {
            scorer: FuzzyScorer::new(config.fuzzy.clone()),
            config,
            entries: document
                .questions
                .into_iter()
                .filter(|(key, entry)| !key.is_empty() && !entry.answer.is_empty())
                .collect(),
            stats: document.stats,
            load_status,
            events,
            flusher,
        };

        if memory.evict_if_needed() {
            memory.persist();
        }

        (memory, receiver)
    }

    /// Remember `answer` for `question_text`
    ///
    /// # Errors
    /// [`MemoryError::InvalidInput`] if the question normalizes to fewer than
    /// [`MIN_FINGERPRINT_CHARS`] characters or the answer is empty.
    pub fn learn(&mut self, question_text: &str, answer: &str) -> Result<()> {
        self.learn_with_source(question_text, answer, LearnSource::Manual)
    }

    /// Remember an answer, recording how it was obtained
    pub fn learn_with_source(
        &mut self,
        question_text: &str,
        answer: &str,
        source: LearnSource,
    ) -> Result<()> {
        self.learn_at(question_text, answer, source, now_ms())
    }

    /// Remember an answer with an explicit timestamp (epoch milliseconds)
    pub fn learn_at(
        &mut self,
        question_text: &str,
        answer: &str,
        source: LearnSource,
        timestamp_ms: i64,
    ) -> Result<()> {
        let key = fingerprint(question_text)?;
        if key.chars().count() < MIN_FINGERPRINT_CHARS {
            return Err(MemoryError::invalid_input(format!(
                "question text too short: {key:?} (need at least {MIN_FINGERPRINT_CHARS} characters)"
            )));
        }

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(MemoryError::invalid_input("answer is empty"));
        }

        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.answer = answer.to_string();
                entry.hit_count = entry.hit_count.saturating_add(1);
                entry.last_updated = timestamp_ms;
                entry.source = source;
                debug!("Reinforced {:?} → {} ({}x)", key, answer, entry.hit_count);
            },
            None => {
                debug!("Learned {:?} → {}", key, answer);
                self.entries.insert(
                    key,
                    Entry::new(answer, timestamp_ms, source).with_question(question_text),
                );
            },
        }

        self.stats.learned += 1;
        self.stats.last_update = timestamp_ms;

        self.evict_if_needed();
        self.persist();
        Ok(())
    }

    /// Look up a remembered answer, exact fingerprint first, then fuzzy
    pub fn recall(&self, question_text: &str) -> Option<Recall> {
        let key = normalize(question_text);
        if key.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.get(&key) {
            debug!("Exact recall for {:?}: {}", key, entry.answer);
            return Some(Recall {
                answer: entry.answer.clone(),
                hit_count: entry.hit_count,
                kind: MatchKind::Exact,
                confidence: entry.hit_count as f64,
            });
        }

        let hit = self
            .scorer
            .best_match(&key, self.entries.keys().map(String::as_str))?;
        let entry = self.entries.get(hit.fingerprint)?;
        debug!(
            "Fuzzy recall for {:?}: {} ({:.0}%)",
            key,
            entry.answer,
            hit.score * 100.0
        );

        Some(Recall {
            answer: entry.answer.clone(),
            hit_count: entry.hit_count,
            kind: MatchKind::Fuzzy { score: hit.score },
            confidence: entry.hit_count as f64 * hit.score,
        })
    }

    /// Read-only snapshot of all entries keyed by fingerprint
    pub fn export_all(&self) -> BTreeMap<String, Entry> {
        self.entries.clone()
    }

    /// Snapshot in the persisted document shape
    pub fn export_document(&self) -> MemoryDocument {
        MemoryDocument {
            questions: self.entries.clone(),
            stats: self.stats,
        }
    }

    /// Pretty-printed JSON export
    pub fn export_json(&self) -> Result<String> {
        let view = DocumentView {
            questions: &self.entries,
            stats: &self.stats,
        };
        serde_json::to_string_pretty(&view)
            .map_err(|e| MemoryError::invalid_format(format!("cannot serialize export: {e}")))
    }

    /// File name for an export taken on `date`
    pub fn export_file_name(date: NaiveDate) -> String {
        format!("answer_memory_{}.json", date.format("%Y-%m-%d"))
    }

    /// Write a dated export file into `dir` and return its path
    pub async fn export_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let path = dir.join(Self::export_file_name(Local::now().date_naive()));
        let json = self.export_json()?;

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, json).await?;
        info!(
            "Exported {} answers to {}",
            self.entries.len(),
            path.display()
        );
        Ok(path)
    }

    /// Replace the cache with the contents of a JSON export
    ///
    /// Entries keep their answer, count, time, question and source when
    /// present. Keys that are not already fingerprints are recomputed from
    /// the entry's question text when it has one, so exports with other key
    /// schemes still import.
    /// Returns the number of entries imported.
    ///
    /// # Errors
    /// [`MemoryError::InvalidFormat`] if the payload is not an object with a
    /// `questions` object or an entry is malformed. The cache is untouched.
    pub fn import(&mut self, payload: &str) -> Result<usize> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| MemoryError::invalid_format(format!("not JSON: {e}")))?;
        let questions = value
            .as_object()
            .and_then(|root| root.get("questions"))
            .and_then(|q| q.as_object())
            .ok_or_else(|| MemoryError::invalid_format("expected an object with a `questions` object"))?;

        let now = now_ms();
        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();

        for (raw_key, raw_entry) in questions {
            let imported: ImportedEntry = serde_json::from_value(raw_entry.clone())
                .map_err(|e| MemoryError::invalid_format(format!("entry {raw_key:?}: {e}")))?;

            let answer = imported.a.trim();
            if answer.is_empty() {
                continue;
            }

            let normalized_key = normalize(raw_key);
            let key = if normalized_key == *raw_key {
                normalized_key
            } else {
                imported
                    .q
                    .as_deref()
                    .map(normalize)
                    .filter(|k| !k.is_empty())
                    .unwrap_or(normalized_key)
            };
            if key.is_empty() {
                continue;
            }

            let entry = Entry {
                answer: answer.to_string(),
                hit_count: imported.count.unwrap_or(1).max(1),
                last_updated: imported.time.filter(|t| *t > 0).unwrap_or(now),
                question: imported
                    .q
                    .map(|q| q.trim().chars().take(MAX_QUESTION_CHARS).collect()),
                source: imported
                    .source
                    .as_deref()
                    .map_or(LearnSource::Import, LearnSource::from_label),
            };

            match entries.get(&key) {
                Some(existing) if existing.last_updated >= entry.last_updated => {},
                _ => {
                    entries.insert(key, entry);
                },
            }
        }

        let stats = value
            .get("stats")
            .and_then(|s| serde_json::from_value::<MemoryStats>(s.clone()).ok())
            .unwrap_or(MemoryStats {
                learned: entries.len() as u64,
                last_update: now,
            });

        let count = entries.len();
        self.entries = entries;
        self.stats = stats;
        info!("Imported {} answers", count);

        self.evict_if_needed();
        self.persist();
        Ok(count)
    }

    /// Empty the cache and delete the persisted copy. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = MemoryStats::default();
        if !self.flusher.state().memory_only() {
            self.flusher.delete();
        }
        info!("Answer memory cleared");
        let _ = self.events.send(MemoryEvent::Cleared);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate counters
    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Configuration in use
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Outcome of the startup load
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// True once persistence has been turned off for this session
    pub fn is_memory_only(&self) -> bool {
        self.flusher.state().memory_only()
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Wait until every flush dispatched so far has been applied
    ///
    /// If the store rejected the last snapshot for its quota, the cache is
    /// shrunk and the snapshot written once more before this returns.
    pub async fn wait_for_flush(&mut self) {
        self.flusher.barrier().await;
        if self.flusher.state().quota_pressure() {
            self.persist();
            self.flusher.barrier().await;
        }
    }

    /// Flush pending writes and stop the worker
    pub async fn close(mut self) {
        self.wait_for_flush().await;
        self.flusher.close().await;
    }

    /// Run capacity eviction. Returns true if anything was removed.
    fn evict_if_needed(&mut self) -> bool {
        if self.entries.len() <= self.config.max_entries {
            return false;
        }
        self.evict_to(self.config.retain_target()) > 0
    }

    /// Remove the least recently updated entries until `target` remain
    fn evict_to(&mut self, target: usize) -> usize {
        let doomed = self.oldest_keys(self.entries.len().saturating_sub(target));
        self.remove_entries(&doomed)
    }

    /// Keys of the `count` least recently updated entries, ties by key
    fn oldest_keys(&self, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }

        let mut by_age: Vec<(i64, &String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_updated, key))
            .collect();
        by_age.sort();

        by_age
            .into_iter()
            .take(count)
            .map(|(_, key)| key.clone())
            .collect()
    }

    fn remove_entries(&mut self, doomed: &[String]) -> usize {
        if doomed.is_empty() {
            return 0;
        }
        for key in doomed {
            self.entries.remove(key);
        }

        let removed = doomed.len();
        let remaining = self.entries.len();
        info!("Evicted {} answers, {} remaining", removed, remaining);
        let _ = self.events.send(MemoryEvent::Evicted { removed, remaining });
        removed
    }

    /// Entries a forced eviction removes: the retain fraction of the cache,
    /// and at least one entry
    fn forced_eviction(&self) -> Vec<String> {
        let len = self.entries.len();
        let fraction = self.config.retain_fraction.clamp(0.0, 1.0);
        let target = ((len as f64 * fraction).floor() as usize).min(len.saturating_sub(1));
        self.oldest_keys(len - target)
    }

    /// Serialize the cache and hand it to the flush worker
    fn persist(&mut self) {
        if self.flusher.state().memory_only() {
            return;
        }

        let retry = self.flusher.state().take_quota_pressure();
        if retry {
            debug!("Store quota exceeded; evicting before writing again");
            let doomed = self.forced_eviction();
            self.remove_entries(&doomed);
        }

        let limit = self.config.max_persisted_bytes;
        let Some(mut payload) = self.serialize(&[]) else {
            return;
        };

        if payload.len() > limit {
            debug!(
                "Snapshot is {} bytes, budget is {}; evicting",
                payload.len(),
                limit
            );
            let doomed = self.forced_eviction();
            let Some(trimmed) = self.serialize(&doomed) else {
                return;
            };

            if trimmed.len() > limit {
                // Evicting would not make it fit: keep every entry in memory
                warn!(
                    "Snapshot still {} bytes after eviction (budget {}), not persisting",
                    trimmed.len(),
                    limit
                );
                let _ = self.events.send(MemoryEvent::FlushDropped {
                    bytes: trimmed.len(),
                    limit,
                });
                return;
            }

            self.remove_entries(&doomed);
            payload = trimmed;
        }

        self.flusher.write(payload, retry);
    }

    /// Serialize the cache as it would be without the `skip` keys
    fn serialize(&self, skip: &[String]) -> Option<String> {
        let result = if skip.is_empty() {
            serde_json::to_string(&DocumentView {
                questions: &self.entries,
                stats: &self.stats,
            })
        } else {
            let kept: BTreeMap<&str, &Entry> = self
                .entries
                .iter()
                .filter(|(key, _)| !skip.contains(key))
                .map(|(key, entry)| (key.as_str(), entry))
                .collect();
            serde_json::to_string(&DocumentView {
                questions: kept,
                stats: &self.stats,
            })
        };

        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("Cannot serialize answer memory: {}", e);
                let _ = self.events.send(MemoryEvent::FlushFailed {
                    reason: e.to_string(),
                });
                None
            },
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
