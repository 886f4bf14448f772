//! # Answer Memory
//!
//! A persistent question-to-answer cache. Questions are reduced to a
//! normalized fingerprint; answers that were accepted once can be recalled
//! later, either by exact fingerprint or by word overlap with a similar
//! question.
//!
//! ## Features
//!
//! - **Fingerprinting**: case-folded, punctuation-free, length-bounded keys
//! - **Fuzzy Recall**: word-overlap scoring when no exact key matches
//! - **Bounded Size**: least-recently-updated eviction by entry count and by
//!   persisted byte budget
//! - **Best-effort Persistence**: snapshots are written by a background task;
//!   storage failures fall back to memory-only operation
//! - **Import/Export**: the persisted JSON document doubles as the export format
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use answer_memory::{AnswerMemory, MemoryConfig, store::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> answer_memory::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let mut memory = AnswerMemory::open(MemoryConfig::default(), store).await;
//!
//!     memory.learn("What is the capital of France?", "Paris")?;
//!
//!     if let Some(recall) = memory.recall("what's the capital city of France") {
//!         println!("{} (confidence {:.2})", recall.answer, recall.confidence);
//!     }
//!
//!     memory.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod config;
mod entry;
mod errors;
mod fingerprint;
mod flush;
mod memory;
pub mod scoring;
pub mod store;

pub use config::{DEFAULT_STORAGE_KEY, MemoryConfig};
pub use entry::{Entry, LearnSource, MAX_QUESTION_CHARS, MemoryDocument, MemoryStats};
pub use errors::{MemoryError, Result, StoreError};
pub use fingerprint::{MAX_FINGERPRINT_CHARS, MIN_FINGERPRINT_CHARS, fingerprint};
pub use flush::MemoryEvent;
pub use memory::{AnswerMemory, LoadStatus, MatchKind, Recall};
pub use scoring::{FuzzyConfig, FuzzyScorer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AnswerMemory, LearnSource, MatchKind, MemoryConfig, MemoryError, Recall, Result,
        store::{FileStore, InMemoryStore, PersistentStore},
    };
}
