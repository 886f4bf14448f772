//! Storage abstractions for the answer memory
//!
//! The cache persists a single JSON document through a [`PersistentStore`].
//!
//! ## Available Backends
//!
//! - `memory`: process-local map with an optional byte quota
//! - `file`: one file per key under a directory

mod file;
mod memory;
mod traits;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::*;
