//! Storage trait definitions
//!
//! A store is a string key-value backend. Implementations can be in-memory,
//! file-backed, or anything else durable.

use async_trait::async_trait;

use crate::errors::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for persistence backends
///
/// Implementations must be thread-safe (Send + Sync) as they are driven from
/// the background flush task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
