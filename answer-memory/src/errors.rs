//! Error types for the answer memory
//!
//! Only two conditions are visible to callers of the cache: bad input to
//! `learn` and a malformed import payload. Storage problems are recovered
//! inside the crate and reported through [`MemoryEvent`](crate::MemoryEvent)s.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Question text too short or empty, or answer empty
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Import payload is not a valid memory document
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Filesystem error while exporting
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, MemoryError>;

impl MemoryError {
    /// Create a new InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new InvalidFormat error
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    /// Check if the error was caused by the caller's input
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidFormat(_))
    }
}

/// Errors raised by a [`PersistentStore`](crate::store::PersistentStore) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend missing, unreadable or otherwise failing
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write does not fit in the backend's quota
    #[error("Storage quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        /// Size of the rejected value in bytes
        needed: usize,
        /// Quota of the backend in bytes
        limit: usize,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
