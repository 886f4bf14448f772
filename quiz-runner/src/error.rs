use answer_memory::{MemoryError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Question source error: {0}")]
    Source(#[source] anyhow::Error),

    #[error("Answer trial error: {0}")]
    Trial(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Usage: {0}")]
    Usage(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
