//! Background persistence
//!
//! Mutations hand a serialized snapshot to a single worker task over an
//! unbounded channel. The worker applies commands in order, so the persisted
//! copy may lag the in-memory cache but never gets ahead of it. Consecutive
//! writes are coalesced: only the newest snapshot is written.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::store::PersistentStore;

/// Status events emitted by the cache and its flush worker
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// Persisted data was loaded at startup
    Loaded {
        /// Number of entries restored
        entries: usize,
    },
    /// Persisted data could not be read or parsed; the cache started empty
    LoadFailed {
        /// Why loading failed
        reason: String,
    },
    /// A snapshot was written to the store
    FlushCompleted {
        /// Size of the written document
        bytes: usize,
    },
    /// The store rejected a write or delete
    FlushFailed {
        /// Error reported by the store
        reason: String,
    },
    /// A snapshot was still too large after eviction and was not written.
    /// `limit` is the configured byte budget or the store's quota.
    FlushDropped {
        /// Size of the rejected document
        bytes: usize,
        /// Budget or quota that was exceeded
        limit: usize,
    },
    /// Entries were evicted
    Evicted {
        /// Number of entries removed
        removed: usize,
        /// Number of entries left
        remaining: usize,
    },
    /// The store stopped working; persistence is off for this session
    MemoryOnly {
        /// Error that triggered the switch
        reason: String,
    },
    /// The cache and its persisted copy were cleared
    Cleared,
}

/// Flags shared between the cache and the worker
#[derive(Debug, Default)]
pub(crate) struct FlushState {
    memory_only: AtomicBool,
    quota_pressure: AtomicBool,
}

impl FlushState {
    pub(crate) fn memory_only(&self) -> bool {
        self.memory_only.load(Ordering::SeqCst)
    }

    pub(crate) fn set_memory_only(&self) {
        self.memory_only.store(true, Ordering::SeqCst);
    }

    /// True while a quota rejection waits for an eviction and retry
    pub(crate) fn quota_pressure(&self) -> bool {
        self.quota_pressure.load(Ordering::SeqCst)
    }

    /// Returns true once after the store reported a quota error
    pub(crate) fn take_quota_pressure(&self) -> bool {
        self.quota_pressure.swap(false, Ordering::SeqCst)
    }

    fn set_quota_pressure(&self) {
        self.quota_pressure.store(true, Ordering::SeqCst);
    }
}

enum FlushCommand {
    /// `retry` marks the second attempt after a quota rejection
    Write { payload: String, retry: bool },
    Delete,
    Barrier(oneshot::Sender<()>),
}

/// Handle to the background flush task
pub(crate) struct FlushWorker {
    tx: mpsc::UnboundedSender<FlushCommand>,
    task: JoinHandle<()>,
    state: Arc<FlushState>,
}

impl FlushWorker {
    /// Spawn the worker on the current tokio runtime
    pub(crate) fn spawn(
        store: Arc<dyn PersistentStore>,
        key: String,
        events: broadcast::Sender<MemoryEvent>,
        state: Arc<FlushState>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, key, rx, events, state.clone()));
        Self { tx, task, state }
    }

    pub(crate) fn state(&self) -> &FlushState {
        &self.state
    }

    /// Queue a snapshot write. Never blocks.
    pub(crate) fn write(&self, payload: String, retry: bool) {
        self.send(FlushCommand::Write { payload, retry });
    }

    /// Queue removal of the persisted copy. Never blocks.
    pub(crate) fn delete(&self) {
        self.send(FlushCommand::Delete);
    }

    /// Wait until everything queued so far has been applied
    pub(crate) async fn barrier(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(FlushCommand::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drain the queue and stop the worker
    pub(crate) async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("Flush worker ended abnormally: {}", e);
        }
    }

    fn send(&self, command: FlushCommand) {
        if self.tx.send(command).is_err() {
            warn!("Flush worker is gone, dropping persistence command");
        }
    }
}

async fn run(
    store: Arc<dyn PersistentStore>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<FlushCommand>,
    events: broadcast::Sender<MemoryEvent>,
    state: Arc<FlushState>,
) {
    let mut next: Option<FlushCommand> = None;

    loop {
        let command = match next.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            FlushCommand::Write {
                mut payload,
                mut retry,
            } => {
                // Coalesce with any writes already queued behind this one
                while let Ok(queued) = rx.try_recv() {
                    match queued {
                        FlushCommand::Write {
                            payload: newer,
                            retry: newer_retry,
                        } => {
                            payload = newer;
                            retry |= newer_retry;
                        },
                        other => {
                            next = Some(other);
                            break;
                        },
                    }
                }

                if state.memory_only() {
                    continue;
                }

                let bytes = payload.len();
                match store.set(&key, &payload).await {
                    Ok(()) => {
                        debug!("Flushed {} bytes to {}", bytes, key);
                        let _ = events.send(MemoryEvent::FlushCompleted { bytes });
                    },
                    Err(e) => report_failure(&e, retry, &events, &state),
                }
            },
            FlushCommand::Delete => {
                if state.memory_only() {
                    continue;
                }
                if let Err(e) = store.delete(&key).await {
                    report_failure(&e, false, &events, &state);
                }
            },
            FlushCommand::Barrier(done) => {
                let _ = done.send(());
            },
        }
    }

    debug!("Flush worker for {} stopped", key);
}

fn report_failure(
    error: &StoreError,
    retry: bool,
    events: &broadcast::Sender<MemoryEvent>,
    state: &FlushState,
) {
    warn!("Persisting answer memory failed: {}", error);
    let _ = events.send(MemoryEvent::FlushFailed {
        reason: error.to_string(),
    });

    match error {
        StoreError::Unavailable(_) => {
            warn!("Store unavailable, continuing in memory-only mode");
            state.set_memory_only();
            let _ = events.send(MemoryEvent::MemoryOnly {
                reason: error.to_string(),
            });
        },
        StoreError::QuotaExceeded { needed, limit } if retry => {
            warn!("Snapshot rejected again after eviction, not persisting");
            let _ = events.send(MemoryEvent::FlushDropped {
                bytes: *needed,
                limit: *limit,
            });
        },
        StoreError::QuotaExceeded { .. } => state.set_quota_pressure(),
    }
}
