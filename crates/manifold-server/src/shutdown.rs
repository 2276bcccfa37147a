//! Graceful shutdown coordination.
//!
//! One `CancellationToken` fans out to the HTTP acceptor, queue executors,
//! and background sweepers. `drain` waits for registered tasks up to a
//! deadline, then aborts stragglers.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default drain deadline.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shutdown fan-out for the whole process.
pub struct Shutdown {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shutdown {
    /// Create a coordinator.
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), tasks: Mutex::new(Vec::new()) }
    }

    /// A child token for a task to watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Track a background task for draining.
    pub fn register(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Signal shutdown without waiting.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal shutdown and wait for tracked tasks, aborting anything still
    /// running at the deadline.
    pub async fn drain(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.trigger();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        info!(tasks = handles.len(), timeout_secs = timeout.as_secs(), "draining");

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(handles)).await.is_err() {
            warn!("drain deadline passed, aborting remaining tasks");
            for abort in &aborts {
                abort.abort();
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
