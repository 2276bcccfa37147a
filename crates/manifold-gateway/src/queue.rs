//! # Bounded provider queue
//!
//! One queue per provider. Admission state lives behind a mutex; the
//! admission loop runs whenever a request enqueues or completes:
//! while `active < max_concurrent`, the rate window has room, and pending
//! work exists, pop the head, stamp the timestamp ring, and spawn an
//! executor.
//!
//! The executor races the job against the per-queue timeout and the
//! caller's cancellation token; whichever way it ends, `active` decrements
//! and the loop runs again. When only the rate window blocks admission, a
//! single delayed wake-up is scheduled for when the oldest stamp leaves the
//! window.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use manifold_core::{ChatResponse, GatewayError};

/// Boxed unit of work executed under admission control.
pub type Job = Pin<Box<dyn Future<Output = Result<ChatResponse, GatewayError>> + Send>>;

/// Queue tuning parameters.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Maximum in-flight jobs.
    pub max_concurrent: usize,
    /// Maximum pending jobs before [`GatewayError::RateLimit`] rejections.
    pub max_queue_size: usize,
    /// Sliding-window rate limit, when set.
    pub rate: Option<RateWindow>,
    /// Per-job execution timeout.
    pub timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_queue_size: 100,
            rate: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// `requests` admissions per `window`.
#[derive(Clone, Copy, Debug)]
pub struct RateWindow {
    /// Admission budget.
    pub requests: usize,
    /// Window length.
    pub window: Duration,
}

/// Point-in-time queue counters.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct QueueStats {
    /// Jobs waiting for admission.
    pub pending: usize,
    /// Jobs in flight.
    pub active: usize,
    /// Total jobs admitted since startup.
    pub admitted: u64,
}

struct Pending {
    priority: i32,
    job: Job,
    resolver: oneshot::Sender<Result<ChatResponse, GatewayError>>,
    cancel: CancellationToken,
}

struct QueueState {
    pending: VecDeque<Pending>,
    active: usize,
    admitted: u64,
    stamps: VecDeque<Instant>,
    paused: bool,
    wakeup_scheduled: bool,
}

/// Bounded-concurrency, rate-limited, priority-ordered work queue.
pub struct ProviderQueue {
    provider: String,
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl ProviderQueue {
    /// Create a queue for one provider.
    pub fn new(provider: impl Into<String>, config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            provider: provider.into(),
            config,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                active: 0,
                admitted: 0,
                stamps: VecDeque::new(),
                paused: false,
                wakeup_scheduled: false,
            }),
        })
    }

    /// The provider this queue serves.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Submit a job. Resolves when the job completes, times out, is
    /// cancelled, or the queue is cleared.
    ///
    /// Returns [`GatewayError::RateLimit`] immediately when the pending list
    /// is full. Higher `priority` admits first; FIFO within a priority.
    pub async fn enqueue(
        self: &Arc<Self>,
        job: Job,
        priority: i32,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.state.lock();
            if state.pending.len() >= self.config.max_queue_size {
                return Err(GatewayError::rate_limit(
                    format!("queue full for provider {}", self.provider),
                    None,
                ));
            }

            // Insert keeping priority non-increasing (FIFO within ties).
            let entry = Pending { priority, job, resolver: tx, cancel };
            let pos = state
                .pending
                .iter()
                .position(|p| p.priority < priority)
                .unwrap_or(state.pending.len());
            state.pending.insert(pos, entry);
        }

        self.pump();

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::internal("queue executor dropped")),
        }
    }

    /// Pause admission. In-flight jobs keep running.
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    /// Resume admission and re-run the loop.
    pub fn resume(self: &Arc<Self>) {
        self.state.lock().paused = false;
        self.pump();
    }

    /// Reject all pending jobs.
    pub fn clear(&self) {
        let drained: Vec<Pending> = {
            let mut state = self.state.lock();
            state.pending.drain(..).collect()
        };
        for entry in drained {
            let _ = entry
                .resolver
                .send(Err(GatewayError::internal("queue cleared")));
        }
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            pending: state.pending.len(),
            active: state.active,
            admitted: state.admitted,
        }
    }

    /// Whether the rate window admits another request right now. Prunes
    /// stamps older than the window; called with the state lock held.
    fn can_make_request(config: &QueueConfig, stamps: &mut VecDeque<Instant>) -> bool {
        let Some(rate) = config.rate else {
            return true;
        };
        let cutoff = Instant::now().checked_sub(rate.window);
        if let Some(cutoff) = cutoff {
            while stamps.front().is_some_and(|&s| s <= cutoff) {
                let _ = stamps.pop_front();
            }
        }
        stamps.len() < rate.requests
    }

    /// The admission loop.
    fn pump(self: &Arc<Self>) {
        loop {
            let entry = {
                let mut state = self.state.lock();
                if state.paused
                    || state.active >= self.config.max_concurrent
                    || state.pending.is_empty()
                {
                    return;
                }
                if !Self::can_make_request(&self.config, &mut state.stamps) {
                    self.schedule_rate_wakeup(&mut state);
                    return;
                }
                state.active += 1;
                state.admitted += 1;
                state.stamps.push_back(Instant::now());
                state.pending.pop_front().expect("pending checked non-empty")
            };

            let queue = Arc::clone(self);
            let _ = tokio::spawn(async move {
                queue.execute(entry).await;
            });
        }
    }

    /// Schedule a single delayed pump for when the oldest stamp leaves the
    /// rate window. Called with the state lock held.
    fn schedule_rate_wakeup(self: &Arc<Self>, state: &mut QueueState) {
        if state.wakeup_scheduled {
            return;
        }
        let Some(rate) = self.config.rate else {
            return;
        };
        let oldest = state.stamps.front().copied().unwrap_or_else(Instant::now);
        let wake_at = oldest + rate.window;
        state.wakeup_scheduled = true;

        let queue = Arc::clone(self);
        let _ = tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(wake_at)).await;
            queue.state.lock().wakeup_scheduled = false;
            queue.pump();
        });
    }

    /// Run one admitted job, racing timeout and cancellation.
    async fn execute(self: &Arc<Self>, entry: Pending) {
        let result = tokio::select! {
            result = entry.job => result,
            () = tokio::time::sleep(self.config.timeout) => {
                debug!(provider = %self.provider, "queued request timed out");
                Err(GatewayError::timeout(format!(
                    "request timed out after {}s",
                    self.config.timeout.as_secs()
                )))
            }
            () = entry.cancel.cancelled() => {
                debug!(provider = %self.provider, "queued request cancelled");
                Err(GatewayError::internal("request cancelled"))
            }
        };

        let _ = entry.resolver.send(result);

        self.state.lock().active -= 1;
        self.pump();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
