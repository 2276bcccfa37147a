//! Request counters behind `/health`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Aggregate request counters.
#[derive(Debug)]
pub struct RequestStats {
    started: Instant,
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the counters for the health body.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RequestCounts {
    /// All requests seen.
    pub total: u64,
    /// Responses with status < 400.
    pub success: u64,
    /// Responses with status ≥ 400.
    pub failed: u64,
}

impl RequestStats {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Record one finished request.
    pub fn record(&self, status: u16) {
        let _ = self.total.fetch_add(1, Ordering::Relaxed);
        if status < 400 {
            let _ = self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            let _ = self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Seconds since startup.
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Counter snapshot.
    pub fn counts(&self) -> RequestCounts {
        RequestCounts {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_split_by_status() {
        let stats = RequestStats::new();
        stats.record(200);
        stats.record(201);
        stats.record(404);
        stats.record(500);

        let counts = stats.counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.success, 2);
        assert_eq!(counts.failed, 2);
    }

    #[test]
    fn boundary_399_is_success_400_is_failure() {
        let stats = RequestStats::new();
        stats.record(399);
        stats.record(400);
        let counts = stats.counts();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.failed, 1);
    }
}
