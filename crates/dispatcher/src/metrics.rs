//! Writer metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single writer
#[derive(Debug, Default)]
pub struct WriterMetrics {
    /// Requests accepted into the queue
    queued_count: AtomicU64,
    /// Requests a destination accepted
    delivered_count: AtomicU64,
    /// Requests a destination refused or never received
    failure_count: AtomicU64,
    /// Requests dropped due to full queue
    dropped_count: AtomicU64,
    /// Requests refused because the writer was not running
    rejected_count: AtomicU64,
}

impl WriterMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued_count(&self) -> u64 {
        self.queued_count.load(Ordering::Relaxed)
    }

    pub fn inc_queued_count(&self) {
        self.queued_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn inc_rejected_count(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued_count: self.queued_count(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            rejected_count: self.rejected_count(),
        }
    }
}

/// Snapshot of writer metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queued_count: u64,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub rejected_count: u64,
}

impl MetricsSnapshot {
    /// Requests handed to a worker that have not finished yet
    pub fn in_flight(&self) -> u64 {
        self.queued_count
            .saturating_sub(self.delivered_count + self.failure_count)
    }
}
