//! Forwarding metrics
//!
//! Process-wide counters exported through the installed `metrics` recorder.
//! Per-writer atomics live in `dispatcher::WriterMetrics`; these functions
//! feed the Prometheus view of the same events.

use metrics::{counter, gauge, histogram};

/// Request accepted into a writer queue
pub fn record_request_queued() {
    counter!("subscriber_requests_queued_total").increment(1);
}

/// Request dropped because the writer queue was full
pub fn record_request_dropped(db: &str, rp: &str, sub: &str) {
    counter!(
        "subscriber_requests_dropped_total",
        "db" => db.to_string(),
        "rp" => rp.to_string(),
        "sub" => sub.to_string()
    )
    .increment(1);
}

/// Request refused because the writer was not running
pub fn record_request_rejected(sub: &str) {
    counter!(
        "subscriber_requests_rejected_total",
        "sub" => sub.to_string()
    )
    .increment(1);
}

/// Outcome of one send to a destination
pub fn record_delivery(destination: &str, success: bool, latency_ms: f64) {
    if success {
        counter!("subscriber_requests_delivered_total").increment(1);
    } else {
        counter!(
            "subscriber_requests_failed_total",
            "dest" => destination.to_string()
        )
        .increment(1);
    }
    histogram!("subscriber_delivery_latency_ms").record(latency_ms);
}

/// Number of running writers across all databases
pub fn set_writers_active(count: usize) {
    gauge!("subscriber_writers_active").set(count as f64);
}

/// One reconciliation pass
pub fn record_reconcile(added: usize, removed: usize) {
    counter!("subscriber_reconcile_total").increment(1);
    if added > 0 {
        counter!("subscriber_writers_added_total").increment(added as u64);
    }
    if removed > 0 {
        counter!("subscriber_writers_removed_total").increment(removed as u64);
    }
}

/// Write dropped because its default retention policy could not be resolved
pub fn record_unresolved_write(db: &str) {
    counter!(
        "subscriber_unresolved_writes_total",
        "db" => db.to_string()
    )
    .increment(1);
}
