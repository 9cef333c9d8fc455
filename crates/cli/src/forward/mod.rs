//! Forwarding loop for the `run` command.

mod batcher;
mod reload;
mod stats;

use batcher::LineBatcher;
pub use reload::reload_on_hangup;
pub use stats::ForwardStats;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use subscriber::SubscriberManager;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Where stdin writes go
#[derive(Debug, Clone)]
pub struct ForwardTarget {
    pub db: String,
    pub rp: String,
    pub batch_lines: usize,
    pub flush_interval: Duration,
}

/// Read line protocol from stdin until EOF and hand batches to the manager
pub async fn forward_stdin(
    manager: &SubscriberManager,
    target: &ForwardTarget,
    stats: &mut ForwardStats,
) -> Result<()> {
    let started = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut batcher = LineBatcher::new(target.batch_lines);
    let mut flush = tokio::time::interval(target.flush_interval);
    flush.tick().await;

    info!(db = %target.db, rp = %target.rp, "Forwarding stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Some(batch) = batcher.push(&line) {
                            stats.record(batch.lines, manager.send(&target.db, &target.rp, batch.payload));
                        }
                    }
                    None => break,
                }
            }
            _ = flush.tick() => {
                if let Some(batch) = batcher.flush() {
                    debug!(lines = batch.lines, "Flushing partial batch");
                    stats.record(batch.lines, manager.send(&target.db, &target.rp, batch.payload));
                }
            }
        }
    }

    if let Some(batch) = batcher.flush() {
        stats.record(batch.lines, manager.send(&target.db, &target.rp, batch.payload));
    }
    stats.duration += started.elapsed();
    info!(batches = stats.batches, lines = stats.lines, "stdin closed");
    Ok(())
}
