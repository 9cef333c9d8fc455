//! Forwarding statistics for the `run` command.

use std::time::Duration;

use dispatcher::WriteSummary;

/// Statistics from a forwarding run
#[derive(Debug, Clone, Default)]
pub struct ForwardStats {
    /// Batches handed to the manager
    pub batches: u64,

    /// Lines read from stdin
    pub lines: u64,

    /// Requests accepted into writer queues
    pub queued: u64,

    /// Requests dropped because a writer queue was full
    pub dropped: u64,

    /// Requests refused by writers that were not running
    pub rejected: u64,

    /// Batches that matched no writer
    pub unrouted: u64,

    /// Time spent forwarding
    pub duration: Duration,
}

impl ForwardStats {
    pub fn record(&mut self, lines: usize, summary: WriteSummary) {
        self.batches += 1;
        self.lines += lines as u64;
        self.queued += summary.queued as u64;
        self.dropped += summary.dropped as u64;
        self.rejected += summary.rejected as u64;
        if summary.attempts() == 0 {
            self.unrouted += 1;
        }
    }

    /// Lines per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.lines as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Dropped requests as a percentage of all enqueue attempts
    pub fn drop_rate(&self) -> f64 {
        let total = self.queued + self.dropped + self.rejected;
        if total > 0 {
            (self.dropped as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Forwarding Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines);
        println!("   ├─ Batches: {} ({} unrouted)", self.batches, self.unrouted);
        println!("   └─ Lines/s: {:.2}", self.throughput());

        println!("\n📤 Requests");
        println!("   ├─ Queued: {}", self.queued);
        println!("   ├─ Dropped: {} ({:.2}%)", self.dropped, self.drop_rate());
        println!("   └─ Rejected: {}", self.rejected);

        println!();
    }
}
