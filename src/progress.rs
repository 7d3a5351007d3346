use std::time::{Duration, Instant};

/// Inline progress reporting, at most one line per `interval` of wall clock.
pub struct ProgressMeter {
    label: &'static str,
    started: Instant,
    last_report: Instant,
    interval: Duration,
}

impl ProgressMeter {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(label: &'static str) -> Self {
        let now = Instant::now();
        Self {
            label,
            started: now,
            last_report: now,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// Returns whether a line was emitted.
    pub fn observe(&mut self, height: u64, chain_offset: u64, entries: usize) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_report) < self.interval {
            return false;
        }
        self.last_report = now;
        let elapsed = now.duration_since(self.started).as_secs_f64();
        tracing::info!(
            "{:8} blocks, {:8.3} mega {}, {:10.2} MB read, elapsed = {:.2}s",
            height,
            entries as f64 * 1e-6,
            self.label,
            chain_offset as f64 / (1024.0 * 1024.0),
            elapsed,
        );
        true
    }
}
