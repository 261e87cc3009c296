// src/stats.rs
//! Scan health counters

use crate::diagnostics::{EventSink, ScanEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe scan counters; clones share the same counters
#[derive(Debug, Clone)]
pub struct ScanStats {
    batches_attempted: Arc<AtomicU64>,
    batches_failed: Arc<AtomicU64>,
    batches_empty: Arc<AtomicU64>,
    entries_decoded: Arc<AtomicU64>,
    entries_failed: Arc<AtomicU64>,
    matches_found: Arc<AtomicU64>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub batches_attempted: u64,
    pub batches_failed: u64,
    pub batches_empty: u64,
    pub entries_decoded: u64,
    pub entries_failed: u64,
    pub matches_found: u64,
    pub entries_per_minute: f64,
    pub uptime_secs: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self {
            batches_attempted: Arc::new(AtomicU64::new(0)),
            batches_failed: Arc::new(AtomicU64::new(0)),
            batches_empty: Arc::new(AtomicU64::new(0)),
            entries_decoded: Arc::new(AtomicU64::new(0)),
            entries_failed: Arc::new(AtomicU64::new(0)),
            matches_found: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.start_time.elapsed();
        let decoded = self.entries_decoded.load(Ordering::Relaxed);
        let failed = self.entries_failed.load(Ordering::Relaxed);

        let rate = if elapsed.as_secs() > 0 {
            ((decoded + failed) as f64 / elapsed.as_secs() as f64) * 60.0
        } else {
            0.0
        };

        StatsSnapshot {
            batches_attempted: self.batches_attempted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            batches_empty: self.batches_empty.load(Ordering::Relaxed),
            entries_decoded: decoded,
            entries_failed: failed,
            matches_found: self.matches_found.load(Ordering::Relaxed),
            entries_per_minute: rate,
            uptime_secs: elapsed.as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let s = self.snapshot();
        format!(
            "{} batches ({} failed) | {} decoded | {} undecodable | {} matches | {:.1} entries/min | uptime: {}",
            s.batches_attempted,
            s.batches_failed,
            s.entries_decoded,
            s.entries_failed,
            s.matches_found,
            s.entries_per_minute,
            Self::format_uptime(s.uptime_secs)
        )
    }

    /// Format uptime duration
    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ScanStats {
    fn record(&self, event: &ScanEvent) {
        let counter = match event {
            ScanEvent::BatchStarted { .. } => &self.batches_attempted,
            ScanEvent::BatchFetched { .. } => return,
            ScanEvent::BatchEmpty { .. } => &self.batches_empty,
            ScanEvent::BatchFailed { .. } => &self.batches_failed,
            ScanEvent::EntryDecoded { .. } => &self.entries_decoded,
            ScanEvent::DecodeFailed { .. } => &self.entries_failed,
            ScanEvent::Matched { .. } => &self.matches_found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
