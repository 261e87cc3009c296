// src/ct_log/generator.rs
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::shutdown::ShutdownSignal;
use crate::types::BatchRange;

/// Contiguous, non-overlapping ranges of `batch_size` offsets.
///
/// Unbounded unless `end_index` is set, in which case no range starts at or past it.
#[derive(Debug, Clone)]
pub struct BatchRanges {
    next_start: u64,
    batch_size: u64,
    end_index: Option<u64>,
}

impl BatchRanges {
    pub fn new(start_index: u64, batch_size: u64, end_index: Option<u64>) -> Self {
        Self {
            next_start: start_index,
            batch_size,
            end_index,
        }
    }

    /// Offset the next range will start at
    pub fn next_start(&self) -> u64 {
        self.next_start
    }
}

impl Iterator for BatchRanges {
    type Item = BatchRange;

    fn next(&mut self) -> Option<BatchRange> {
        if self.batch_size == 0 {
            return None;
        }
        if self.end_index.is_some_and(|end| self.next_start >= end) {
            return None;
        }

        let end = self.next_start.checked_add(self.batch_size)?;
        let range = BatchRange {
            start: self.next_start,
            end,
        };
        self.next_start = end;
        Some(range)
    }
}

/// Where the generator stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    /// Highest `end` offset placed on the work queue
    pub dispatched_end: u64,
    pub ranges_dispatched: u64,
}

/// Feeds the work queue with batch ranges at a bounded rate
pub struct BatchRangeGenerator {
    ranges: BatchRanges,
    delay: Duration,
}

impl BatchRangeGenerator {
    pub fn new(ranges: BatchRanges, delay: Duration) -> Self {
        Self { ranges, delay }
    }

    /// Produce ranges until the stop signal fires, the ranges run out, or
    /// every worker has gone away. Blocks while the queue is full.
    ///
    /// Dropping `work_tx` on return closes the queue.
    pub async fn run(
        self,
        work_tx: mpsc::Sender<BatchRange>,
        shutdown: ShutdownSignal,
    ) -> ScanProgress {
        let mut progress = ScanProgress {
            dispatched_end: self.ranges.next_start(),
            ranges_dispatched: 0,
        };

        info!(
            "Generating batches from offset {} every {:?}",
            progress.dispatched_end, self.delay
        );

        for range in self.ranges {
            if shutdown.is_triggered() {
                break;
            }

            if progress.ranges_dispatched > 0 && !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {},
                    _ = shutdown.wait() => break,
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                sent = work_tx.send(range) => {
                    if sent.is_err() {
                        debug!("Work queue closed, generator stopping");
                        break;
                    }
                }
            }

            progress.dispatched_end = range.end;
            progress.ranges_dispatched += 1;
        }

        info!(
            "Generator stopped after {} batches (next offset {})",
            progress.ranges_dispatched, progress.dispatched_end
        );

        progress
    }
}
