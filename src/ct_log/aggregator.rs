// src/ct_log/aggregator.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::pool::{BatchOutcome, BatchResult};
use crate::output::OutputManager;
use crate::types::MatchResult;

/// Final outcome of a scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Matches in arrival order
    pub matches: Vec<MatchResult>,
    pub batches_completed: u64,
    pub batches_empty: u64,
    pub batches_failed: u64,
    pub entries: u64,
    pub decode_failures: u64,
    /// First offset not yet dispatched when the scan stopped
    pub next_offset: u64,
}

impl ScanReport {
    pub fn batches_attempted(&self) -> u64 {
        self.batches_completed + self.batches_empty + self.batches_failed
    }
}

/// Drains per-batch results into one ordered collection
pub struct ResultAggregator {
    result_rx: mpsc::Receiver<BatchResult>,
    output: OutputManager,
    match_count: Arc<AtomicUsize>,
}

impl ResultAggregator {
    pub fn new(result_rx: mpsc::Receiver<BatchResult>, output: OutputManager) -> Self {
        Self {
            result_rx,
            output,
            match_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Running number of matches aggregated so far
    pub fn match_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.match_count)
    }

    /// Consume results until every sender is gone.
    ///
    /// The queue only closes once the pool has drained, so results already
    /// queued at shutdown are never lost.
    pub async fn run(mut self) -> ScanReport {
        let mut report = ScanReport::default();

        while let Some(batch) = self.result_rx.recv().await {
            match batch.outcome {
                BatchOutcome::Completed => report.batches_completed += 1,
                BatchOutcome::Empty => report.batches_empty += 1,
                BatchOutcome::Failed => report.batches_failed += 1,
            }
            report.entries += batch.entries as u64;
            report.decode_failures += batch.decode_failures as u64;

            for result in batch.matches {
                if let Err(e) = self.output.emit(&result).await {
                    warn!("Output error: {:?}", e);
                }
                report.matches.push(result);
                self.match_count.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Err(e) = self.output.flush().await {
            warn!("Failed to flush output: {:?}", e);
        }

        info!(
            "Result queue drained: {} matches from {} batches ({} failed, {} empty)",
            report.matches.len(),
            report.batches_attempted(),
            report.batches_failed,
            report.batches_empty
        );

        report
    }
}
