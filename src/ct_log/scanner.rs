// src/ct_log/scanner.rs
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::aggregator::{ResultAggregator, ScanReport};
use super::client::{CtLogClient, LogSource, RetryingSource};
use super::generator::{BatchRangeGenerator, BatchRanges};
use super::pool::ScanWorkerPool;
use crate::config::ScanConfig;
use crate::diagnostics::{Diagnostics, EventSink, TracingSink};
use crate::error::ConfigError;
use crate::output::OutputManager;
use crate::shutdown::ShutdownSignal;
use crate::stats::ScanStats;
use crate::zones::{ZoneMatcher, ZoneSet};

/// Wires generator → work queue → worker pool → result queue → aggregator
pub struct Scanner {
    config: ScanConfig,
    source: Arc<dyn LogSource>,
    matcher: Arc<ZoneMatcher>,
    diagnostics: Diagnostics,
    output: OutputManager,
    stats: ScanStats,
}

impl Scanner {
    /// Validate `config` and build a scanner over `source`.
    ///
    /// With `max_retries > 0` the source is wrapped in [`RetryingSource`]
    /// when the scan runs, tied to that run's stop signal.
    pub fn new(
        config: ScanConfig,
        zones: ZoneSet,
        source: Arc<dyn LogSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let stats = ScanStats::new();
        let diagnostics = Diagnostics::new().with_sink(Arc::new(stats.clone()));

        Ok(Self {
            matcher: Arc::new(ZoneMatcher::new(zones, config.match_strategy)),
            config,
            source,
            diagnostics,
            output: OutputManager::new(),
            stats,
        })
    }

    /// Scanner backed by an HTTP client for `config.log_url`
    pub fn from_config(config: ScanConfig, zones: ZoneSet) -> anyhow::Result<Self> {
        config.validate()?;
        let client = CtLogClient::new(config.base_url(), config.network_timeout())?;
        Ok(Self::new(config, zones, Arc::new(client))?)
    }

    /// Log scan events through `tracing`; `verbose` raises per-entry events above debug
    pub fn with_tracing(self, verbose: bool) -> Self {
        self.with_event_sink(Arc::new(TracingSink::new(verbose)))
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.diagnostics.add_sink(sink);
        self
    }

    pub fn with_output(mut self, output: OutputManager) -> Self {
        self.output = output;
        self
    }

    /// Live counters for this scan
    pub fn stats(&self) -> ScanStats {
        self.stats.clone()
    }

    /// Run until the stop signal fires, the configured end is reached, or
    /// an empty batch stops the scan. Returns once every queued result has
    /// been aggregated.
    pub async fn run(self, shutdown: ShutdownSignal) -> ScanReport {
        let (work_tx, work_rx) = mpsc::channel(self.config.queue_capacity());
        let (result_tx, result_rx) = mpsc::channel(self.config.result_capacity());

        info!(
            "Scanning {} from offset {} (batch size {}, {} workers, {} zones, {:?} matching)",
            self.config.base_url(),
            self.config.start_index,
            self.config.batch_size,
            self.config.workers,
            self.matcher.zones().len(),
            self.matcher.strategy()
        );

        let generator = BatchRangeGenerator::new(
            BatchRanges::new(
                self.config.start_index,
                self.config.batch_size,
                self.config.end_index,
            ),
            self.config.generation_delay(),
        );
        let generator_handle = tokio::spawn(generator.run(work_tx, shutdown.clone()));

        let source: Arc<dyn LogSource> = if self.config.max_retries > 0 {
            Arc::new(
                RetryingSource::new(self.source, self.config.max_retries)
                    .with_shutdown(shutdown.clone()),
            )
        } else {
            self.source
        };

        let pool = ScanWorkerPool::new(
            self.config.workers,
            source,
            self.matcher,
            self.diagnostics,
            self.config.empty_batch_policy,
        );
        let pool_handle = pool.spawn(work_rx, result_tx, shutdown.clone());

        let mut report = ResultAggregator::new(result_rx, self.output).run().await;

        match pool_handle.await {
            Ok(summary) if summary.workers_panicked > 0 => {
                error!("{} scan workers panicked", summary.workers_panicked);
            }
            Ok(_) => {}
            Err(e) => error!("Worker pool task failed: {}", e),
        }

        // Workers are gone, so a generator blocked on a full queue has been released
        match generator_handle.await {
            Ok(progress) => report.next_offset = progress.dispatched_end,
            Err(e) => error!("Generator task failed: {}", e),
        }

        info!(
            "Scan finished: {} matches, next offset {}",
            report.matches.len(),
            report.next_offset
        );

        report
    }
}
