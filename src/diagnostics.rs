// src/diagnostics.rs
//! Structured scan events and the sinks that consume them

use crate::error::DecodeStage;
use crate::types::BatchRange;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something worth logging or counting that happened during a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    BatchStarted { range: BatchRange },
    BatchFetched { range: BatchRange, entries: usize },
    /// The log had nothing at this offset
    BatchEmpty { range: BatchRange },
    BatchFailed { range: BatchRange, error: String },
    EntryDecoded { index: u64 },
    DecodeFailed { index: u64, stage: DecodeStage, error: String },
    Matched { index: u64, names: Vec<String> },
}

/// Consumer of scan events. Called from worker tasks, so must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &ScanEvent);
}

/// Writes events to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    verbose: bool,
}

impl TracingSink {
    /// With `verbose`, per-entry events are logged at warn/info instead of debug
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for TracingSink {
    fn record(&self, event: &ScanEvent) {
        match event {
            ScanEvent::BatchStarted { range } => {
                debug!(%range, "Fetching batch");
            }
            ScanEvent::BatchFetched { range, entries } => {
                debug!(%range, entries, "Batch fetched");
            }
            ScanEvent::BatchEmpty { range } => {
                info!(%range, "Log returned no entries");
            }
            ScanEvent::BatchFailed { range, error } => {
                warn!(%range, %error, "Dropping batch");
            }
            ScanEvent::EntryDecoded { .. } => {}
            ScanEvent::DecodeFailed { index, stage, error } => {
                if self.verbose {
                    warn!(index, %stage, %error, "Failed to decode entry");
                } else {
                    debug!(index, %stage, %error, "Failed to decode entry");
                }
            }
            ScanEvent::Matched { index, names } => {
                if self.verbose {
                    info!(index, names = %names.join(", "), "Zone match");
                } else {
                    debug!(index, names = %names.join(", "), "Zone match");
                }
            }
        }
    }
}

/// Fans events out to every registered sink
#[derive(Clone, Default)]
pub struct Diagnostics {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn record(&self, event: ScanEvent) {
        for sink in &self.sinks {
            sink.record(&event);
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
