// src/output/mod.rs
//! Output handling for matched certificates
//!
//! Sinks receive matches one at a time as the aggregator drains them, so a
//! long scan reports results while it is still running.

use crate::types::MatchResult;
use async_trait::async_trait;
use std::sync::Arc;

pub mod human;
pub mod json;

/// Receives matched certificates as they are aggregated
#[async_trait]
pub trait MatchSink: Send + Sync {
    async fn emit_match(&self, result: &MatchResult) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Dispatches each match to every registered sink
#[derive(Clone, Default)]
pub struct OutputManager {
    sinks: Vec<Arc<dyn MatchSink>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn MatchSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Emit a match to all sinks
    ///
    /// A failing sink is logged and skipped; an error is returned only when
    /// every sink failed.
    pub async fn emit(&self, result: &MatchResult) -> anyhow::Result<()> {
        let mut failures = 0;
        let mut last_error = None;

        for sink in &self.sinks {
            if let Err(e) = sink.emit_match(result).await {
                tracing::warn!("Output sink error: {}", e);
                failures += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(err) if failures == self.sinks.len() => Err(err),
            _ => Ok(()),
        }
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}
