// src/output/json.rs
//! JSON Lines (JSONL) output and the final JSON array report

use crate::output::MatchSink;
use crate::types::MatchResult;
use anyhow::Context;
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Outputs one JSON object per line (JSONL/NDJSON format)
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Create a new JsonOutput that writes to stdout
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchSink for JsonOutput {
    async fn emit_match(&self, result: &MatchResult) -> anyhow::Result<()> {
        let json = serde_json::to_string(result)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

/// Write the whole match collection as a pretty-printed JSON array
pub fn write_report(path: &Path, matches: &[MatchResult]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, matches)
        .with_context(|| format!("Failed to write matches to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
