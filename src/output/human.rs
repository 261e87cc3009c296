// src/output/human.rs
//! Human-readable colored terminal output

use crate::output::MatchSink;
use crate::types::MatchResult;
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct HumanOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    use_colors: bool,
}

impl HumanOutput {
    /// Create a new HumanOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            use_colors: is_terminal::is_terminal(std::io::stdout()),
        }
    }

    /// Plain text to any writer
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            use_colors: false,
        }
    }

    /// Format a timestamp as YYYY-MM-DD HH:MM:SS
    fn format_timestamp(ts: i64) -> String {
        match chrono::DateTime::from_timestamp(ts, 0) {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => ts.to_string(),
        }
    }

    fn render(&self, result: &MatchResult) -> String {
        let timestamp = Self::format_timestamp(result.discovered_at);
        let names = result.matched_names.join(", ");
        let mut out = String::new();

        if self.use_colors {
            out.push_str(&format!(
                "{} {} {} {}\n",
                format!("[{}]", timestamp).dimmed(),
                "[+]".green().bold(),
                names.cyan().bold(),
                format!("(index {})", result.index).dimmed()
            ));
        } else {
            out.push_str(&format!("[{}] [+] {} (index {})\n", timestamp, names, result.index));
        }

        let all_names = result.subject_alt_names.len()
            + usize::from(!result.common_name.is_empty());
        if all_names > result.matched_names.len() {
            let label = "All names:";
            let label = if self.use_colors {
                label.dimmed().to_string()
            } else {
                label.to_string()
            };
            let mut listed: Vec<&str> = Vec::new();
            if !result.common_name.is_empty() {
                listed.push(&result.common_name);
            }
            listed.extend(result.subject_alt_names.iter().map(String::as_str));
            out.push_str(&format!("    {} {}\n", label, listed.join(", ")));
        }

        out
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchSink for HumanOutput {
    async fn emit_match(&self, result: &MatchResult) -> anyhow::Result<()> {
        let rendered = self.render(result);

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("human output writer poisoned"))?;
        writer.write_all(rendered.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("human output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}
