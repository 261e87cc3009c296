// src/cli.rs
use clap::Parser;

/// ct-zonescan: Certificate Transparency batch scanner
///
/// Walks a CT log in fixed-size batches and reports certificates whose
/// names fall inside the watched zones.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-zonescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: String,

    /// JSON file holding the array of watched zones
    #[arg(short = 'z', long = "zones", default_value = "zones.json")]
    pub zones: String,

    /// Override the CT log URL from config
    #[arg(long = "log-url")]
    pub log_url: Option<String>,

    // ===== Scan Window =====
    /// First log index to scan
    #[arg(long = "start")]
    pub start: Option<u64>,

    /// Stop before this log index
    #[arg(long = "end")]
    pub end: Option<u64>,

    /// Stop at the log's current tree size (from get-sth)
    #[arg(long = "to-head")]
    pub to_head: bool,

    // ===== Performance =====
    /// Override number of scan workers
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Override batch size
    #[arg(long = "batch-size")]
    pub batch_size: Option<u64>,

    // ===== Output =====
    /// Output matches in JSONL format to stdout
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Suppress per-match stdout output
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Write all matches as a JSON array to this file when the scan ends
    #[arg(short = 'o', long = "output-file")]
    pub output_file: Option<String>,

    // ===== Display & Statistics =====
    /// Display running statistics
    #[arg(long = "stats")]
    pub stats: bool,

    /// Stats update interval in seconds
    #[arg(long = "stats-interval", default_value = "10")]
    pub stats_interval: u64,

    /// Disable progress indicator
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.json && self.silent {
            anyhow::bail!("Cannot specify both --json and --silent");
        }

        if self.silent && self.output_file.is_none() {
            anyhow::bail!(
                "Cannot use --silent without --output-file: no output would be generated."
            );
        }

        if self.end.is_some() && self.to_head {
            anyhow::bail!("Cannot specify both --end and --to-head");
        }

        if self.stats && self.stats_interval == 0 {
            anyhow::bail!("--stats-interval must be greater than 0");
        }

        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        Ok(())
    }

    /// Determine the output format based on flags
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.silent {
            OutputFormat::Silent
        } else {
            OutputFormat::Human
        }
    }

    /// Check if progress indicator should be enabled
    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.json && !self.silent
    }

    /// Log level forced by flags, if any
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text output (default)
    Human,
    /// JSON Lines format (one JSON object per line)
    Json,
    /// No per-match stdout output
    Silent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ct-zonescan"]);
        assert_eq!(cli.config, "config.toml");
        assert_eq!(cli.zones, "zones.json");
        assert_eq!(cli.output_format(), OutputFormat::Human);
        assert!(cli.should_show_progress());
        assert_eq!(cli.log_level_override(), None);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_scan_window_flags() {
        let cli = Cli::parse_from([
            "ct-zonescan",
            "--start", "1000",
            "--end", "5000",
            "--workers", "8",
            "--batch-size", "64",
        ]);
        assert_eq!(cli.start, Some(1000));
        assert_eq!(cli.end, Some(5000));
        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.batch_size, Some(64));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_json_output_format() {
        let cli = Cli::parse_from(["ct-zonescan", "--json"]);
        assert_eq!(cli.output_format(), OutputFormat::Json);
        assert!(!cli.should_show_progress());
    }

    #[test]
    fn test_silent_requires_output_file() {
        let cli = Cli::parse_from(["ct-zonescan", "--silent"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["ct-zonescan", "--silent", "-o", "out.json"]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.output_format(), OutputFormat::Silent);
    }

    #[test]
    fn test_end_and_to_head_invalid() {
        let cli = Cli::parse_from(["ct-zonescan", "--end", "10", "--to-head"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_json_and_silent_invalid() {
        let cli = Cli::parse_from(["ct-zonescan", "--json", "--silent", "-o", "x.json"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_verbose_and_quiet_invalid() {
        let cli = Cli::parse_from(["ct-zonescan", "--verbose", "--quiet"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_zero_stats_interval_invalid() {
        let cli = Cli::parse_from(["ct-zonescan", "--stats", "--stats-interval", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["ct-zonescan", "-v"]);
        assert_eq!(cli.log_level_override(), Some("debug"));

        let cli = Cli::parse_from(["ct-zonescan", "-q"]);
        assert_eq!(cli.log_level_override(), Some("warn"));
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "ct-zonescan",
            "-c", "test.toml",
            "-z", "watch.json",
            "-j",
            "-o", "matches.json",
        ]);
        assert_eq!(cli.config, "test.toml");
        assert_eq!(cli.zones, "watch.json");
        assert!(cli.json);
        assert_eq!(cli.output_file, Some("matches.json".to_string()));
    }
}
