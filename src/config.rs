// src/config.rs

use crate::error::ConfigError;
use crate::zones::MatchStrategy;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// What a worker does when the log has no entries at a batch offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBatchPolicy {
    /// Count it and move on to the next range. The skipped offsets are not
    /// revisited, so entries appended there later are missed.
    #[default]
    #[serde(alias = "keep_polling")]
    Skip,
    /// Treat it as the end of the log and stop the scan
    Stop,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Base URL of the CT log, without the `/ct/v1/...` suffix
    pub log_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_generation_delay_ms")]
    pub generation_delay_ms: u64,
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
    #[serde(default)]
    pub start_index: u64,
    #[serde(default)]
    pub end_index: Option<u64>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,  // defaults to `workers`
    #[serde(default)]
    pub result_capacity: Option<usize>,  // defaults to `workers`
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub empty_batch_policy: EmptyBatchPolicy,
    #[serde(default)]
    pub match_strategy: MatchStrategy,
}

fn default_batch_size() -> u64 { 256 }
fn default_workers() -> usize { 100 }
fn default_generation_delay_ms() -> u64 { 1000 }
fn default_network_timeout_secs() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }

impl ScanConfig {
    /// Config for `log_url` with every other field at its default
    pub fn new(log_url: impl Into<String>) -> Self {
        Self {
            log_url: log_url.into(),
            batch_size: default_batch_size(),
            workers: default_workers(),
            generation_delay_ms: default_generation_delay_ms(),
            network_timeout_secs: default_network_timeout_secs(),
            start_index: 0,
            end_index: None,
            queue_capacity: None,
            result_capacity: None,
            max_retries: 0,
            empty_batch_policy: EmptyBatchPolicy::default(),
            match_strategy: MatchStrategy::default(),
        }
    }

    /// Reject settings the scanner cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.network_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity("queue_capacity"));
        }
        if self.result_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity("result_capacity"));
        }

        let url = url::Url::parse(&self.log_url).map_err(|e| ConfigError::InvalidLogUrl {
            url: self.log_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidLogUrl {
                url: self.log_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if let Some(end) = self.end_index {
            if end <= self.start_index {
                return Err(ConfigError::EmptyScanWindow {
                    start: self.start_index,
                    end,
                });
            }
        }

        Ok(())
    }

    pub fn generation_delay(&self) -> Duration {
        Duration::from_millis(self.generation_delay_ms)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers)
    }

    pub fn result_capacity(&self) -> usize {
        self.result_capacity.unwrap_or(self.workers)
    }

    /// Log URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.log_url.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log per-entry decode failures and matches at warn/info instead of debug
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }
}
