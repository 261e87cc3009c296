// src/progress.rs
//! Spinner showing the running scan counters

use crate::stats::ScanStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ProgressIndicator {
    spinner: Option<ProgressBar>,
}

impl ProgressIndicator {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(msg.into());
        }
    }

    /// Temporarily suspend the spinner to print other output
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if let Some(ref spinner) = self.spinner {
            spinner.suspend(f)
        } else {
            f()
        }
    }

    /// Refresh the message from `stats` every `interval` until aborted
    pub fn track(&self, stats: ScanStats, interval: Duration) -> JoinHandle<()> {
        let progress = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let msg = stats.format_stats();
                if progress.is_enabled() {
                    progress.set_message(msg);
                } else {
                    eprintln!("{}", msg);
                }
            }
        })
    }

    pub fn finish(&self) {
        if let Some(ref spinner) = self.spinner {
            spinner.finish_and_clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.spinner.is_some()
    }
}
