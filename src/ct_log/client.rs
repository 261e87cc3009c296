// src/ct_log/client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::shutdown::ShutdownSignal;
use crate::types::{BatchRange, GetEntriesResponse, RawLogEntry, SignedTreeHead};

/// Longest response body quoted in a protocol error
const MAX_ERROR_BODY: usize = 200;

/// Anything that can return the raw entries for a batch range
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Entries in log order. An empty vec means the log has nothing at this offset.
    async fn fetch(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError>;
}

/// HTTP client for Certificate Transparency log RFC 6962 API
pub struct CtLogClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl CtLogClient {
    /// Create a new CT log client; `timeout` bounds every request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get Signed Tree Head (current log size and timestamp)
    /// Endpoint: GET {base_url}/ct/v1/get-sth
    pub async fn get_sth(&self) -> Result<SignedTreeHead> {
        let url = format!("{}/ct/v1/get-sth", self.base_url);

        debug!("Fetching STH from {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch STH")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "STH request failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let sth: SignedTreeHead = response
            .json()
            .await
            .context("Failed to parse STH JSON")?;

        debug!(
            "STH received: tree_size={}, timestamp={}",
            sth.tree_size, sth.timestamp
        );

        Ok(sth)
    }

    /// Get entries for a half-open range
    /// Endpoint: GET {base_url}/ct/v1/get-entries?start={start}&end={end - 1}
    ///
    /// RFC 6962 treats `end` as inclusive.
    pub async fn get_entries(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.base_url,
            range.start,
            range.end - 1
        );

        debug!("Fetching entries {} from {}", range, self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Network { range, source })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(body.len(), |(i, _)| i),
            );

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limited by CT log: {}", self.base_url);
            }

            return Err(FetchError::Protocol {
                range,
                reason: format!("status {}: {}", status, body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network { range, source })?;

        let entries_response: GetEntriesResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Protocol {
                range,
                reason: format!("invalid entries JSON: {}", e),
            })?;

        debug!(
            "Received {} entries from {}",
            entries_response.entries.len(),
            self.base_url
        );

        Ok(entries_response.entries)
    }
}

#[async_trait]
impl LogSource for CtLogClient {
    async fn fetch(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError> {
        self.get_entries(range).await
    }
}

/// Wraps a source with bounded retries and exponential backoff per batch.
///
/// A stop request cuts the backoff short and no further attempt is made.
pub struct RetryingSource {
    inner: Arc<dyn LogSource>,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    shutdown: ShutdownSignal,
}

impl RetryingSource {
    /// Backoff starts at 1 second and doubles up to 60 seconds
    pub fn new(inner: Arc<dyn LogSource>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    fn give_up(range: BatchRange, attempts: u32, backoff: Duration, last: FetchError) -> FetchError {
        if attempts <= 1 {
            return last;
        }
        FetchError::Exhausted {
            range,
            attempts,
            backoff,
            last: Box::new(last),
        }
    }
}

#[async_trait]
impl LogSource for RetryingSource {
    async fn fetch(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError> {
        let mut attempts = 0;
        let mut backoff = self.initial_backoff;
        // Last delay actually slept before the latest attempt
        let mut last_backoff = Duration::ZERO;

        loop {
            attempts += 1;

            let e = match self.inner.fetch(range).await {
                Ok(entries) => return Ok(entries),
                Err(e) => e,
            };

            if attempts > self.max_retries {
                return Err(Self::give_up(range, attempts, last_backoff, e));
            }

            warn!(
                "Error fetching entries {} (attempt {}/{}): {}. Retrying in {:?}",
                range,
                attempts,
                self.max_retries + 1,
                e,
                backoff
            );

            let stopped = tokio::select! {
                biased;
                _ = self.shutdown.wait() => true,
                _ = tokio::time::sleep(backoff) => false,
            };
            if stopped {
                debug!("Stop requested, abandoning retries for {}", range);
                return Err(Self::give_up(range, attempts, last_backoff, e));
            }

            last_backoff = backoff;
            backoff = std::cmp::min(backoff * 2, self.max_backoff);
        }
    }
}
