// src/error.rs
//! Error types for the scanning engine
//!
//! `ConfigError` is fatal and raised before any work starts. `FetchError`
//! is scoped to one batch and `DecodeError` to one entry; neither ever
//! stops the pool.

use crate::types::BatchRange;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Invalid scan settings or zone set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch_size must be greater than 0")]
    ZeroBatchSize,

    #[error("workers must be greater than 0")]
    ZeroWorkers,

    #[error("{0} must be greater than 0")]
    ZeroCapacity(&'static str),

    #[error("network timeout must be greater than 0")]
    ZeroTimeout,

    #[error("invalid log url '{url}': {reason}")]
    InvalidLogUrl { url: String, reason: String },

    #[error("end_index {end} must be greater than start_index {start}")]
    EmptyScanWindow { start: u64, end: u64 },

    #[error("zone set is empty")]
    EmptyZoneSet,

    #[error("zone at position {0} is blank")]
    BlankZone(usize),
}

/// Failure to fetch a whole batch from the log
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure or timeout
    #[error("network error fetching {range}: {source}")]
    Network {
        range: BatchRange,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status or unparsable body
    #[error("protocol error fetching {range}: {reason}")]
    Protocol { range: BatchRange, reason: String },

    /// Retries exhausted by the retry wrapper
    #[error("giving up on {range} after {attempts} attempts (last backoff {backoff:?}): {last}")]
    Exhausted {
        range: BatchRange,
        attempts: u32,
        backoff: Duration,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn range(&self) -> BatchRange {
        match self {
            Self::Network { range, .. }
            | Self::Protocol { range, .. }
            | Self::Exhausted { range, .. } => *range,
        }
    }

    /// True for connectivity and timeout failures
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Protocol { .. } => false,
            Self::Exhausted { last, .. } => last.is_network(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Network { source, .. } => source.is_timeout(),
            Self::Protocol { .. } => false,
            Self::Exhausted { last, .. } => last.is_timeout(),
        }
    }
}

/// Step of the decode fallback chain that rejected an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    Base64,
    Envelope,
    UnrecognizedFormat,
    MalformedBinary,
    EmptyIdentity,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Envelope => "envelope",
            Self::UnrecognizedFormat => "unrecognized-format",
            Self::MalformedBinary => "malformed-binary",
            Self::EmptyIdentity => "empty-identity",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry could not be turned into an identity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("decode failed at {stage}: {detail}")]
pub struct DecodeError {
    pub stage: DecodeStage,
    pub detail: String,
}

impl DecodeError {
    pub fn new(stage: DecodeStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}
