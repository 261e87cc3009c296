// src/lib.rs
// Library interface for ct-zonescan
pub mod cert_decoder;
pub mod cli;
pub mod config;
pub mod ct_log;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod progress;
pub mod shutdown;
pub mod stats;
pub mod types;
pub mod zones;

#[cfg(test)]
pub(crate) mod test_utils;
