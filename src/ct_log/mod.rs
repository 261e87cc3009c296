// src/ct_log/mod.rs
pub mod aggregator;
pub mod client;
pub mod generator;
pub mod pool;
pub mod scanner;

pub use aggregator::{ResultAggregator, ScanReport};
pub use client::{CtLogClient, LogSource, RetryingSource};
pub use generator::{BatchRangeGenerator, BatchRanges, ScanProgress};
pub use pool::{BatchOutcome, BatchResult, PoolSummary, ScanWorkerPool};
pub use scanner::Scanner;
