// src/ct_log/pool.rs
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::LogSource;
use crate::cert_decoder::CertificateDecoder;
use crate::config::EmptyBatchPolicy;
use crate::diagnostics::{Diagnostics, ScanEvent};
use crate::error::FetchError;
use crate::shutdown::ShutdownSignal;
use crate::types::{BatchRange, MatchResult, RawLogEntry};
use crate::zones::ZoneMatcher;

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    /// Log returned no entries at this offset
    Empty,
    /// Fetch failed; the batch was dropped
    Failed,
}

/// Everything a worker produced for one range
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub range: BatchRange,
    pub outcome: BatchOutcome,
    pub entries: usize,
    pub decode_failures: usize,
    pub matches: Vec<MatchResult>,
}

impl BatchResult {
    fn without_entries(range: BatchRange, outcome: BatchOutcome) -> Self {
        Self {
            range,
            outcome,
            entries: 0,
            decode_failures: 0,
            matches: Vec::new(),
        }
    }
}

/// Summary returned once every worker has exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub workers: usize,
    pub batches_processed: u64,
    pub workers_panicked: usize,
}

/// Fixed-size set of symmetric workers sharing one work queue
pub struct ScanWorkerPool {
    workers: usize,
    source: Arc<dyn LogSource>,
    matcher: Arc<ZoneMatcher>,
    diagnostics: Diagnostics,
    empty_batch_policy: EmptyBatchPolicy,
}

impl ScanWorkerPool {
    pub fn new(
        workers: usize,
        source: Arc<dyn LogSource>,
        matcher: Arc<ZoneMatcher>,
        diagnostics: Diagnostics,
        empty_batch_policy: EmptyBatchPolicy,
    ) -> Self {
        Self {
            workers,
            source,
            matcher,
            diagnostics,
            empty_batch_policy,
        }
    }

    /// Spawn the workers. The returned handle resolves after the last worker
    /// has exited, at which point `result_tx` and all its clones are dropped.
    pub fn spawn(
        self,
        work_rx: mpsc::Receiver<BatchRange>,
        result_tx: mpsc::Sender<BatchResult>,
        shutdown: ShutdownSignal,
    ) -> JoinHandle<PoolSummary> {
        let queue = Arc::new(Mutex::new(work_rx));
        let workers = self.workers;

        info!("Starting {} scan workers", workers);

        let handles: Vec<JoinHandle<u64>> = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    source: Arc::clone(&self.source),
                    matcher: Arc::clone(&self.matcher),
                    diagnostics: self.diagnostics.clone(),
                    empty_batch_policy: self.empty_batch_policy,
                    shutdown: shutdown.clone(),
                };
                let queue = Arc::clone(&queue);
                let result_tx = result_tx.clone();

                tokio::spawn(async move { worker.run(queue, result_tx).await })
            })
            .collect();

        // Workers hold the only senders, so the result queue closes when they finish
        drop(result_tx);

        tokio::spawn(async move {
            let mut summary = PoolSummary {
                workers,
                batches_processed: 0,
                workers_panicked: 0,
            };

            for joined in join_all(handles).await {
                match joined {
                    Ok(batches) => summary.batches_processed += batches,
                    Err(e) => {
                        error!("Scan worker failed: {}", e);
                        summary.workers_panicked += 1;
                    }
                }
            }

            info!(
                "All {} workers drained after {} batches",
                workers, summary.batches_processed
            );

            summary
        })
    }
}

struct Worker {
    id: usize,
    source: Arc<dyn LogSource>,
    matcher: Arc<ZoneMatcher>,
    diagnostics: Diagnostics,
    empty_batch_policy: EmptyBatchPolicy,
    shutdown: ShutdownSignal,
}

impl Worker {
    /// Take ranges until the queue is closed and empty or a stop is requested.
    /// An in-flight batch is always finished and sent.
    async fn run(
        self,
        queue: Arc<Mutex<mpsc::Receiver<BatchRange>>>,
        result_tx: mpsc::Sender<BatchResult>,
    ) -> u64 {
        let mut processed = 0;

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            let next = {
                let mut rx = queue.lock().await;
                tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => None,
                    range = rx.recv() => range,
                }
            };

            let Some(range) = next else {
                break;
            };

            let result = self.process(range).await;
            processed += 1;

            if result_tx.send(result).await.is_err() {
                warn!("Worker {}: result queue closed, stopping", self.id);
                break;
            }
        }

        debug!("Worker {} exiting after {} batches", self.id, processed);
        processed
    }

    async fn process(&self, range: BatchRange) -> BatchResult {
        self.diagnostics.record(ScanEvent::BatchStarted { range });

        let entries = match self.fetch_range(range).await {
            Ok(entries) => entries,
            Err(e) => {
                self.diagnostics.record(ScanEvent::BatchFailed {
                    range,
                    error: e.to_string(),
                });
                return BatchResult::without_entries(range, BatchOutcome::Failed);
            }
        };

        if entries.is_empty() {
            self.diagnostics.record(ScanEvent::BatchEmpty { range });
            if self.empty_batch_policy == EmptyBatchPolicy::Stop {
                info!("Worker {}: no entries at {}, stopping scan", self.id, range);
                self.shutdown.trigger();
            }
            return BatchResult::without_entries(range, BatchOutcome::Empty);
        }

        self.diagnostics.record(ScanEvent::BatchFetched {
            range,
            entries: entries.len(),
        });

        let mut result = BatchResult {
            range,
            outcome: BatchOutcome::Completed,
            entries: entries.len(),
            decode_failures: 0,
            matches: Vec::new(),
        };

        for (offset, entry) in entries.into_iter().enumerate() {
            let index = range.start + offset as u64;

            let identity = match CertificateDecoder::decode(&entry.encoded_leaf) {
                Ok(identity) => identity,
                Err(e) => {
                    result.decode_failures += 1;
                    self.diagnostics.record(ScanEvent::DecodeFailed {
                        index,
                        stage: e.stage,
                        error: e.detail,
                    });
                    continue;
                }
            };

            self.diagnostics.record(ScanEvent::EntryDecoded { index });

            let names = self.matcher.matches(&identity);
            if let Some(matched) = MatchResult::new(index, entry, identity, names) {
                self.diagnostics.record(ScanEvent::Matched {
                    index,
                    names: matched.matched_names.clone(),
                });
                result.matches.push(matched);
            }
        }

        result
    }

    /// Fetch a range, following up when the log returns fewer entries than asked for
    async fn fetch_range(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError> {
        let mut entries = self.source.fetch(range).await?;

        while !entries.is_empty() {
            let Some(rest) = range.remainder(entries.len() as u64) else {
                break;
            };

            debug!(
                "Worker {}: short response for {}, fetching {}",
                self.id, range, rest
            );

            let more = self.source.fetch(rest).await?;
            if more.is_empty() {
                break;
            }
            entries.extend(more);
        }

        entries.truncate(range.len() as usize);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::tests::RecordingSink;
    use crate::test_utils::{b64, leaf_input};
    use crate::zones::{MatchStrategy, ZoneSet};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Serves canned responses keyed by range start; unknown ranges are empty
    #[derive(Default)]
    struct MockSource {
        responses: HashMap<u64, Result<Vec<RawLogEntry>, String>>,
        /// Largest page the mock returns, like a real log's cap
        page_cap: Option<usize>,
        requests: StdMutex<Vec<BatchRange>>,
        delay: Duration,
    }

    #[async_trait]
    impl LogSource for MockSource {
        async fn fetch(&self, range: BatchRange) -> Result<Vec<RawLogEntry>, FetchError> {
            self.requests.lock().unwrap().push(range);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.responses.get(&range.start) {
                Some(Ok(entries)) => {
                    let cap = self.page_cap.unwrap_or(usize::MAX);
                    Ok(entries.iter().take(cap).cloned().collect())
                }
                Some(Err(reason)) => Err(FetchError::Protocol {
                    range,
                    reason: reason.clone(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    fn matcher() -> Arc<ZoneMatcher> {
        Arc::new(ZoneMatcher::new(
            ZoneSet::new(["example.com"]).unwrap(),
            MatchStrategy::Substring,
        ))
    }

    fn entry(cn: &str, sans: &[&str]) -> RawLogEntry {
        RawLogEntry::new(leaf_input(cn, sans))
    }

    async fn run_pool(
        source: Arc<MockSource>,
        ranges: Vec<BatchRange>,
        workers: usize,
        policy: EmptyBatchPolicy,
    ) -> (Vec<BatchResult>, PoolSummary, Arc<RecordingSink>, ShutdownSignal) {
        let (work_tx, work_rx) = mpsc::channel(ranges.len().max(1));
        let (result_tx, mut result_rx) = mpsc::channel(4);
        let sink = Arc::new(RecordingSink::default());
        let diagnostics = Diagnostics::new().with_sink(sink.clone());
        let shutdown = ShutdownSignal::new();

        for range in ranges {
            work_tx.send(range).await.unwrap();
        }
        drop(work_tx);

        let pool = ScanWorkerPool::new(workers, source, matcher(), diagnostics, policy);
        let handle = pool.spawn(work_rx, result_tx, shutdown.clone());

        let mut results = Vec::new();
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        let summary = handle.await.unwrap();

        (results, summary, sink, shutdown)
    }

    #[tokio::test]
    async fn test_one_malformed_entry_does_not_fail_batch() {
        let mut source = MockSource::default();
        source.responses.insert(
            0,
            Ok(vec![
                entry("www.example.com", &["example.com", "api.example.org"]),
                RawLogEntry::new(b64(b"definitely not a certificate")),
                entry("other.org", &[]),
                entry("mail.example.com", &[]),
            ]),
        );

        let (results, _, sink, _) = run_pool(
            Arc::new(source),
            vec![BatchRange::new(0, 4)],
            1,
            EmptyBatchPolicy::Skip,
        )
        .await;

        assert_eq!(results.len(), 1);
        let batch = &results[0];
        assert_eq!(batch.outcome, BatchOutcome::Completed);
        assert_eq!(batch.entries, 4);
        assert_eq!(batch.decode_failures, 1);
        assert_eq!(batch.matches.len(), 2);
        assert_eq!(batch.matches[0].index, 0);
        assert_eq!(batch.matches[0].matched_names, vec!["www.example.com", "example.com"]);
        assert_eq!(batch.matches[1].index, 3);

        assert_eq!(sink.count(|e| matches!(e, ScanEvent::DecodeFailed { index: 1, .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::EntryDecoded { .. })), 3);
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::BatchFailed { .. })), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped_and_worker_continues() {
        let mut source = MockSource::default();
        source.responses.insert(1000, Err("status 500".to_string()));
        source
            .responses
            .insert(1500, Ok(vec![entry("www.example.com", &[])]));

        let (results, summary, sink, _) = run_pool(
            Arc::new(source),
            vec![BatchRange::new(1000, 500), BatchRange::new(1500, 500)],
            1,
            EmptyBatchPolicy::Skip,
        )
        .await;

        assert_eq!(summary.batches_processed, 2);
        assert_eq!(results.len(), 2);

        let failed = results.iter().find(|r| r.range.start == 1000).unwrap();
        assert_eq!(failed.outcome, BatchOutcome::Failed);
        assert!(failed.matches.is_empty());

        let next = results.iter().find(|r| r.range.start == 1500).unwrap();
        assert_eq!(next.matches.len(), 1);
        assert_eq!(next.matches[0].index, 1500);

        assert_eq!(sink.count(|e| matches!(e, ScanEvent::BatchFailed { .. })), 1);
    }

    #[tokio::test]
    async fn test_every_range_processed_exactly_once() {
        let ranges: Vec<BatchRange> = (0..4).map(|i| BatchRange::new(i * 100, 100)).collect();
        let mut source = MockSource {
            delay: Duration::from_millis(5),
            ..Default::default()
        };
        for range in &ranges {
            source
                .responses
                .insert(range.start, Ok(vec![entry("a.example.com", &[])]));
        }
        let source = Arc::new(source);

        let (results, summary, _, _) =
            run_pool(source.clone(), ranges.clone(), 4, EmptyBatchPolicy::Skip).await;

        let seen: HashSet<BatchRange> = results.iter().map(|r| r.range).collect();
        assert_eq!(results.len(), 4);
        assert_eq!(seen, ranges.iter().copied().collect());
        assert_eq!(summary.batches_processed, 4);
        assert_eq!(summary.workers_panicked, 0);

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
    }

    #[tokio::test]
    async fn test_short_response_fetches_remainder() {
        let mut source = MockSource {
            page_cap: Some(2),
            ..Default::default()
        };
        source.responses.insert(
            0,
            Ok(vec![entry("a.example.com", &[]), entry("b.example.com", &[])]),
        );
        source.responses.insert(
            2,
            Ok(vec![entry("c.example.com", &[]), entry("d.other.org", &[])]),
        );
        let source = Arc::new(source);

        let (results, _, _, _) = run_pool(
            source.clone(),
            vec![BatchRange::new(0, 5)],
            1,
            EmptyBatchPolicy::Skip,
        )
        .await;

        let batch = &results[0];
        assert_eq!(batch.entries, 4);
        let indexes: Vec<u64> = batch.matches.iter().map(|m| m.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        let requests = source.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![
                BatchRange { start: 0, end: 5 },
                BatchRange { start: 2, end: 5 },
                BatchRange { start: 4, end: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_with_stop_policy_triggers_shutdown() {
        let (results, _, sink, shutdown) = run_pool(
            Arc::new(MockSource::default()),
            vec![BatchRange::new(0, 10)],
            1,
            EmptyBatchPolicy::Stop,
        )
        .await;

        assert_eq!(results[0].outcome, BatchOutcome::Empty);
        assert!(shutdown.is_triggered());
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::BatchEmpty { .. })), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_skip_continues() {
        let (results, _, _, shutdown) = run_pool(
            Arc::new(MockSource::default()),
            vec![BatchRange::new(0, 10), BatchRange::new(10, 10)],
            1,
            EmptyBatchPolicy::Skip,
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome == BatchOutcome::Empty));
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_stopped_workers_take_no_new_work() {
        let (work_tx, work_rx) = mpsc::channel(8);
        let (result_tx, mut result_rx) = mpsc::channel(8);
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        work_tx.send(BatchRange::new(0, 10)).await.unwrap();

        let pool = ScanWorkerPool::new(
            2,
            Arc::new(MockSource::default()),
            matcher(),
            Diagnostics::new(),
            EmptyBatchPolicy::Skip,
        );
        let summary = pool.spawn(work_rx, result_tx, shutdown).await.unwrap();

        assert_eq!(summary.batches_processed, 0);
        assert!(result_rx.recv().await.is_none());
        drop(work_tx);
    }
}
