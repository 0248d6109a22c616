//! Dispatcher metrics for observability
//!
//! Atomic counters readable at any time through `snapshot()`, mirrored to the
//! `metrics` facade so an installed exporter sees the same numbers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Per-worker counters
#[derive(Debug, Default)]
pub struct WorkerCounters {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl WorkerCounters {
    /// Requests this worker turned into a response
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Requests this worker failed to process
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Metrics for a whole worker pool
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Requests accepted onto the queue
    submitted: AtomicU64,
    /// Submissions refused because the queue was closed
    rejected: AtomicU64,
    /// Requests that produced a response
    processed: AtomicU64,
    /// Requests whose processing failed
    failed: AtomicU64,
    /// Failed requests forwarded to the dead-letter channel
    dead_lettered: AtomicU64,
    /// Requests left in the queue when workers stopped
    abandoned: AtomicU64,
    /// Requests submitted (or being submitted) but not yet finished
    outstanding: AtomicUsize,
    /// Requests currently held by a worker
    in_flight: AtomicUsize,
    /// Per-worker counters, indexed by worker id
    workers: Vec<WorkerCounters>,
}

impl DispatcherMetrics {
    /// Create metrics for a pool of `pool_width` workers
    pub fn new(pool_width: usize) -> Self {
        Self {
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            workers: (0..pool_width).map(|_| WorkerCounters::default()).collect(),
        }
    }

    /// Counters for one worker
    pub fn worker(&self, worker_id: usize) -> Option<&WorkerCounters> {
        self.workers.get(worker_id)
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// A submission is about to enter the queue
    pub(crate) fn begin_submit(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// The submission was accepted
    pub(crate) fn record_submitted(&self, queue_len: usize) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        counter!("workpool_requests_submitted_total").increment(1);
        gauge!("workpool_queue_depth").set(queue_len as f64);
    }

    /// The submission never reached the queue
    pub(crate) fn cancel_submit(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// The submission was refused
    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("workpool_requests_rejected_total").increment(1);
    }

    /// A worker took an item off the queue
    pub(crate) fn begin_processing(&self) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("workpool_requests_in_flight").set(in_flight as f64);
    }

    /// A worker is done with its item, whatever the result
    pub(crate) fn end_processing(&self) {
        let in_flight = self.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!("workpool_requests_in_flight").set(in_flight as f64);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn record_processed(&self, worker_id: usize, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if let Some(worker) = self.workers.get(worker_id) {
            worker.processed.fetch_add(1, Ordering::Relaxed);
        }
        counter!("workpool_requests_processed_total", "worker" => worker_id.to_string())
            .increment(1);
        histogram!("workpool_processing_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
    }

    pub(crate) fn record_failed(&self, worker_id: usize) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(worker) = self.workers.get(worker_id) {
            worker.failed.fetch_add(1, Ordering::Relaxed);
        }
        counter!("workpool_requests_failed_total", "worker" => worker_id.to_string())
            .increment(1);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
        counter!("workpool_requests_dead_lettered_total").increment(1);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        counter!("workpool_requests_abandoned_total").increment(1);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted(),
            rejected: self.rejected(),
            processed: self.processed(),
            failed: self.failed(),
            dead_lettered: self.dead_lettered(),
            abandoned: self.abandoned(),
            in_flight: self.in_flight(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub processed: u64,
    pub failed: u64,
    pub dead_lettered: u64,
    pub abandoned: u64,
    pub in_flight: usize,
}
