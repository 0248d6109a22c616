//! DispatcherHandle - submission, drain and shutdown of a running worker pool

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender, TrySendError};
use contracts::Request;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::worker::WorkerExit;

/// How often `wait_idle` and `shutdown` re-check pool state
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a cancelled worker gets to finish its in-flight request
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Keeps `outstanding` balanced when a submission is refused or its future dropped
struct PendingSubmit<'a> {
    metrics: &'a DispatcherMetrics,
    committed: bool,
}

impl<'a> PendingSubmit<'a> {
    fn new(metrics: &'a DispatcherMetrics) -> Self {
        metrics.begin_submit();
        Self {
            metrics,
            committed: false,
        }
    }

    fn commit(mut self, queue_len: usize) {
        self.metrics.record_submitted(queue_len);
        self.committed = true;
    }
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.metrics.cancel_submit();
        }
    }
}

/// Cloneable producer-side entry point to the queue
#[derive(Clone)]
pub struct RequestSubmitter {
    tx: Sender<Request>,
    cancel: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
}

impl RequestSubmitter {
    pub(crate) fn new(
        tx: Sender<Request>,
        cancel: CancellationToken,
        metrics: Arc<DispatcherMetrics>,
    ) -> Self {
        Self { tx, cancel, metrics }
    }

    /// Enqueue a request, suspending while the queue is full
    ///
    /// A cancelled pool closes the queue, so a suspended submit wakes up
    /// rejected instead of waiting for workers that are gone.
    ///
    /// # Errors
    /// `QueueClosed` once the dispatcher has been shut down or cancelled.
    pub async fn submit(&self, request: Request) -> Result<(), DispatcherError> {
        let request_id = request.id();
        if self.close_if_cancelled() {
            return Err(self.reject_closed(request_id));
        }
        let pending = PendingSubmit::new(&self.metrics);

        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.close();
                false
            }
            result = self.tx.send(request) => result.is_ok(),
        };

        if sent {
            pending.commit(self.tx.len());
            Ok(())
        } else {
            drop(pending);
            Err(self.reject_closed(request_id))
        }
    }

    /// Enqueue a request without waiting
    ///
    /// # Errors
    /// `QueueFull` when no slot is free, `QueueClosed` after shutdown.
    pub fn try_submit(&self, request: Request) -> Result<(), DispatcherError> {
        let request_id = request.id();
        if self.close_if_cancelled() {
            return Err(self.reject_closed(request_id));
        }
        let pending = PendingSubmit::new(&self.metrics);

        match self.tx.try_send(request) {
            Ok(()) => {
                pending.commit(self.tx.len());
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_rejected();
                Err(DispatcherError::QueueFull { request_id })
            }
            Err(TrySendError::Closed(_)) => {
                drop(pending);
                Err(self.reject_closed(request_id))
            }
        }
    }

    /// Whether the queue has stopped accepting requests
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.cancel.is_cancelled()
    }

    fn close_if_cancelled(&self) -> bool {
        if self.cancel.is_cancelled() {
            self.close();
            true
        } else {
            false
        }
    }

    fn reject_closed(&self, request_id: u64) -> DispatcherError {
        self.metrics.record_rejected();
        warn!(request_id, "Queue closed, request rejected");
        DispatcherError::QueueClosed { request_id }
    }

    fn close(&self) -> bool {
        self.tx.close()
    }
}

/// Final state of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Queue closed and every request it took was finished
    Drained,
    /// Stopped by cancellation between requests
    Cancelled,
    /// Processor panicked; only this worker stopped
    Panicked(String),
    /// Did not finish its in-flight request in time and was aborted
    TimedOut,
}

/// Per-worker report
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub processed: u64,
    pub failed: u64,
    pub outcome: WorkerOutcome,
}

/// Aggregate result of a dispatcher shutdown
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// One entry per worker, ordered by worker id
    pub workers: Vec<WorkerReport>,
    /// Requests left in the queue when the workers stopped
    pub abandoned: u64,
    /// Final metrics
    pub metrics: MetricsSnapshot,
    /// Time spent shutting down
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Every worker drained and nothing was abandoned
    pub fn is_clean(&self) -> bool {
        self.abandoned == 0
            && self
                .workers
                .iter()
                .all(|w| w.outcome == WorkerOutcome::Drained)
    }

    /// Workers that panicked or timed out
    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| {
            matches!(
                w.outcome,
                WorkerOutcome::Panicked(_) | WorkerOutcome::TimedOut
            )
        })
    }
}

/// Handle to a running worker pool
pub struct DispatcherHandle {
    submitter: RequestSubmitter,
    /// Kept to measure depth and to collect abandoned requests
    queue: Receiver<Request>,
    workers: Vec<JoinHandle<WorkerExit>>,
    cancel: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
    drain_timeout: Duration,
}

impl DispatcherHandle {
    pub(crate) fn new(
        submitter: RequestSubmitter,
        queue: Receiver<Request>,
        workers: Vec<JoinHandle<WorkerExit>>,
        cancel: CancellationToken,
        metrics: Arc<DispatcherMetrics>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            submitter,
            queue,
            workers,
            cancel,
            metrics,
            drain_timeout,
        }
    }

    /// Enqueue a request, suspending while the queue is full
    pub async fn submit(&self, request: Request) -> Result<(), DispatcherError> {
        self.submitter.submit(request).await
    }

    /// Enqueue a request without waiting
    pub fn try_submit(&self, request: Request) -> Result<(), DispatcherError> {
        self.submitter.try_submit(request)
    }

    /// Cloneable submitter for producer tasks
    pub fn submitter(&self) -> RequestSubmitter {
        self.submitter.clone()
    }

    /// Number of workers spawned
    pub fn pool_width(&self) -> usize {
        self.workers.len()
    }

    /// Requests waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue has stopped accepting requests
    pub fn is_closed(&self) -> bool {
        self.submitter.is_closed()
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    /// Token that stops every worker between requests
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait until every submitted request has been finished
    ///
    /// The queue stays open; requests submitted meanwhile are waited for too.
    ///
    /// # Errors
    /// `DrainTimeout` if requests are still outstanding after `max_wait`.
    pub async fn wait_idle(&self, max_wait: Duration) -> Result<(), DispatcherError> {
        let started = Instant::now();
        let idle = timeout(max_wait, async {
            while self.metrics.outstanding() > 0 {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        idle.map_err(|_| DispatcherError::DrainTimeout {
            waited_ms: started.elapsed().as_millis() as u64,
            pending: self.metrics.outstanding(),
        })
    }

    /// Graceful shutdown
    ///
    /// - Closes the queue so no further requests are accepted.
    /// - Waits up to the drain timeout for workers to finish everything queued.
    /// - Cancels workers that are still running; their in-flight request
    ///   completes, queued requests are abandoned.
    /// - Joins every worker and reports per-worker outcomes.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(workers = self.workers.len()))]
    pub async fn shutdown(self) -> DispatchReport {
        let started = Instant::now();

        // === Phase 0: Stop accepting new requests ===
        info!(queued = self.queue.len(), "Refusing new requests");
        self.submitter.close();

        // === Phase 1: Let workers drain the queue ===
        let drained = timeout(self.drain_timeout, async {
            while !self.workers.iter().all(JoinHandle::is_finished) {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        match drained {
            Ok(()) => debug!("All workers drained"),
            Err(_) => {
                // === Phase 2: Cancel remaining work ===
                warn!(
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    queued = self.queue.len(),
                    "Graceful drain timed out, cancelling workers"
                );
                self.cancel.cancel();
            }
        }

        // === Phase 3: Join workers ===
        self.finish(started).await
    }

    /// Immediate shutdown
    ///
    /// Cancels every worker, closes the queue and abandons queued requests.
    /// Requests already in flight still complete.
    #[instrument(name = "dispatcher_abort", skip(self), fields(workers = self.workers.len()))]
    pub async fn abort(self) -> DispatchReport {
        let started = Instant::now();
        warn!(queued = self.queue.len(), "Aborting worker pool");
        self.cancel.cancel();
        self.submitter.close();
        self.finish(started).await
    }

    async fn finish(self, started: Instant) -> DispatchReport {
        let mut reports = Vec::with_capacity(self.workers.len());

        for (worker_id, handle) in self.workers.into_iter().enumerate() {
            let outcome = join_worker(worker_id, handle).await;
            let (processed, failed) = self
                .metrics
                .worker(worker_id)
                .map(|w| (w.processed(), w.failed()))
                .unwrap_or_default();
            reports.push(WorkerReport {
                worker_id,
                processed,
                failed,
                outcome,
            });
        }

        let abandoned = collect_abandoned(&self.queue, &self.metrics);
        let report = DispatchReport {
            workers: reports,
            abandoned,
            metrics: self.metrics.snapshot(),
            elapsed: started.elapsed(),
        };

        info!(
            processed = report.metrics.processed,
            failed = report.metrics.failed,
            abandoned = report.abandoned,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Worker pool shutdown complete"
        );
        report
    }
}

async fn join_worker(worker_id: usize, mut handle: JoinHandle<WorkerExit>) -> WorkerOutcome {
    match timeout(WORKER_JOIN_TIMEOUT, &mut handle).await {
        Ok(Ok(WorkerExit::Drained)) => WorkerOutcome::Drained,
        Ok(Ok(WorkerExit::Cancelled)) => WorkerOutcome::Cancelled,
        Ok(Err(e)) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(worker_id, panic = %message, "Worker panicked");
            WorkerOutcome::Panicked(message)
        }
        Ok(Err(e)) => {
            error!(worker_id, error = ?e, "Worker task cancelled by runtime");
            WorkerOutcome::Cancelled
        }
        Err(_) => {
            warn!(worker_id, "Worker did not stop in time, aborting task");
            handle.abort();
            WorkerOutcome::TimedOut
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Empty whatever is left in the queue, tracing every abandoned request
fn collect_abandoned(queue: &Receiver<Request>, metrics: &DispatcherMetrics) -> u64 {
    let mut abandoned = 0;
    while let Ok(request) = queue.try_recv() {
        metrics.record_abandoned();
        warn!(
            request_id = request.id(),
            header = request.header(),
            "Request abandoned at shutdown"
        );
        abandoned += 1;
    }
    abandoned
}
