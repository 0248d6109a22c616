//! Worker - long-lived task draining the shared request queue
//!
//! Each worker processes one request to completion before taking the next.
//! Cancellation is only observed between requests, so an in-flight request is
//! always fully processed.

use std::sync::Arc;
use std::time::Instant;

use async_channel::Receiver;
use contracts::{ContractError, ErrorPolicy, Request, RequestProcessor, WorkItem};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dead_letter::DeadLetter;
use crate::metrics::DispatcherMetrics;

/// Why a worker reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Queue closed and empty
    Drained,
    /// Cancellation observed between requests
    Cancelled,
}

/// A single pool worker bound to the shared queue
pub struct Worker<P> {
    worker_id: usize,
    queue: Receiver<Request>,
    processor: Arc<P>,
    cancel: CancellationToken,
    error_policy: ErrorPolicy,
    dead_letter: Option<mpsc::Sender<DeadLetter>>,
    metrics: Arc<DispatcherMetrics>,
}

/// Releases the in-flight slot even if the processor panics or the task is aborted
struct InFlightGuard<'a> {
    worker_id: usize,
    request_id: u64,
    metrics: &'a DispatcherMetrics,
    completed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(worker_id: usize, request_id: u64, metrics: &'a DispatcherMetrics) -> Self {
        metrics.begin_processing();
        Self {
            worker_id,
            request_id,
            metrics,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            // The request never reached a result.
            self.metrics.record_failed(self.worker_id);
            if std::thread::panicking() {
                error!(
                    worker_id = self.worker_id,
                    request_id = self.request_id,
                    "Processor panicked while handling request"
                );
            } else {
                error!(
                    worker_id = self.worker_id,
                    request_id = self.request_id,
                    "Worker aborted while handling request"
                );
            }
        }
        self.metrics.end_processing();
    }
}

impl<P> Worker<P>
where
    P: RequestProcessor + Sync + 'static,
{
    pub(crate) fn new(
        worker_id: usize,
        queue: Receiver<Request>,
        processor: Arc<P>,
        cancel: CancellationToken,
        error_policy: ErrorPolicy,
        dead_letter: Option<mpsc::Sender<DeadLetter>>,
        metrics: Arc<DispatcherMetrics>,
    ) -> Self {
        Self {
            worker_id,
            queue,
            processor,
            cancel,
            error_policy,
            dead_letter,
            metrics,
        }
    }

    /// Run until the queue is closed and empty, or cancellation is requested
    #[instrument(
        name = "worker_loop",
        skip(self),
        fields(worker_id = self.worker_id, processor = %self.processor.name())
    )]
    pub async fn run(self) -> WorkerExit {
        debug!(worker_id = self.worker_id, "Worker started");

        let exit = loop {
            let request = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    // Cancelled workers never take another request
                    self.queue.close();
                    break WorkerExit::Cancelled;
                }
                next = self.queue.recv() => match next {
                    Ok(request) => request,
                    Err(_) => break WorkerExit::Drained,
                },
            };

            let in_flight = InFlightGuard::new(self.worker_id, request.id(), &self.metrics);
            self.handle(WorkItem::new(self.worker_id, request)).await;
            in_flight.complete();
        };

        debug!(worker_id = self.worker_id, exit = ?exit, "Worker stopped");
        exit
    }

    async fn handle(&self, mut item: WorkItem) {
        debug!(
            worker_id = self.worker_id,
            request_id = item.request_id(),
            header = item.request.header(),
            "Processing request"
        );

        let started = Instant::now();
        match self.processor.process(&item.request).await {
            Ok(response) => {
                self.metrics
                    .record_processed(self.worker_id, started.elapsed());
                info!(
                    worker_id = self.worker_id,
                    request_id = item.request_id(),
                    response = %response.content,
                    "Request processed"
                );
                item.response = Some(response);
            }
            Err(e) => {
                self.metrics.record_failed(self.worker_id);
                warn!(
                    worker_id = self.worker_id,
                    request_id = item.request_id(),
                    error = %e,
                    "Request processing failed"
                );
                self.on_failure(item.request, e);
            }
        }
    }

    fn on_failure(&self, request: Request, error: ContractError) {
        if self.error_policy != ErrorPolicy::DeadLetter {
            return;
        }

        let Some(tx) = &self.dead_letter else {
            error!(
                worker_id = self.worker_id,
                request_id = request.id(),
                "Dead-letter policy without a dead-letter channel"
            );
            return;
        };

        let request_id = request.id();
        let letter = DeadLetter {
            worker_id: self.worker_id,
            request,
            error,
        };
        match tx.try_send(letter) {
            Ok(()) => self.metrics.record_dead_lettered(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                error!(
                    worker_id = self.worker_id,
                    request_id, "Dead-letter channel full, request dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(
                    worker_id = self.worker_id,
                    request_id, "Dead-letter channel closed, request dropped"
                );
            }
        }
    }
}
