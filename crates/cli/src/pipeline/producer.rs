//! Sample request producer.
//!
//! Builds numbered requests and submits them in paced batches. Submission
//! suspends while the queue is full; a cancelled shutdown token stops the
//! producer between (or during) submissions.

use std::time::{Duration, Instant};

use contracts::{ProducerSettings, Request};
use dispatcher::{DispatcherError, RequestSubmitter};
use observability::{record_request_produced, SubmitMetricsAggregator};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Why the producer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// Every configured request was submitted (or refused)
    Completed,
    /// Shutdown was requested before all requests were submitted
    Interrupted,
    /// The queue was closed underneath the producer
    QueueClosed,
}

/// Result of a producer run
#[derive(Debug, Clone)]
pub struct ProducerReport {
    pub produced: u64,
    pub exit: ProducerExit,
    pub submit_metrics: SubmitMetricsAggregator,
}

/// Build the sample request for `id`
pub fn sample_request(id: u64) -> Request {
    Request::new(
        id,
        format!("Request #{id}"),
        format!("Content: this is the content for Request #{id})"),
    )
}

pub struct Producer {
    settings: ProducerSettings,
    submitter: RequestSubmitter,
    shutdown: CancellationToken,
}

impl Producer {
    pub fn new(
        settings: ProducerSettings,
        submitter: RequestSubmitter,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            submitter,
            shutdown,
        }
    }

    /// Submit `request_count` requests, pausing after every `batch_size`-th
    #[instrument(
        name = "producer",
        skip(self),
        fields(requests = self.settings.request_count, batch_size = self.settings.batch_size)
    )]
    pub async fn run(self) -> ProducerReport {
        let mut metrics = SubmitMetricsAggregator::new();
        let mut produced = 0u64;
        let mut exit = ProducerExit::Completed;
        let count = self.settings.request_count;
        let pause = Duration::from_millis(self.settings.batch_pause_ms);

        for id in 0..count {
            if self.shutdown.is_cancelled() {
                exit = ProducerExit::Interrupted;
                break;
            }

            let request = sample_request(id);
            record_request_produced();
            produced += 1;

            let started = Instant::now();
            let submitted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(request_id = id, "Submission interrupted by shutdown");
                    exit = ProducerExit::Interrupted;
                    break;
                }
                result = self.submitter.submit(request) => result,
            };

            match submitted {
                Ok(()) => {
                    metrics.record_submitted(started.elapsed().as_secs_f64() * 1000.0);
                    debug!(request_id = id, "Request submitted");
                }
                Err(DispatcherError::QueueClosed { request_id }) => {
                    metrics.record_rejected();
                    warn!(request_id, "Queue closed, producer stopping");
                    exit = ProducerExit::QueueClosed;
                    break;
                }
                Err(e) => {
                    metrics.record_rejected();
                    warn!(request_id = id, error = %e, "Request refused");
                    continue;
                }
            }

            let is_last = id + 1 == count;
            if id % self.settings.batch_size.max(1) == 0 && !is_last && !pause.is_zero() {
                info!(
                    request_id = id,
                    pause_ms = pause.as_millis() as u64,
                    "Batch submitted, pausing"
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        exit = ProducerExit::Interrupted;
                        break;
                    }
                    _ = sleep(pause) => {}
                }
            }
        }

        info!(produced, exit = ?exit, "Producer finished");
        ProducerReport {
            produced,
            exit,
            submit_metrics: metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher::{DispatcherBuilder, DispatcherConfig, EchoProcessor};

    fn settings(request_count: u64, batch_size: u64, batch_pause_ms: u64) -> ProducerSettings {
        ProducerSettings {
            request_count,
            batch_size,
            batch_pause_ms,
        }
    }

    #[test]
    fn test_sample_request_shape() {
        let request = sample_request(7);
        assert_eq!(request.id(), 7);
        assert_eq!(request.header(), "Request #7");
        assert_eq!(
            request.content(),
            "Content: this is the content for Request #7)"
        );
    }

    #[tokio::test]
    async fn test_submits_every_request() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(2), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();

        let producer = Producer::new(
            settings(10, 3, 0),
            handle.submitter(),
            CancellationToken::new(),
        );
        let report = producer.run().await;

        assert_eq!(report.exit, ProducerExit::Completed);
        assert_eq!(report.produced, 10);
        assert_eq!(report.submit_metrics.total_submitted, 10);

        let dispatch = handle.shutdown().await;
        assert_eq!(dispatch.metrics.processed, 10);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_pause() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(1), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();

        let shutdown = CancellationToken::new();
        let producer = Producer::new(settings(10, 1, 60_000), handle.submitter(), shutdown.clone());

        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                shutdown.cancel();
            })
        };

        let report = tokio::time::timeout(Duration::from_secs(5), producer.run())
            .await
            .expect("producer should stop promptly");
        canceller.await.unwrap();

        assert_eq!(report.exit, ProducerExit::Interrupted);
        assert_eq!(report.produced, 1);

        let dispatch = handle.shutdown().await;
        assert_eq!(dispatch.metrics.processed, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_stops_producer() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(1), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();
        let submitter = handle.submitter();
        handle.shutdown().await;

        let report = Producer::new(settings(5, 3, 0), submitter, CancellationToken::new())
            .run()
            .await;

        assert_eq!(report.exit, ProducerExit::QueueClosed);
        assert_eq!(report.produced, 1);
        assert_eq!(report.submit_metrics.total_rejected, 1);
    }
}
