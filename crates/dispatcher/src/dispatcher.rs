//! Dispatcher - spawns a fixed pool of workers bound to one shared queue

use std::sync::Arc;
use std::time::Duration;

use contracts::{DispatcherSettings, ErrorPolicy, Request, RequestProcessor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::dead_letter::DeadLetter;
use crate::error::DispatcherError;
use crate::handle::{DispatcherHandle, RequestSubmitter};
use crate::metrics::DispatcherMetrics;
use crate::worker::Worker;

/// Dispatcher configuration
///
/// Fixed at build time; changing it requires a new dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of concurrent workers
    pub pool_width: usize,
    /// Queue capacity
    pub queue_capacity: usize,
    /// Graceful shutdown budget before workers are cancelled
    pub drain_timeout: Duration,
    /// What happens to requests whose processing fails
    pub error_policy: ErrorPolicy,
}

impl DispatcherConfig {
    /// Configuration with the given pool width and default everything else
    pub fn new(pool_width: usize) -> Self {
        Self {
            pool_width,
            ..Self::default()
        }
    }

    /// Build from loaded settings
    pub fn from_settings(settings: &DispatcherSettings) -> Self {
        Self {
            pool_width: settings.pool_width,
            queue_capacity: settings.queue_capacity,
            drain_timeout: Duration::from_millis(settings.drain_timeout_ms),
            error_policy: settings.error_policy,
        }
    }

    /// Set queue capacity
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set drain timeout
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Set error policy
    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    fn validate(&self) -> Result<(), DispatcherError> {
        if self.pool_width == 0 {
            return Err(DispatcherError::configuration(
                "pool_width",
                "pool width must be >= 1, no workers would ever run",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DispatcherError::configuration(
                "queue_capacity",
                "queue capacity must be >= 1",
            ));
        }
        if self.drain_timeout.is_zero() {
            return Err(DispatcherError::configuration(
                "drain_timeout",
                "drain timeout must be > 0, shutdown would abandon the whole backlog",
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_settings(&DispatcherSettings::default())
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<P> {
    config: DispatcherConfig,
    processor: Arc<P>,
    dead_letter: Option<mpsc::Sender<DeadLetter>>,
    cancel: Option<CancellationToken>,
}

impl<P> DispatcherBuilder<P>
where
    P: RequestProcessor + Sync + 'static,
{
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig, processor: P) -> Self {
        Self::with_shared_processor(config, Arc::new(processor))
    }

    /// Create a builder around a processor the caller keeps a reference to
    pub fn with_shared_processor(config: DispatcherConfig, processor: Arc<P>) -> Self {
        Self {
            config,
            processor,
            dead_letter: None,
            cancel: None,
        }
    }

    /// Channel receiving failed requests under `ErrorPolicy::DeadLetter`
    pub fn dead_letter(mut self, tx: mpsc::Sender<DeadLetter>) -> Self {
        self.dead_letter = Some(tx);
        self
    }

    /// Use an externally owned cancellation token (e.g. a child of the app token)
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate configuration and build the dispatcher
    ///
    /// # Errors
    /// `Configuration` for a zero pool width, queue capacity or drain
    /// timeout, and for a dead-letter policy without a dead-letter channel.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(pool_width = self.config.pool_width, queue_capacity = self.config.queue_capacity)
    )]
    pub fn build(self) -> Result<Dispatcher<P>, DispatcherError> {
        self.config.validate()?;

        if self.config.error_policy == ErrorPolicy::DeadLetter && self.dead_letter.is_none() {
            return Err(DispatcherError::configuration(
                "error_policy",
                "dead_letter policy requires a dead-letter channel",
            ));
        }

        let (tx, rx) = async_channel::bounded(self.config.queue_capacity);
        let metrics = Arc::new(DispatcherMetrics::new(self.config.pool_width));

        Ok(Dispatcher {
            config: self.config,
            processor: self.processor,
            dead_letter: self.dead_letter,
            cancel: self.cancel.unwrap_or_default(),
            queue_tx: tx,
            queue_rx: rx,
            metrics,
        })
    }
}

/// A configured, not yet running worker pool
pub struct Dispatcher<P> {
    config: DispatcherConfig,
    processor: Arc<P>,
    dead_letter: Option<mpsc::Sender<DeadLetter>>,
    cancel: CancellationToken,
    queue_tx: async_channel::Sender<Request>,
    queue_rx: async_channel::Receiver<Request>,
    metrics: Arc<DispatcherMetrics>,
}

impl<P> Dispatcher<P>
where
    P: RequestProcessor + Sync + 'static,
{
    /// Configuration the dispatcher was built with
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Spawn `pool_width` workers on the current Tokio runtime and return
    /// immediately.
    #[instrument(name = "dispatcher_spawn", skip(self), fields(pool_width = self.config.pool_width))]
    pub fn spawn(self) -> DispatcherHandle {
        let workers = (0..self.config.pool_width)
            .map(|worker_id| {
                let worker = Worker::new(
                    worker_id,
                    self.queue_rx.clone(),
                    Arc::clone(&self.processor),
                    self.cancel.clone(),
                    self.config.error_policy,
                    self.dead_letter.clone(),
                    Arc::clone(&self.metrics),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            workers = self.config.pool_width,
            queue_capacity = self.config.queue_capacity,
            processor = self.processor.name(),
            "Dispatcher started"
        );

        DispatcherHandle::new(
            RequestSubmitter::new(self.queue_tx, self.cancel.clone(), Arc::clone(&self.metrics)),
            self.queue_rx,
            workers,
            self.cancel,
            self.metrics,
            self.config.drain_timeout,
        )
    }
}

/// Convenience function to build and start a dispatcher from loaded settings
#[instrument(name = "dispatcher_start", skip(settings, processor))]
pub fn start_dispatcher<P>(
    settings: &DispatcherSettings,
    processor: P,
) -> Result<DispatcherHandle, DispatcherError>
where
    P: RequestProcessor + Sync + 'static,
{
    let config = DispatcherConfig::from_settings(settings);
    Ok(DispatcherBuilder::new(config, processor).build()?.spawn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::WorkerOutcome;
    use crate::processors::EchoProcessor;
    use contracts::{ContractError, Response};
    use std::sync::Mutex;
    use tokio::time::sleep;

    struct CollectingProcessor {
        seen: Mutex<Vec<u64>>,
        delay: Duration,
    }

    impl CollectingProcessor {
        fn new(delay: Duration) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                delay,
            }
        }

        fn seen(&self) -> Vec<u64> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl RequestProcessor for CollectingProcessor {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn process(&self, request: &Request) -> Result<Response, ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.seen.lock().unwrap().push(request.id());
            Ok(Response::new(request.content()))
        }
    }

    fn request(id: u64) -> Request {
        Request::new(id, format!("Request #{id}"), format!("Content #{id}"))
    }

    #[test]
    fn test_zero_pool_width_is_configuration_error() {
        let result = DispatcherBuilder::new(DispatcherConfig::new(0), EchoProcessor::new("echo"))
            .build();
        assert!(matches!(
            result,
            Err(DispatcherError::Configuration { ref field, .. }) if field == "pool_width"
        ));
    }

    #[test]
    fn test_zero_queue_capacity_is_configuration_error() {
        let config = DispatcherConfig::new(2).with_queue_capacity(0);
        let result = DispatcherBuilder::new(config, EchoProcessor::new("echo")).build();
        assert!(matches!(result, Err(DispatcherError::Configuration { .. })));
    }

    #[test]
    fn test_zero_drain_timeout_is_configuration_error() {
        let config = DispatcherConfig::new(2).with_drain_timeout(Duration::ZERO);
        let result = DispatcherBuilder::new(config, EchoProcessor::new("echo")).build();
        assert!(matches!(
            result,
            Err(DispatcherError::Configuration { ref field, .. }) if field == "drain_timeout"
        ));
    }

    #[test]
    fn test_dead_letter_policy_requires_channel() {
        let config = DispatcherConfig::new(1).with_error_policy(ErrorPolicy::DeadLetter);
        let result = DispatcherBuilder::new(config, EchoProcessor::new("echo")).build();
        assert!(matches!(
            result,
            Err(DispatcherError::Configuration { ref field, .. }) if field == "error_policy"
        ));
    }

    #[tokio::test]
    async fn test_spawn_returns_without_blocking() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(4), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();

        assert_eq!(handle.pool_width(), 4);
        assert!(!handle.is_closed());

        let report = handle.shutdown().await;
        assert_eq!(report.workers.len(), 4);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_single_worker_preserves_order() {
        let processor = Arc::new(CollectingProcessor::new(Duration::ZERO));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(1),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        for id in 0..10 {
            handle.submit(request(id)).await.unwrap();
        }

        let report = handle.shutdown().await;
        assert_eq!(processor.seen(), (0..10).collect::<Vec<_>>());
        assert_eq!(report.metrics.processed, 10);
    }

    #[tokio::test]
    async fn test_pool_processes_every_request_once() {
        let processor = Arc::new(CollectingProcessor::new(Duration::from_millis(2)));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(3),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        for id in 0..10 {
            handle.submit(request(id)).await.unwrap();
        }
        let report = handle.shutdown().await;

        let mut seen = processor.seen();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(
            report.workers.iter().map(|w| w.processed).sum::<u64>(),
            10
        );
        assert!(report
            .workers
            .iter()
            .all(|w| w.outcome == WorkerOutcome::Drained));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(2), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();
        let submitter = handle.submitter();

        handle.shutdown().await;

        let err = submitter.submit(request(42)).await.unwrap_err();
        assert!(matches!(err, DispatcherError::QueueClosed { request_id: 42 }));
        assert!(submitter.is_closed());
    }

    #[tokio::test]
    async fn test_try_submit_reports_full_queue() {
        let processor = Arc::new(CollectingProcessor::new(Duration::from_millis(200)));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(1),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        // First request occupies the worker, second fills the single slot.
        handle.submit(request(0)).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        handle.submit(request(1)).await.unwrap();

        let err = handle.try_submit(request(2)).unwrap_err();
        assert!(matches!(err, DispatcherError::QueueFull { request_id: 2 }));

        handle.shutdown().await;
        assert_eq!(processor.seen(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_cancelled_token_rejects_try_submit() {
        let token = CancellationToken::new();
        let handle = DispatcherBuilder::new(DispatcherConfig::new(2), EchoProcessor::new("echo"))
            .cancellation_token(token.clone())
            .build()
            .unwrap()
            .spawn();

        token.cancel();

        let err = handle.try_submit(request(7)).unwrap_err();
        assert!(matches!(err, DispatcherError::QueueClosed { request_id: 7 }));
        assert!(handle.is_closed());

        let report = handle.shutdown().await;
        assert_eq!(report.metrics.submitted, 0);
        assert_eq!(report.metrics.rejected, 1);
        assert_eq!(report.abandoned, 0);
    }
}
