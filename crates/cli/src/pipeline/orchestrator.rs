//! Pipeline orchestrator - wires producer, worker pool and dead-letter log.

use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::{ErrorPolicy, ServiceConfig};
use dispatcher::{DeadLetter, DispatcherBuilder, DispatcherConfig, EchoProcessor};
use observability::record_dispatch_report;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::producer::Producer;
use super::PipelineStats;
use crate::error::CliError;

/// Dead-letter channel capacity
const DEAD_LETTER_BUFFER: usize = 64;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated service configuration
    pub service: ServiceConfig,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the producer to completion (or until `shutdown`), then drain the pool
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let service = &self.config.service;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let processor = EchoProcessor::from_settings("echo", &service.processor);
        let dispatcher_config = DispatcherConfig::from_settings(&service.dispatcher);
        let mut builder = DispatcherBuilder::new(dispatcher_config, processor);

        let dead_letter_log = if service.dispatcher.error_policy == ErrorPolicy::DeadLetter {
            let (tx, rx) = mpsc::channel(DEAD_LETTER_BUFFER);
            builder = builder.dead_letter(tx);
            Some(spawn_dead_letter_log(rx))
        } else {
            None
        };

        let handle = builder.build().map_err(CliError::from)?.spawn();

        // === Phase 1: Produce ===
        let producer = Producer::new(service.producer.clone(), handle.submitter(), shutdown);
        let producer_report = tokio::spawn(producer.run())
            .await
            .map_err(|e| CliError::pipeline_execution(format!("producer task failed: {e}")))?;

        // === Phase 2: Drain ===
        info!(
            queued = handle.queue_len(),
            producer_exit = ?producer_report.exit,
            "Producer done, draining worker pool"
        );
        let report = handle.shutdown().await;
        record_dispatch_report(&report);

        for worker in report.failed_workers() {
            error!(
                worker_id = worker.worker_id,
                outcome = ?worker.outcome,
                "Worker did not finish cleanly"
            );
        }

        // Workers held the only senders; the log ends once they are gone
        if let Some(log) = dead_letter_log {
            match tokio::time::timeout(Duration::from_secs(1), log).await {
                Ok(Ok(count)) => info!(count, "Dead-letter log closed"),
                Ok(Err(e)) => warn!(error = %e, "Dead-letter log task failed"),
                Err(_) => warn!("Dead-letter log did not close in time"),
            }
        }

        Ok(PipelineStats::from_report(
            &report,
            producer_report.produced,
            producer_report.submit_metrics,
            start_time.elapsed(),
        ))
    }
}

/// Log every dead-lettered request until all senders are dropped
fn spawn_dead_letter_log(mut rx: mpsc::Receiver<DeadLetter>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(letter) = rx.recv().await {
            count += 1;
            warn!(
                worker_id = letter.worker_id,
                request_id = letter.request.id(),
                header = letter.request.header(),
                error = %letter.error,
                "Dead-lettered request"
            );
        }
        count
    })
}
