//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::{DispatchReport, WorkerOutcome};
use observability::SubmitMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Requests the producer created
    pub requests_produced: u64,

    /// Requests accepted by the queue
    pub submitted: u64,

    /// Requests refused by the queue
    pub rejected: u64,

    /// Requests processed successfully
    pub processed: u64,

    /// Requests whose processing failed
    pub failed: u64,

    /// Failed requests forwarded to the dead-letter log
    pub dead_lettered: u64,

    /// Requests left in the queue at shutdown
    pub abandoned: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Time spent shutting the pool down
    pub shutdown_duration: Duration,

    /// Final outcome per worker, ordered by worker id
    pub worker_outcomes: Vec<WorkerOutcome>,

    /// Producer-side submit metrics
    pub submit_metrics: SubmitMetricsAggregator,
}

impl PipelineStats {
    /// Fold a dispatcher report into the run statistics
    pub fn from_report(
        report: &DispatchReport,
        requests_produced: u64,
        submit_metrics: SubmitMetricsAggregator,
        duration: Duration,
    ) -> Self {
        Self {
            requests_produced,
            submitted: report.metrics.submitted,
            rejected: report.metrics.rejected,
            processed: report.metrics.processed,
            failed: report.metrics.failed,
            dead_lettered: report.metrics.dead_lettered,
            abandoned: report.abandoned,
            duration,
            shutdown_duration: report.elapsed,
            worker_outcomes: report.workers.iter().map(|w| w.outcome.clone()).collect(),
            submit_metrics,
        }
    }

    /// Completed requests (processed or failed) per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            (self.processed + self.failed) as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Every accepted request was either completed or abandoned
    pub fn is_accounted(&self) -> bool {
        self.processed + self.failed + self.abandoned == self.submitted
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Requests produced: {}", self.requests_produced);
        println!("   ├─ Submitted: {}", self.submitted);
        println!("   ├─ Processed: {}", self.processed);
        println!("   ├─ Failed: {}", self.failed);
        println!("   ├─ Dead-lettered: {}", self.dead_lettered);
        println!("   ├─ Abandoned: {}", self.abandoned);
        println!("   └─ Throughput: {:.2} req/s", self.throughput());

        let summary = self.submit_metrics.summary();
        println!("\n📈 Producer");
        println!(
            "   ├─ Rejected: {} ({:.2}%)",
            summary.total_rejected, summary.reject_rate
        );
        println!("   └─ Submit wait (ms): {}", summary.submit_wait_ms);

        println!(
            "\n👷 Workers ({}, shutdown took {:.2}s)",
            self.worker_outcomes.len(),
            self.shutdown_duration.as_secs_f64()
        );
        for (i, outcome) in self.worker_outcomes.iter().enumerate() {
            let prefix = if i + 1 == self.worker_outcomes.len() {
                "└─"
            } else {
                "├─"
            };
            println!("   {} worker {}: {:?}", prefix, i, outcome);
        }

        if !self.is_accounted() {
            println!("\n⚠️  Submitted requests not fully accounted for");
        }

        println!();
    }
}
