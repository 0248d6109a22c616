//! Shutdown Modes Example
//!
//! Fills a slow pool with a backlog and compares a graceful shutdown that
//! runs out of drain budget against an immediate abort.
//!
//! Run with: cargo run -p demos --bin shutdown_modes

use std::time::Duration;

use contracts::{ContractError, Request, RequestProcessor, Response};
use dispatcher::{DispatchReport, DispatcherBuilder, DispatcherConfig};

/// Sleeps before echoing, so the queue backs up
struct SlowEcho {
    delay: Duration,
}

impl RequestProcessor for SlowEcho {
    fn name(&self) -> &str {
        "slow_echo"
    }

    async fn process(&self, request: &Request) -> Result<Response, ContractError> {
        tokio::time::sleep(self.delay).await;
        Ok(Response::new(request.content()).with_header(request.header()))
    }
}

fn start(drain_timeout: Duration) -> Result<dispatcher::DispatcherHandle, dispatcher::DispatcherError> {
    let config = DispatcherConfig::new(2)
        .with_queue_capacity(20)
        .with_drain_timeout(drain_timeout);
    let processor = SlowEcho {
        delay: Duration::from_millis(100),
    };
    Ok(DispatcherBuilder::new(config, processor).build()?.spawn())
}

fn fill(handle: &dispatcher::DispatcherHandle) -> Result<(), dispatcher::DispatcherError> {
    for id in 0..20 {
        handle.try_submit(Request::new(id, format!("Request #{id}"), "payload"))?;
    }
    Ok(())
}

fn print_report(mode: &str, report: &DispatchReport) {
    println!(
        "{mode}: processed={} abandoned={} elapsed={:?}",
        report.metrics.processed, report.abandoned, report.elapsed
    );
    for worker in &report.workers {
        println!("  worker {} -> {:?}", worker.worker_id, worker.outcome);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Graceful: 20 requests x 100ms over 2 workers needs ~1s; allow 300ms
    let handle = start(Duration::from_millis(300))?;
    fill(&handle)?;
    let report = handle.shutdown().await;
    print_report("shutdown", &report);

    // Abort: only in-flight requests finish
    let handle = start(Duration::from_secs(5))?;
    fill(&handle)?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let report = handle.abort().await;
    print_report("abort", &report);

    Ok(())
}
