//! Echo Pool Example
//!
//! Three workers drain one queue while a producer submits ten requests,
//! pausing after every third. Pass a TOML/JSON config path to override the
//! defaults.
//!
//! Run with: cargo run -p demos --bin echo_pool [config.toml]

use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{Request, ServiceConfig};
use dispatcher::{start_dispatcher, EchoProcessor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Echo Pool Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        ServiceConfig::default()
    };

    // ==== Stage 2: Start the pool ====
    let processor = EchoProcessor::from_settings("echo", &config.processor);
    let handle = start_dispatcher(&config.dispatcher, processor)?;
    tracing::info!(workers = handle.pool_width(), "Worker pool running");

    // ==== Stage 3: Produce ====
    let producer = &config.producer;
    for id in 0..producer.request_count {
        let request = Request::new(
            id,
            format!("Request #{id}"),
            format!("Content: this is the content for Request #{id})"),
        );
        handle.submit(request).await?;

        if id % producer.batch_size == 0 && id + 1 < producer.request_count {
            tracing::info!(
                request_id = id,
                pause_ms = producer.batch_pause_ms,
                "Client request created, sleeping"
            );
            tokio::time::sleep(Duration::from_millis(producer.batch_pause_ms)).await;
        }
    }

    // ==== Stage 4: Drain ====
    let report = handle.shutdown().await;
    tracing::info!(
        processed = report.metrics.processed,
        failed = report.metrics.failed,
        abandoned = report.abandoned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Demo finished"
    );

    for worker in &report.workers {
        println!(
            "worker {}: processed={} failed={} outcome={:?}",
            worker.worker_id, worker.processed, worker.failed, worker.outcome
        );
    }

    Ok(())
}
