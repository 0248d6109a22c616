//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_config;
use crate::cli::{ConfigOverrides, RunArgs};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args.overrides);

    config_loader::ConfigLoader::validate(&config)
        .context("Configuration is invalid after applying CLI overrides")?;

    info!(
        pool_width = config.dispatcher.pool_width,
        queue_capacity = config.dispatcher.queue_capacity,
        requests = config.producer.request_count,
        error_policy = ?config.dispatcher.error_policy,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        service: config,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    // Ctrl+C stops the producer; the pool then drains what was accepted
    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(shutdown.clone()));

    info!("Starting pipeline...");
    let result = Pipeline::new(pipeline_config).run(shutdown).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    info!(
        processed = stats.processed,
        failed = stats.failed,
        abandoned = stats.abandoned,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Workpool finished");
    Ok(())
}

/// Layer CLI overrides on top of the loaded configuration
fn apply_overrides(config: &mut ServiceConfig, overrides: &ConfigOverrides) {
    if let Some(pool_width) = overrides.pool_width {
        info!(pool_width, "Overriding pool width from CLI");
        config.dispatcher.pool_width = pool_width;
    }
    if let Some(queue_capacity) = overrides.queue_capacity {
        config.dispatcher.queue_capacity = queue_capacity;
    }
    if let Some(drain_timeout_ms) = overrides.drain_timeout_ms {
        config.dispatcher.drain_timeout_ms = drain_timeout_ms;
    }
    if let Some(policy) = overrides.error_policy {
        config.dispatcher.error_policy = policy.into();
    }
    if let Some(transform) = overrides.transform {
        config.processor.transform = transform.into();
    }
    if let Some(max) = overrides.max_payload_bytes {
        config.processor.max_payload_bytes = Some(max);
    }
    if let Some(requests) = overrides.requests {
        config.producer.request_count = requests;
    }
    if let Some(batch_size) = overrides.batch_size {
        config.producer.batch_size = batch_size;
    }
    if let Some(batch_pause_ms) = overrides.batch_pause_ms {
        config.producer.batch_pause_ms = batch_pause_ms;
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, draining worker pool...");
    token.cancel();
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &ServiceConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Dispatcher:");
    println!("  Pool width: {}", config.dispatcher.pool_width);
    println!("  Queue capacity: {}", config.dispatcher.queue_capacity);
    println!("  Drain timeout: {} ms", config.dispatcher.drain_timeout_ms);
    println!("  Error policy: {:?}", config.dispatcher.error_policy);
    println!("\nProcessor:");
    println!("  Transform: {:?}", config.processor.transform);
    if let Some(max) = config.processor.max_payload_bytes {
        println!("  Max payload: {} bytes", max);
    }
    println!("\nProducer:");
    println!("  Requests: {}", config.producer.request_count);
    println!(
        "  Pause: {} ms after every {} requests",
        config.producer.batch_pause_ms, config.producer.batch_size
    );
    println!();
}
