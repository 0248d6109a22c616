//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ContentTransform, ErrorPolicy, ServiceConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    source: String,
    dispatcher: DispatcherInfo,
    processor: ProcessorInfo,
    producer: ProducerInfo,
}

#[derive(Serialize)]
struct DispatcherInfo {
    pool_width: usize,
    queue_capacity: usize,
    drain_timeout_ms: u64,
    error_policy: ErrorPolicy,
}

#[derive(Serialize)]
struct ProcessorInfo {
    transform: ContentTransform,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_payload_bytes: Option<usize>,
}

#[derive(Serialize)]
struct ProducerInfo {
    request_count: u64,
    batch_size: u64,
    batch_pause_ms: u64,
    /// Batches the producer pauses after
    pauses: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let source = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<defaults>".to_string());
    info!(config = %source, "Loading configuration info");

    let config = load_config(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {}", source))?;

    if args.toml {
        let toml = config_loader::ConfigLoader::to_toml(&config)
            .context("Failed to serialize config as TOML")?;
        println!("{}", toml);
    } else if args.json {
        let info = build_config_info(&config, source);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &source);
    }

    Ok(())
}

/// Pauses happen after ids 0, batch_size, 2 * batch_size, ... except the last id
fn pause_count(request_count: u64, batch_size: u64) -> u64 {
    if request_count <= 1 || batch_size == 0 {
        return 0;
    }
    (request_count - 2) / batch_size + 1
}

fn build_config_info(config: &ServiceConfig, source: String) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        source,
        dispatcher: DispatcherInfo {
            pool_width: config.dispatcher.pool_width,
            queue_capacity: config.dispatcher.queue_capacity,
            drain_timeout_ms: config.dispatcher.drain_timeout_ms,
            error_policy: config.dispatcher.error_policy,
        },
        processor: ProcessorInfo {
            transform: config.processor.transform,
            max_payload_bytes: config.processor.max_payload_bytes,
        },
        producer: ProducerInfo {
            request_count: config.producer.request_count,
            batch_size: config.producer.batch_size,
            batch_pause_ms: config.producer.batch_pause_ms,
            pauses: pause_count(config.producer.request_count, config.producer.batch_size),
        },
    }
}

fn print_config_info(config: &ServiceConfig, source: &str) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Workpool Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📄 Source: {}", source);
    println!("   └─ Version: {:?}", config.version);

    let dispatcher = &config.dispatcher;
    println!("\n⚙️  Dispatcher");
    println!("   ├─ Pool width: {}", dispatcher.pool_width);
    println!("   ├─ Queue capacity: {}", dispatcher.queue_capacity);
    println!("   ├─ Drain timeout: {} ms", dispatcher.drain_timeout_ms);
    println!("   └─ Error policy: {:?}", dispatcher.error_policy);

    println!("\n🔧 Processor");
    match config.processor.max_payload_bytes {
        Some(max) => {
            println!("   ├─ Transform: {:?}", config.processor.transform);
            println!("   └─ Max payload: {} bytes", max);
        }
        None => {
            println!("   └─ Transform: {:?}", config.processor.transform);
        }
    }

    let producer = &config.producer;
    println!("\n📤 Producer");
    println!("   ├─ Requests: {}", producer.request_count);
    println!("   ├─ Batch size: {}", producer.batch_size);
    println!(
        "   └─ Pause: {} ms ({} pauses)",
        producer.batch_pause_ms,
        pause_count(producer.request_count, producer.batch_size)
    );

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_count() {
        // 10 requests, batch 3: pauses after ids 0, 3, 6 (none after 9)
        assert_eq!(pause_count(10, 3), 3);
        assert_eq!(pause_count(11, 3), 4);
        assert_eq!(pause_count(1, 3), 0);
        assert_eq!(pause_count(0, 3), 0);
        assert_eq!(pause_count(5, 1), 4);
    }

    #[test]
    fn test_config_info_serializes_snake_case_enums() {
        let info = build_config_info(&ServiceConfig::default(), "<defaults>".to_string());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["dispatcher"]["pool_width"], 3);
        assert_eq!(json["dispatcher"]["error_policy"], "log_and_continue");
        assert_eq!(json["processor"]["transform"], "identity");
        assert!(json["processor"].get("max_payload_bytes").is_none());
        assert_eq!(json["producer"]["pauses"], 3);
    }
}
