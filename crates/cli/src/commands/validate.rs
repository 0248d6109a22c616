//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ErrorPolicy, ServiceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    pool_width: usize,
    queue_capacity: usize,
    error_policy: ErrorPolicy,
    request_count: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    pool_width: config.dispatcher.pool_width,
                    queue_capacity: config.dispatcher.queue_capacity,
                    error_policy: config.dispatcher.error_policy,
                    request_count: config.producer.request_count,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.producer.request_count == 0 {
        warnings.push("producer.request_count is 0 - the pool will start and drain immediately".to_string());
    }

    if config.dispatcher.queue_capacity > 1
        && config.dispatcher.queue_capacity as u64 >= config.producer.request_count
        && config.producer.request_count > 0
    {
        warnings.push(format!(
            "dispatcher.queue_capacity ({}) holds every request - the producer never feels backpressure",
            config.dispatcher.queue_capacity
        ));
    }

    let pause_budget = config.producer.batch_pause_ms;
    if pause_budget > 0 && config.dispatcher.drain_timeout_ms < pause_budget {
        warnings.push(format!(
            "dispatcher.drain_timeout_ms ({}) is shorter than producer.batch_pause_ms ({}) - slow work may be abandoned",
            config.dispatcher.drain_timeout_ms, pause_budget
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Pool width: {}", summary.pool_width);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Error policy: {:?}", summary.error_policy);
            println!("  Requests: {}", summary.request_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_summary() {
        let file = write_config("[dispatcher]\npool_width = 4\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().pool_width, 4);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config("[dispatcher]\nqueue_capacity = 0\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("queue_capacity"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_short_drain_timeout_warns() {
        let mut config = ServiceConfig::default();
        config.dispatcher.drain_timeout_ms = 100;
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("drain_timeout_ms")));
    }

    #[test]
    fn test_defaults_have_no_warnings() {
        assert!(collect_warnings(&ServiceConfig::default()).is_empty());
    }
}
