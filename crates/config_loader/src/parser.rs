//! Configuration parsing
//!
//! Supports TOML (primary) and JSON.

use contracts::{ContractError, ServiceConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<ServiceConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<ServiceConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration according to its format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServiceConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContentTransform, ErrorPolicy};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[dispatcher]
pool_width = 4
queue_capacity = 16
drain_timeout_ms = 250
error_policy = "dead_letter"

[processor]
transform = "uppercase"
max_payload_bytes = 1024

[producer]
request_count = 20
batch_size = 5
batch_pause_ms = 0
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.dispatcher.pool_width, 4);
        assert_eq!(config.dispatcher.queue_capacity, 16);
        assert_eq!(config.dispatcher.error_policy, ErrorPolicy::DeadLetter);
        assert_eq!(config.processor.transform, ContentTransform::Uppercase);
        assert_eq!(config.processor.max_payload_bytes, Some(1024));
        assert_eq!(config.producer.request_count, 20);
    }

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let config = parse_toml("").unwrap();
        assert_eq!(config.dispatcher.pool_width, 3);
        assert_eq!(config.producer.request_count, 10);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "dispatcher": { "pool_width": 1 }, "processor": { "transform": "reverse" } }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.dispatcher.pool_width, 1);
        assert_eq!(config.processor.transform, ContentTransform::Reverse);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_transform() {
        let result = parse_toml("[processor]\ntransform = \"rot13\"\n");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
