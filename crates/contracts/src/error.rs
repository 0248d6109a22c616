//! Layered error definitions
//!
//! Categorized by source: config / request / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Processing Errors =====
    /// Request rejected by a processor as structurally invalid
    #[error("malformed request {request_id}: {message}")]
    MalformedRequest { request_id: u64, message: String },

    /// Request payload exceeds the processor limit
    #[error("request {request_id} payload too large: {size} bytes, max={max}")]
    PayloadTooLarge {
        request_id: u64,
        size: usize,
        max: usize,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create malformed request error
    pub fn malformed_request(request_id: u64, message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            request_id,
            message: message.into(),
        }
    }

    /// Whether this error was raised while processing a single request
    pub fn is_processing_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequest { .. } | Self::PayloadTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_error_classification() {
        assert!(ContractError::malformed_request(3, "empty header").is_processing_error());
        assert!(ContractError::PayloadTooLarge {
            request_id: 1,
            size: 10,
            max: 5
        }
        .is_processing_error());
        assert!(!ContractError::config_validation("pool_width", "must be > 0").is_processing_error());
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = ContractError::PayloadTooLarge {
            request_id: 7,
            size: 2048,
            max: 1024,
        };
        assert_eq!(
            err.to_string(),
            "request 7 payload too large: 2048 bytes, max=1024"
        );
    }
}
