//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Invalid pool configuration; no workers were spawned
    #[error("invalid dispatcher configuration '{field}': {message}")]
    Configuration { field: String, message: String },

    /// Submission attempted after shutdown
    #[error("queue closed, request {request_id} rejected")]
    QueueClosed { request_id: u64 },

    /// Non-blocking submission found the queue full
    #[error("queue full, request {request_id} not accepted")]
    QueueFull { request_id: u64 },

    /// Pool did not become idle in time
    #[error("drain timed out after {waited_ms}ms with {pending} requests outstanding")]
    DrainTimeout { waited_ms: u64, pending: usize },
}

impl DispatcherError {
    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }
}
