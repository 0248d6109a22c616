//! ServiceConfig - Config Loader output
//!
//! Describes the complete service setup: pool width, queue, processing policy
//! and the sample producer.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Worker pool settings
    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatcherSettings,

    /// Processing step settings
    #[serde(default)]
    #[validate(nested)]
    pub processor: ProcessorSettings,

    /// Sample producer settings
    #[serde(default)]
    #[validate(nested)]
    pub producer: ProducerSettings,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatcherSettings {
    /// Number of concurrent workers
    #[serde(default = "default_pool_width")]
    #[validate(range(min = 1, message = "pool_width must be >= 1"))]
    pub pool_width: usize,

    /// Queue capacity (1 = closest to an unbuffered handoff)
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    /// How long a graceful shutdown waits for workers before cancelling them
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// What happens to a request whose processing fails
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

fn default_pool_width() -> usize {
    3
}

fn default_queue_capacity() -> usize {
    1
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            pool_width: default_pool_width(),
            queue_capacity: default_queue_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Policy for requests whose processing fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure and move on; no response is produced
    #[default]
    LogAndContinue,
    /// Log the failure and forward the request to a dead-letter channel
    DeadLetter,
}

/// Processing step settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProcessorSettings {
    /// Transformation applied to echoed content
    #[serde(default)]
    pub transform: ContentTransform,

    /// Maximum accepted payload size in bytes (None = unlimited)
    #[serde(default)]
    #[validate(range(min = 1, message = "max_payload_bytes must be >= 1"))]
    pub max_payload_bytes: Option<usize>,
}

/// Content transformation applied by the echo processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTransform {
    /// Copy content unchanged
    #[default]
    Identity,
    /// Uppercase the content
    Uppercase,
    /// Reverse the content characters
    Reverse,
}

impl ContentTransform {
    /// Apply the transformation
    pub fn apply(self, content: &str) -> String {
        match self {
            Self::Identity => content.to_string(),
            Self::Uppercase => content.to_uppercase(),
            Self::Reverse => content.chars().rev().collect(),
        }
    }
}

/// Sample producer settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProducerSettings {
    /// Number of requests to submit
    #[serde(default = "default_request_count")]
    pub request_count: u64,

    /// Pause after every `batch_size`-th request
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, message = "batch_size must be >= 1"))]
    pub batch_size: u64,

    /// Pause length in milliseconds
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

fn default_request_count() -> u64 {
    10
}

fn default_batch_size() -> u64 {
    3
}

fn default_batch_pause_ms() -> u64 {
    2000
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            request_count: default_request_count(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}
