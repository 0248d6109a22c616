//! # Dispatcher
//!
//! Bounded-concurrency request dispatch.
//!
//! Responsibilities:
//! - Own the shared request queue
//! - Spawn a fixed pool of workers draining it
//! - Report worker completion and failures on shutdown

pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod processors;
pub mod worker;

pub use contracts::{Request, RequestProcessor, Response};
pub use dead_letter::DeadLetter;
pub use dispatcher::{start_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::{
    DispatchReport, DispatcherHandle, RequestSubmitter, WorkerOutcome, WorkerReport,
};
pub use crate::metrics::{DispatcherMetrics, MetricsSnapshot, WorkerCounters};
pub use processors::EchoProcessor;
pub use worker::{Worker, WorkerExit};
