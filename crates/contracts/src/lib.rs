//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - A `Request` is owned by the producer until it is submitted
//! - After submission it is owned by exactly one worker
//! - `Response` and `WorkItem` never leave the worker that built them

mod config;
mod error;
mod processor;
mod request;

pub use config::*;
pub use error::*;
pub use processor::{LocalRequestProcessor, RequestProcessor};
pub use request::*;
