//! RequestProcessor trait - the worker's processing step
//!
//! Defines the abstract interface for turning a `Request` into a `Response`.

use crate::{ContractError, Request, Response};

/// Request processing trait
///
/// One instance is shared by every worker in a pool, so implementations take
/// `&self` and keep any mutable state behind their own synchronization.
#[trait_variant::make(RequestProcessor: Send)]
pub trait LocalRequestProcessor {
    /// Processor name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Process a single request
    ///
    /// # Errors
    /// Returns a processing error for malformed or oversized requests
    async fn process(&self, request: &Request) -> Result<Response, ContractError>;
}
