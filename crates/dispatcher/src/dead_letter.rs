//! Dead-letter records for requests whose processing failed

use contracts::{ContractError, Request};

/// A failed request together with the reason it failed
#[derive(Debug)]
pub struct DeadLetter {
    /// Worker that attempted the request
    pub worker_id: usize,
    /// The request, returned to the caller untouched
    pub request: Request,
    /// Why processing failed
    pub error: ContractError,
}
