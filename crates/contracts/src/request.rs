//! Request / Response - the unit of work and its result
//!
//! A `Request` travels producer -> queue -> worker. A `Response` is built by
//! the worker that dequeued the request and never leaves it.

use serde::{Deserialize, Serialize};

/// A unit of work submitted to the dispatcher.
///
/// Immutable once constructed: fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: u64,
    header: String,
    content: String,
}

impl Request {
    /// Create a new request
    ///
    /// `id` is assigned by the producer and must be unique per submission.
    pub fn new(id: u64, header: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            header: header.into(),
            content: content.into(),
        }
    }

    /// Producer-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Short text label
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Payload text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Payload size in bytes
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

/// Result of processing a single `Request`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    /// Optional header
    pub header: Option<String>,

    /// Content derived from the request
    pub content: String,
}

impl Response {
    /// Create a response with content only
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            header: None,
            content: content.into(),
        }
    }

    /// Attach a header
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }
}

/// Pairing of a request and its eventual response.
///
/// Scoped to one processing call inside one worker; discarded after logging.
#[derive(Debug)]
pub struct WorkItem {
    /// Worker that owns this item
    pub worker_id: usize,

    /// The dequeued request
    pub request: Request,

    /// Filled in once processing succeeds
    pub response: Option<Response>,
}

impl WorkItem {
    /// Wrap a freshly dequeued request
    pub fn new(worker_id: usize, request: Request) -> Self {
        Self {
            worker_id,
            request,
            response: None,
        }
    }

    /// Request identifier
    pub fn request_id(&self) -> u64 {
        self.request.id()
    }

    /// Whether a response has been produced
    pub fn is_complete(&self) -> bool {
        self.response.is_some()
    }
}
