//! EchoProcessor - echoes request content, optionally transformed

use contracts::{
    ContentTransform, ContractError, ProcessorSettings, Request, RequestProcessor, Response,
};
use tracing::{debug, instrument};

/// Processor that copies the request content into the response
pub struct EchoProcessor {
    name: String,
    transform: ContentTransform,
    max_payload_bytes: Option<usize>,
}

impl EchoProcessor {
    /// Create a plain echo processor with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: ContentTransform::Identity,
            max_payload_bytes: None,
        }
    }

    /// Create from configuration
    pub fn from_settings(name: impl Into<String>, settings: &ProcessorSettings) -> Self {
        Self {
            name: name.into(),
            transform: settings.transform,
            max_payload_bytes: settings.max_payload_bytes,
        }
    }

    /// Set the content transformation
    pub fn with_transform(mut self, transform: ContentTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Reject payloads larger than `max` bytes
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = Some(max);
        self
    }

    fn check(&self, request: &Request) -> Result<(), ContractError> {
        if request.header().trim().is_empty() {
            return Err(ContractError::malformed_request(
                request.id(),
                "header must not be empty",
            ));
        }
        if let Some(max) = self.max_payload_bytes {
            let size = request.content_len();
            if size > max {
                return Err(ContractError::PayloadTooLarge {
                    request_id: request.id(),
                    size,
                    max,
                });
            }
        }
        Ok(())
    }
}

impl RequestProcessor for EchoProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "echo_processor_process",
        skip(self, request),
        fields(processor = %self.name, request_id = request.id())
    )]
    async fn process(&self, request: &Request) -> Result<Response, ContractError> {
        self.check(request)?;

        debug!(
            header = request.header(),
            content = request.content(),
            transform = ?self.transform,
            "Echoing request content"
        );

        Ok(Response::new(self.transform.apply(request.content())).with_header(request.header()))
    }
}
