use crate::http::{HttpRequest, HttpResponse};
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Contradictory or invalid settings, detected before any request is sent.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("custom headers use reserved tus header names: {0:?}")]
    ReservedHeaders(Vec<String>),

    /// No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("missing `{0}` header in response")]
    MissingHeader(&'static str),

    #[error("invalid `{name}` header in response: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("unexpected status code {0}")]
    HttpStatus(u16),

    #[error("no upload URL is known for this upload")]
    MissingUploadUrl,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors caused by the caller's settings. These are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::ReservedHeaders(_) | Error::MissingUploadUrl
        )
    }

    /// Errors caused by a missing or unparsable protocol header.
    pub fn is_protocol_header(&self) -> bool {
        matches!(self, Error::MissingHeader(_) | Error::InvalidHeader { .. })
    }
}

/// What went wrong with one protocol call, along with the exchange that
/// produced it.
#[derive(Debug)]
pub struct FailureEvent {
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub message: String,
    pub cause: Error,
}

impl FailureEvent {
    pub fn new(cause: Error) -> Self {
        FailureEvent {
            request: None,
            response: None,
            message: cause.to_string(),
            cause,
        }
    }

    pub fn with_request(mut self, request: HttpRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: HttpResponse) -> Self {
        self.response = Some(response);
        self
    }
}

impl From<Error> for FailureEvent {
    fn from(cause: Error) -> Self {
        FailureEvent::new(cause)
    }
}
