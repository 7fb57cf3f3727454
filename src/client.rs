use crate::config::DEFAULT_TUS_VERSION;
use crate::error::FailureEvent;
use crate::http::{HttpHandler, HttpRequest, HttpResponse};
use crate::request::{RequestFactory, UploadLength};
use crate::response::{self, Capabilities, CreateResponse, OffsetResponse};
use crate::Error;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use url::Url;

/// Sends protocol requests through an owned transport.
///
/// Dropping the client releases the transport.
pub struct Client<'a> {
    http_handler: Box<dyn HttpHandler + 'a>,
    tus_version: String,
    custom_headers: HashMap<String, String>,
}

impl<'a> Client<'a> {
    pub fn new(http_handler: impl HttpHandler + 'a) -> Self {
        Client {
            http_handler: Box::new(http_handler),
            tus_version: DEFAULT_TUS_VERSION.to_owned(),
            custom_headers: HashMap::new(),
        }
    }

    /// Adds a header to every request this client sends.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_tus_version(mut self, version: impl Into<String>) -> Self {
        self.tus_version = version.into();
        self
    }

    fn factory(&self) -> RequestFactory<'_> {
        RequestFactory::new(&self.tus_version, &self.custom_headers)
    }

    /// Sends `req` and validates the response, keeping the exchange on failure.
    pub(crate) fn exchange<T>(
        &self,
        req: HttpRequest,
        validate: impl FnOnce(&HttpResponse) -> Result<T, Error>,
    ) -> Result<T, FailureEvent> {
        debug!(method = %req.method, url = %req.url, "sending request");
        let response = match self.http_handler.handle_request(&req) {
            Ok(response) => response,
            Err(e) => return Err(FailureEvent::new(e).with_request(req)),
        };
        match validate(&response) {
            Ok(value) => Ok(value),
            Err(e) => Err(FailureEvent::new(e)
                .with_request(req)
                .with_response(response)),
        }
    }

    /// Get information about the server's protocol support.
    pub fn get_server_info(&self, url: &str) -> Result<Capabilities, Error> {
        let req = self.factory().options(&Url::parse(url)?)?;
        self.exchange(req, response::parse_capabilities)
            .map_err(|f| f.cause)
    }

    /// Get the number of bytes already uploaded to the server.
    pub fn get_progress(&self, url: &str) -> Result<OffsetResponse, Error> {
        let req = self.factory().head(&Url::parse(url)?)?;
        self.exchange(req, response::parse_offset)
            .map_err(|f| f.cause)
    }

    /// Create an upload of `length` bytes, or of deferred length when `None`.
    pub fn create(
        &self,
        endpoint: &str,
        length: Option<u64>,
        metadata: &HashMap<String, String>,
    ) -> Result<Url, Error> {
        let endpoint = Url::parse(endpoint)?;
        let length = length.map_or(UploadLength::Deferred, UploadLength::Known);
        let req = self.factory().create(&endpoint, length, metadata)?;
        self.exchange(req, |res| response::parse_create(res, &endpoint))
            .map(|created: CreateResponse| created.upload_url)
            .map_err(|f| f.cause)
    }

    /// Terminate an upload.
    pub fn delete(&self, url: &str) -> Result<(), Error> {
        let req = self.factory().delete(&Url::parse(url)?)?;
        self.exchange(req, response::parse_delete)
            .map_err(|f| f.cause)
    }
}

impl fmt::Debug for Client<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("tus_version", &self.tus_version)
            .field("custom_headers", &self.custom_headers)
            .finish_non_exhaustive()
    }
}
