use crate::Error;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Head,
    Patch,
    Options,
    Post,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let verb = match self {
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// A fully built request. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub url: String,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            headers: HashMap::new(),
            url: url.into(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub headers: HashMap<String, String>,
    pub status_code: u16,
}

impl HttpResponse {
    /// Looks a header up regardless of the case the transport used.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn find_header<'m>(headers: &'m HashMap<String, String>, name: &str) -> Option<&'m str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
        .map(String::as_str)
}

/// Sends one request and waits for its response.
///
/// An `Err` means no response was received at all; a response with an error
/// status is still `Ok`.
pub trait HttpHandler {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error>;
}

impl<T: HttpHandler + ?Sized> HttpHandler for &T {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        (**self).handle_request(req)
    }
}

impl<T: HttpHandler + ?Sized> HttpHandler for Box<T> {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        (**self).handle_request(req)
    }
}

impl<T: HttpHandler + ?Sized> HttpHandler for Arc<T> {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        (**self).handle_request(req)
    }
}
