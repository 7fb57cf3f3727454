//! Builds the requests of the protocol.
//!
//! Every request is built from scratch out of the upload settings, so no
//! header set on one request can leak into another.

use crate::headers;
use crate::http::{HttpMethod, HttpRequest};
use crate::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use std::collections::HashMap;
use url::Url;

/// Serializes metadata as comma-joined `key base64(value)` pairs.
///
/// An empty value is written as the bare key. Pairs are sorted by key so
/// the header is stable across calls.
pub fn serialize_metadata(metadata: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = metadata
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{} {}", key, STANDARD.encode(value.as_bytes()))
            }
        })
        .collect();
    pairs.sort();
    pairs.join(",")
}

pub fn validate_metadata_keys(metadata: &HashMap<String, String>) -> Result<(), Error> {
    for key in metadata.keys() {
        if key.is_empty() || key.contains(' ') || key.contains(',') {
            return Err(Error::Configuration(format!(
                "metadata key {:?} must be non-empty and contain no spaces or commas",
                key
            )));
        }
    }
    Ok(())
}

/// How the upload length is announced on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadLength {
    Known(u64),
    Deferred,
}

/// Builds requests carrying one protocol version and one set of custom headers.
#[derive(Debug, Clone, Copy)]
pub struct RequestFactory<'a> {
    tus_version: &'a str,
    custom_headers: &'a HashMap<String, String>,
}

impl<'a> RequestFactory<'a> {
    pub fn new(tus_version: &'a str, custom_headers: &'a HashMap<String, String>) -> Self {
        RequestFactory {
            tus_version,
            custom_headers,
        }
    }

    /// Starts a request with the custom headers merged in.
    ///
    /// Custom headers are validated first so no request is ever built with a
    /// reserved name.
    fn base(&self, method: HttpMethod, url: &str) -> Result<HttpRequest, Error> {
        headers::validate_custom_headers(self.custom_headers)?;
        let mut req = HttpRequest::new(method, url);
        for (name, value) in self.custom_headers {
            req.headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        if !self.tus_version.is_empty() {
            req.headers
                .insert(headers::TUS_RESUMABLE.to_owned(), self.tus_version.to_owned());
        }
        Ok(req)
    }

    pub fn create(
        &self,
        endpoint: &Url,
        length: UploadLength,
        metadata: &HashMap<String, String>,
    ) -> Result<HttpRequest, Error> {
        validate_metadata_keys(metadata)?;
        let mut req = self.base(HttpMethod::Post, endpoint.as_str())?;
        match length {
            UploadLength::Known(length) => {
                req.headers
                    .insert(headers::UPLOAD_LENGTH.to_owned(), length.to_string());
            }
            UploadLength::Deferred => {
                req.headers
                    .insert(headers::UPLOAD_DEFER_LENGTH.to_owned(), "1".to_owned());
            }
        }
        if !metadata.is_empty() {
            req.headers.insert(
                headers::UPLOAD_METADATA.to_owned(),
                serialize_metadata(metadata),
            );
        }
        Ok(req)
    }

    pub fn head(&self, upload_url: &Url) -> Result<HttpRequest, Error> {
        self.base(HttpMethod::Head, upload_url.as_str())
    }

    /// A PATCH carrying one chunk. `declare_length` is set once a deferred
    /// length has become known.
    pub fn patch(
        &self,
        upload_url: &Url,
        offset: u64,
        chunk: Bytes,
        declare_length: Option<u64>,
    ) -> Result<HttpRequest, Error> {
        let mut req = self.base(HttpMethod::Patch, upload_url.as_str())?;
        req.headers
            .insert(headers::UPLOAD_OFFSET.to_owned(), offset.to_string());
        req.headers.insert(
            headers::CONTENT_TYPE.to_owned(),
            headers::OFFSET_OCTET_STREAM.to_owned(),
        );
        if let Some(length) = declare_length {
            req.headers
                .insert(headers::UPLOAD_LENGTH.to_owned(), length.to_string());
        }
        req.body = Some(chunk);
        Ok(req)
    }

    pub fn delete(&self, upload_url: &Url) -> Result<HttpRequest, Error> {
        self.base(HttpMethod::Delete, upload_url.as_str())
    }

    pub fn options(&self, endpoint: &Url) -> Result<HttpRequest, Error> {
        let mut req = self.base(HttpMethod::Options, endpoint.as_str())?;
        req.headers.remove(headers::TUS_RESUMABLE);
        Ok(req)
    }
}
