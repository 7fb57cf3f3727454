//! Extracts and validates protocol headers from responses.

use crate::headers;
use crate::http::HttpResponse;
use crate::Error;
use std::str::FromStr;
use url::Url;

/// The result of a successful creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateResponse {
    /// Absolute URL of the new upload.
    pub upload_url: Url,
    pub tus_resumable: String,
}

/// The offset reported by a HEAD or PATCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetResponse {
    pub bytes_uploaded: u64,
    /// `None` when the server does not know the length yet.
    pub total_size: Option<u64>,
    pub tus_resumable: String,
}

/// What a server reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Protocol versions, in the server's order of preference.
    pub supported_versions: Vec<String>,
    pub max_size: Option<u64>,
    /// Extension names, in the order the server listed them.
    pub extension_names: Vec<String>,
}

impl Capabilities {
    pub fn extensions(&self) -> Vec<TusExtension> {
        self.extension_names
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    pub fn supports(&self, extension: &TusExtension) -> bool {
        self.extensions().contains(extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TusExtension {
    Creation,
    CreationDeferLength,
    CreationWithUpload,
    Termination,
    Concatenation,
    Checksum,
    Expiration,
    Other(String),
}

impl FromStr for TusExtension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = match s.trim().to_ascii_lowercase().as_str() {
            "" => {
                return Err(Error::InvalidHeader {
                    name: headers::TUS_EXTENSION,
                    value: s.to_owned(),
                })
            }
            "creation" => TusExtension::Creation,
            "creation-defer-length" => TusExtension::CreationDeferLength,
            "creation-with-upload" => TusExtension::CreationWithUpload,
            "termination" => TusExtension::Termination,
            "concatenation" => TusExtension::Concatenation,
            "checksum" => TusExtension::Checksum,
            "expiration" => TusExtension::Expiration,
            other => TusExtension::Other(other.to_owned()),
        };
        Ok(ext)
    }
}

fn ensure_success(response: &HttpResponse) -> Result<(), Error> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::HttpStatus(response.status_code))
    }
}

fn required<'r>(response: &'r HttpResponse, name: &'static str) -> Result<&'r str, Error> {
    response
        .header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(Error::MissingHeader(name))
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, Error> {
    value.parse().map_err(|_| Error::InvalidHeader {
        name,
        value: value.to_owned(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Validates a creation response, resolving a relative `Location` against
/// `endpoint`.
pub fn parse_create(response: &HttpResponse, endpoint: &Url) -> Result<CreateResponse, Error> {
    ensure_success(response)?;
    let tus_resumable = required(response, headers::TUS_RESUMABLE)?.to_owned();
    let location = required(response, headers::LOCATION)?;
    let upload_url = endpoint.join(location).map_err(|_| Error::InvalidHeader {
        name: headers::LOCATION,
        value: location.to_owned(),
    })?;

    Ok(CreateResponse {
        upload_url,
        tus_resumable,
    })
}

/// Validates a HEAD or PATCH response.
///
/// A missing or unparsable `Upload-Length` means the length is unknown.
pub fn parse_offset(response: &HttpResponse) -> Result<OffsetResponse, Error> {
    ensure_success(response)?;
    let tus_resumable = required(response, headers::TUS_RESUMABLE)?.to_owned();
    let bytes_uploaded = parse_u64(
        headers::UPLOAD_OFFSET,
        required(response, headers::UPLOAD_OFFSET)?,
    )?;
    let total_size = response
        .header(headers::UPLOAD_LENGTH)
        .and_then(|value| value.trim().parse().ok());

    Ok(OffsetResponse {
        bytes_uploaded,
        total_size,
        tus_resumable,
    })
}

/// Validates a termination response.
pub fn parse_delete(response: &HttpResponse) -> Result<(), Error> {
    ensure_success(response)?;
    required(response, headers::TUS_RESUMABLE)?;
    Ok(())
}

/// Validates an OPTIONS response. Only `Tus-Version` is required.
pub fn parse_capabilities(response: &HttpResponse) -> Result<Capabilities, Error> {
    ensure_success(response)?;
    let supported_versions = split_list(required(response, headers::TUS_VERSION)?);
    let max_size = response
        .header(headers::TUS_MAX_SIZE)
        .and_then(|value| value.trim().parse().ok());
    let extension_names = response
        .header(headers::TUS_EXTENSION)
        .map(split_list)
        .unwrap_or_default();

    Ok(Capabilities {
        supported_versions,
        max_size,
        extension_names,
    })
}
