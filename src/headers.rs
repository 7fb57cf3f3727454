use crate::Error;
use std::collections::HashMap;

/// Indicates a byte offset within a resource.
pub const UPLOAD_OFFSET: &str = "upload-offset";

/// Indicates the size of the entire upload in bytes.
pub const UPLOAD_LENGTH: &str = "upload-length";

/// Indicates that the size of the upload is not known yet.
pub const UPLOAD_DEFER_LENGTH: &str = "upload-defer-length";

/// A comma-separated list of protocol versions supported by the server.
pub const TUS_VERSION: &str = "tus-version";

/// The version of the protocol used by the client or the server.
pub const TUS_RESUMABLE: &str = "tus-resumable";

/// A comma-separated list of the extensions supported by the server.
pub const TUS_EXTENSION: &str = "tus-extension";

/// Integer indicating the maximum allowed size of an entire upload in bytes.
pub const TUS_MAX_SIZE: &str = "tus-max-size";

/// Content type of a PATCH request body.
pub const CONTENT_TYPE: &str = "content-type";

/// Key/value pairs describing the upload, values base64 encoded.
pub const UPLOAD_METADATA: &str = "upload-metadata";

/// The URL of a newly created upload.
pub const LOCATION: &str = "location";

/// The only content type a PATCH body may carry.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Header names that custom headers must never shadow.
pub const RESERVED: [&str; 9] = [
    TUS_RESUMABLE,
    UPLOAD_LENGTH,
    UPLOAD_DEFER_LENGTH,
    UPLOAD_OFFSET,
    UPLOAD_METADATA,
    LOCATION,
    TUS_VERSION,
    TUS_EXTENSION,
    TUS_MAX_SIZE,
];

pub fn is_reserved(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    RESERVED.contains(&name.as_str())
}

/// Rejects custom headers that collide with protocol headers.
///
/// Every offending key is reported, sorted so the message is stable.
pub fn validate_custom_headers(custom: &HashMap<String, String>) -> Result<(), Error> {
    let mut reserved: Vec<String> = custom.keys().filter(|k| is_reserved(k)).cloned().collect();
    if reserved.is_empty() {
        return Ok(());
    }
    reserved.sort();
    Err(Error::ReservedHeaders(reserved))
}
