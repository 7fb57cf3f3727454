//! A client for the *tus* resumable upload protocol.
//!
//! An [`Upload`] creates a resource on a tus endpoint, asks the server how
//! many bytes it already holds, and sends the rest of a [`ByteSource`] in
//! chunks, retrying failed chunks according to its [`UploadConfig`]. The
//! transport is anything implementing [`HttpHandler`]; enable the `reqwest`
//! feature for an implementation over `reqwest::blocking::Client`.
//!
//! ```no_run
//! # use tus_upload::*;
//! # fn run(handler: impl HttpHandler) -> Result<(), Error> {
//! let config = UploadConfig::parse("http://localhost:1080/files/")?
//!     .chunk_size(Some(1024 * 1024))
//!     .metadata("filename", "video.mp4");
//! let options = UploadOptions::new(config)
//!     .on_progress(|p| println!("{}/{:?}", p.uploaded_size, p.total_size));
//!
//! let mut upload = Upload::new(Client::new(handler), options);
//! let mut source = ReaderSource::open("video.mp4")?;
//! upload.start(&mut source, &CancellationToken::new())?;
//! # Ok(())
//! # }
//! ```

mod cancel;
mod chunk;
mod client;
mod config;
mod error;
pub mod headers;
pub mod http;
mod request;
mod response;
mod retry;
mod source;
mod upload;

#[cfg(feature = "reqwest")]
mod reqwest;

pub use cancel::CancellationToken;
pub use chunk::{Chunk, ChunkStreamer};
pub use client::Client;
pub use config::{
    ProgressEvent, UploadConfig, UploadOptions, DEFAULT_CHUNK_SIZE, DEFAULT_RETRY_DELAYS,
    DEFAULT_TUS_VERSION,
};
pub use error::{Error, FailureEvent};
pub use http::{HttpHandler, HttpMethod, HttpRequest, HttpResponse};
pub use request::{serialize_metadata, RequestFactory, UploadLength};
pub use response::{Capabilities, CreateResponse, OffsetResponse, TusExtension};
pub use retry::{RetryExhaustion, RetryPolicy};
pub use source::{ByteSource, ReaderSource};
pub use upload::{Upload, UploadState};
