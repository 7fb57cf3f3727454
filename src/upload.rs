//! The resumable upload state machine.

use crate::cancel::CancellationToken;
use crate::chunk::{Chunk, ChunkStreamer};
use crate::client::Client;
use crate::config::{ProgressEvent, UploadOptions};
use crate::error::FailureEvent;
use crate::headers;
use crate::http::HttpResponse;
use crate::request::{RequestFactory, UploadLength};
use crate::response::{self, OffsetResponse};
use crate::retry::{RetryExhaustion, RetryPolicy};
use crate::source::ByteSource;
use crate::Error;
use std::fmt;
use std::io;
use tracing::{debug, info, trace, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Creating,
    Created,
    HeadChecking,
    Patching,
    Completed,
    Cancelled,
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Completed | UploadState::Cancelled | UploadState::Failed
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a run stopped short of completion.
enum Stop {
    Cancelled,
    Failed(Error),
}

/// One logical transfer to a tus endpoint.
///
/// The upload learns its URL and offset from the server and keeps them, so
/// `start` can be called again after a cancellation or failure to resume
/// from the last acknowledged byte. The source passed to each `start` must
/// yield the same bytes at the same positions.
pub struct Upload<'a> {
    client: Client<'a>,
    options: UploadOptions,
    state: UploadState,
    upload_url: Option<Url>,
    offset: u64,
    total_size: Option<u64>,
}

impl<'a> Upload<'a> {
    pub fn new(client: Client<'a>, options: UploadOptions) -> Self {
        Upload {
            client,
            upload_url: options.config.upload_url.clone(),
            options,
            state: UploadState::Idle,
            offset: 0,
            total_size: None,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// The absolute URL of the upload, once created or supplied.
    pub fn upload_url(&self) -> Option<&Url> {
        self.upload_url.as_ref()
    }

    /// The last offset acknowledged by the server.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The total length, once known.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// The options this upload was built with.
    ///
    /// `config.upload_url` is only the starting URL and is not updated once
    /// the upload is created; use [`Upload::upload_url`] for the live value.
    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    fn factory(&self) -> RequestFactory<'_> {
        let config = &self.options.config;
        RequestFactory::new(&config.tus_version, &config.custom_headers)
    }

    fn transition(&mut self, state: UploadState) {
        debug!(from = %self.state, to = %state, "upload state change");
        self.state = state;
    }

    /// Reports a terminal failure and stops the run.
    fn fail(&mut self, event: FailureEvent) -> Stop {
        warn!(state = %self.state, error = %event.cause, "upload failed");
        self.options.failed(&event);
        self.transition(UploadState::Failed);
        Stop::Failed(event.cause)
    }

    /// Uploads `source`, creating the upload first unless its URL is known.
    ///
    /// Failures are reported through `on_failed`. `on_completed` runs exactly
    /// once before this returns, whatever the outcome. Configuration errors are
    /// always returned; other failures are returned only when the config asks
    /// for [`RetryExhaustion::ReturnError`]. Cancellation is never an error.
    pub fn start(
        &mut self,
        source: &mut dyn ByteSource,
        cancel: &CancellationToken,
    ) -> Result<UploadState, Error> {
        let result = match self.run(source, cancel) {
            Ok(()) => {
                self.transition(UploadState::Completed);
                info!(
                    url = ?self.upload_url.as_ref().map(Url::as_str),
                    bytes = self.offset,
                    "upload completed"
                );
                Ok(UploadState::Completed)
            }
            Err(Stop::Cancelled) => {
                self.transition(UploadState::Cancelled);
                debug!(offset = self.offset, "upload cancelled");
                Ok(UploadState::Cancelled)
            }
            Err(Stop::Failed(cause)) => {
                if cause.is_configuration()
                    || self.options.config.retry_exhaustion == RetryExhaustion::ReturnError
                {
                    Err(cause)
                } else {
                    Ok(UploadState::Failed)
                }
            }
        };
        self.options.completed();
        result
    }

    fn run(&mut self, source: &mut dyn ByteSource, cancel: &CancellationToken) -> Result<(), Stop> {
        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }

        let config = &self.options.config;
        let checked = config
            .validate()
            .and_then(|_| config.validate_length(source.length()));
        if let Err(e) = checked {
            return Err(self.fail(e.into()));
        }
        if self.total_size.is_none() && !self.options.config.defer_length {
            self.total_size = source.length();
        }

        let upload_url = match self.upload_url.clone() {
            Some(url) => url,
            None => self.create()?,
        };

        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        self.check_offset(&upload_url)?;

        self.transition(UploadState::Patching);
        if self.total_size == Some(self.offset) {
            return Ok(());
        }
        self.patch_all(&upload_url, source, cancel)
    }

    fn create(&mut self) -> Result<Url, Stop> {
        self.transition(UploadState::Creating);
        let config = &self.options.config;
        let length = self
            .total_size
            .map_or(UploadLength::Deferred, UploadLength::Known);
        let built = self
            .factory()
            .create(&config.endpoint, length, &config.metadata);
        let req = match built {
            Ok(req) => req,
            Err(e) => return Err(self.fail(e.into())),
        };

        let endpoint = &self.options.config.endpoint;
        let sent = self
            .client
            .exchange(req, |res| response::parse_create(res, endpoint));
        match sent {
            Ok(created) => {
                debug!(url = %created.upload_url, "upload created");
                self.upload_url = Some(created.upload_url.clone());
                self.transition(UploadState::Created);
                Ok(created.upload_url)
            }
            Err(event) => Err(self.fail(event)),
        }
    }

    fn check_offset(&mut self, upload_url: &Url) -> Result<(), Stop> {
        self.transition(UploadState::HeadChecking);
        let built = self.factory().head(upload_url);
        let req = match built {
            Ok(req) => req,
            Err(e) => return Err(self.fail(e.into())),
        };
        let total_size = self.total_size;
        let sent = self.client.exchange(req, |res| {
            let head = response::parse_offset(res)?;
            check_within_total(res, &head, total_size)?;
            Ok(head)
        });
        let head = match sent {
            Ok(head) => head,
            Err(event) => return Err(self.fail(event)),
        };

        if head.bytes_uploaded < self.offset {
            warn!(
                previous = self.offset,
                reported = head.bytes_uploaded,
                "server reports a smaller offset than previously acknowledged"
            );
        }
        self.offset = head.bytes_uploaded;
        if self.total_size.is_none() {
            self.total_size = head.total_size;
        }
        debug!(offset = self.offset, total = ?self.total_size, "offset confirmed");
        Ok(())
    }

    fn patch_all(
        &mut self,
        upload_url: &Url,
        source: &mut dyn ByteSource,
        cancel: &CancellationToken,
    ) -> Result<(), Stop> {
        let mut retry = RetryPolicy::new(self.options.config.retry_durations());
        let streamer = ChunkStreamer::new(
            source,
            self.offset,
            self.options.config.chunk_size,
            self.total_size,
        );
        let mut streamer = match streamer {
            Ok(streamer) => streamer,
            Err(e) => return Err(self.fail(Error::from(e).into())),
        };

        while let Some(next) = streamer.next() {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => return Err(self.fail(Error::from(e).into())),
            };
            let acked = self.send_chunk(upload_url, &chunk, &mut retry, cancel)?;
            if acked < chunk.end() {
                debug!(acked, expected = chunk.end(), "partial write, rewinding");
                if let Err(e) = streamer.rewind_to(acked) {
                    return Err(self.fail(Error::from(e).into()));
                }
            }
        }

        match self.total_size {
            Some(total) if total == self.offset => Ok(()),
            _ => {
                let ended = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "source ended at offset {} before the upload was complete",
                        self.offset
                    ),
                );
                Err(self.fail(Error::from(ended).into()))
            }
        }
    }

    /// Sends one chunk until the server acknowledges it or retries run out.
    ///
    /// Every retry resends the same bytes at the same offset.
    fn send_chunk(
        &mut self,
        upload_url: &Url,
        chunk: &Chunk,
        retry: &mut RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<u64, Stop> {
        let declare_length = match self.total_size {
            None if chunk.is_last => Some(chunk.end()),
            _ => None,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }

            let built = self
                .factory()
                .patch(upload_url, chunk.offset, chunk.data.clone(), declare_length);
            let req = match built {
                Ok(req) => req,
                Err(e) => return Err(self.fail(e.into())),
            };
            trace!(
                offset = chunk.offset,
                len = chunk.len(),
                last = chunk.is_last,
                "sending chunk"
            );

            let total_size = self.total_size.or(declare_length);
            let sent = self.client.exchange(req, |res| {
                let ack = response::parse_offset(res)?;
                check_within_total(res, &ack, total_size)?;
                check_ack(&ack, chunk)?;
                Ok(ack.bytes_uploaded)
            });

            let failure = match sent {
                Ok(acked) => {
                    self.acknowledge(chunk, acked, declare_length);
                    return Ok(acked);
                }
                Err(failure) => failure,
            };

            warn!(offset = chunk.offset, error = %failure.cause, "chunk failed");
            self.options.failed(&failure);
            if failure.cause.is_configuration() {
                self.transition(UploadState::Failed);
                return Err(Stop::Failed(failure.cause));
            }
            match retry.next_delay(&failure, self.options.on_should_retry.as_mut()) {
                Some(delay) => {
                    debug!(attempt = retry.attempt(), ?delay, "retrying chunk");
                    if cancel.sleep(delay) {
                        return Err(Stop::Cancelled);
                    }
                }
                None => {
                    self.transition(UploadState::Failed);
                    return Err(Stop::Failed(failure.cause));
                }
            }
        }
    }

    fn acknowledge(&mut self, chunk: &Chunk, acked: u64, declare_length: Option<u64>) {
        self.offset = acked;
        if declare_length.is_some() {
            self.total_size = declare_length;
        }
        let event = ProgressEvent {
            chunk_size: acked - chunk.offset,
            uploaded_size: acked,
            total_size: self.total_size,
        };
        self.options.progress(&event);
    }

    /// Terminates the upload on the server.
    ///
    /// Failures are reported through `on_failed` as well as returned. The
    /// local offset is left untouched.
    pub fn delete(&mut self) -> Result<(), Error> {
        let upload_url = match self.upload_url.clone() {
            Some(url) => url,
            None => {
                let event = FailureEvent::new(Error::MissingUploadUrl);
                self.options.failed(&event);
                return Err(event.cause);
            }
        };
        let built = self.factory().delete(&upload_url);
        let req = match built {
            Ok(req) => req,
            Err(e) => {
                let event = FailureEvent::new(e);
                self.options.failed(&event);
                return Err(event.cause);
            }
        };
        let sent = self.client.exchange(req, response::parse_delete);
        match sent {
            Ok(()) => {
                debug!(url = %upload_url, "upload terminated");
                Ok(())
            }
            Err(event) => {
                warn!(url = %upload_url, error = %event.cause, "termination failed");
                self.options.failed(&event);
                Err(event.cause)
            }
        }
    }
}

/// The offset must never pass a known total.
fn check_within_total(
    res: &HttpResponse,
    ack: &OffsetResponse,
    total_size: Option<u64>,
) -> Result<(), Error> {
    match total_size {
        Some(total) if ack.bytes_uploaded > total => Err(Error::InvalidHeader {
            name: headers::UPLOAD_OFFSET,
            value: res
                .header(headers::UPLOAD_OFFSET)
                .unwrap_or_default()
                .to_owned(),
        }),
        _ => Ok(()),
    }
}

/// A PATCH must move the offset forward by at most the bytes sent.
fn check_ack(ack: &OffsetResponse, chunk: &Chunk) -> Result<(), Error> {
    let acked = ack.bytes_uploaded;
    let valid = if chunk.is_empty() {
        acked == chunk.offset
    } else {
        acked > chunk.offset && acked <= chunk.end()
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHeader {
            name: headers::UPLOAD_OFFSET,
            value: acked.to_string(),
        })
    }
}

impl fmt::Debug for Upload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("state", &self.state)
            .field("upload_url", &self.upload_url)
            .field("offset", &self.offset)
            .field("total_size", &self.total_size)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
