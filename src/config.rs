//! Upload settings and caller hooks.

use crate::error::FailureEvent;
use crate::retry::RetryExhaustion;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// The protocol version sent in `Tus-Resumable`.
pub const DEFAULT_TUS_VERSION: &str = "1.0.0";

/// 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Milliseconds to wait before each successive retry.
pub const DEFAULT_RETRY_DELAYS: [u64; 4] = [0, 1000, 3000, 5000];

/// Plain settings of an upload, loadable from any serde format.
///
/// Only `endpoint` is required when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Where uploads are created.
    pub endpoint: Url,
    /// An existing upload to resume directly, skipping creation. Read once when
    /// the `Upload` is built; a URL obtained by creation is not written back.
    #[serde(default)]
    pub upload_url: Option<Url>,
    /// Milliseconds to wait before each retry of a failed chunk. Empty disables retries.
    #[serde(default = "default_retry_delays")]
    pub retry_delays: Vec<u64>,
    /// Maximum PATCH body size. `None` sends the whole remaining body at once.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    /// Create the upload without a length and declare it with the last chunk.
    #[serde(default)]
    pub defer_length: bool,
    #[serde(default = "default_tus_version")]
    pub tus_version: String,
    #[serde(default)]
    pub retry_exhaustion: RetryExhaustion,
}

fn default_retry_delays() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS.to_vec()
}

fn default_chunk_size() -> Option<u64> {
    Some(DEFAULT_CHUNK_SIZE)
}

fn default_tus_version() -> String {
    DEFAULT_TUS_VERSION.to_owned()
}

impl UploadConfig {
    pub fn new(endpoint: Url) -> Self {
        UploadConfig {
            endpoint,
            upload_url: None,
            retry_delays: default_retry_delays(),
            chunk_size: default_chunk_size(),
            metadata: HashMap::new(),
            custom_headers: HashMap::new(),
            defer_length: false,
            tus_version: default_tus_version(),
            retry_exhaustion: RetryExhaustion::default(),
        }
    }

    pub fn parse(endpoint: &str) -> Result<Self, Error> {
        Ok(UploadConfig::new(Url::parse(endpoint)?))
    }

    pub fn upload_url(mut self, url: Url) -> Self {
        self.upload_url = Some(url);
        self
    }

    pub fn retry_delays(mut self, delays: impl IntoIterator<Item = u64>) -> Self {
        self.retry_delays = delays.into_iter().collect();
        self
    }

    pub fn chunk_size(mut self, size: Option<u64>) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn defer_length(mut self, defer: bool) -> Self {
        self.defer_length = defer;
        self
    }

    pub fn tus_version(mut self, version: impl Into<String>) -> Self {
        self.tus_version = version.into();
        self
    }

    pub fn retry_exhaustion(mut self, policy: RetryExhaustion) -> Self {
        self.retry_exhaustion = policy;
        self
    }

    pub fn retry_durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.retry_delays.iter().map(|ms| Duration::from_millis(*ms))
    }

    /// Checks settings that do not depend on the byte source.
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == Some(0) {
            return Err(Error::Configuration("chunk size must be positive".to_owned()));
        }
        crate::headers::validate_custom_headers(&self.custom_headers)?;
        crate::request::validate_metadata_keys(&self.metadata)
    }

    /// Checks the length settings against what the source reports.
    pub fn validate_length(&self, total_size: Option<u64>) -> Result<(), Error> {
        match (self.defer_length, total_size) {
            (true, Some(size)) if size > 0 => Err(Error::Configuration(format!(
                "deferred length requested but the source has a known size of {} bytes",
                size
            ))),
            (false, None) => Err(Error::Configuration(
                "source length is unknown and deferred length is disabled".to_owned(),
            )),
            (false, Some(0)) => Err(Error::Configuration(
                "source is empty and deferred length is disabled".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

/// Chunk size, bytes uploaded so far, total size when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub chunk_size: u64,
    pub uploaded_size: u64,
    pub total_size: Option<u64>,
}

pub type ProgressHook = Box<dyn FnMut(&ProgressEvent) + Send>;
pub type FailedHook = Box<dyn FnMut(&FailureEvent) + Send>;
pub type CompletedHook = Box<dyn FnMut() + Send>;
pub type ShouldRetryHook = Box<dyn FnMut(&FailureEvent, Duration) -> bool + Send>;

/// Settings plus the hooks the upload reports through.
pub struct UploadOptions {
    pub config: UploadConfig,
    pub(crate) on_progress: Option<ProgressHook>,
    pub(crate) on_failed: Option<FailedHook>,
    pub(crate) on_completed: Option<CompletedHook>,
    pub(crate) on_should_retry: Option<ShouldRetryHook>,
}

impl UploadOptions {
    pub fn new(config: UploadConfig) -> Self {
        UploadOptions {
            config,
            on_progress: None,
            on_failed: None,
            on_completed: None,
            on_should_retry: None,
        }
    }

    /// Invoked after each chunk the server acknowledged.
    pub fn on_progress(mut self, hook: impl FnMut(&ProgressEvent) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(hook));
        self
    }

    /// Invoked on every failure, whether or not it is retried.
    pub fn on_failed(mut self, hook: impl FnMut(&FailureEvent) + Send + 'static) -> Self {
        self.on_failed = Some(Box::new(hook));
        self
    }

    /// Invoked once at the end of every `start`, whatever the outcome.
    pub fn on_completed(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }

    /// Decides whether a failed chunk is retried after the given delay.
    /// Without a hook every failure with a delay left is retried.
    pub fn on_should_retry(
        mut self,
        hook: impl FnMut(&FailureEvent, Duration) -> bool + Send + 'static,
    ) -> Self {
        self.on_should_retry = Some(Box::new(hook));
        self
    }

    pub(crate) fn progress(&mut self, event: &ProgressEvent) {
        if let Some(hook) = self.on_progress.as_mut() {
            hook(event);
        }
    }

    pub(crate) fn failed(&mut self, event: &FailureEvent) {
        if let Some(hook) = self.on_failed.as_mut() {
            hook(event);
        }
    }

    pub(crate) fn completed(&mut self) {
        if let Some(hook) = self.on_completed.as_mut() {
            hook();
        }
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("config", &self.config)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_should_retry", &self.on_should_retry.is_some())
            .finish()
    }
}
