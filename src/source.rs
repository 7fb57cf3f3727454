//! The data being uploaded.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A seekable source of bytes whose length may be unknown.
///
/// Resuming relies on the source yielding the same bytes at the same
/// positions every time it is read.
pub trait ByteSource {
    /// Total length, or `None` when it is only known once the source is exhausted.
    fn length(&self) -> Option<u64>;

    fn position(&mut self) -> io::Result<u64>;

    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Reads into `buf`, returning `0` at the end of the source.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapts any `Read + Seek` value, such as a `File` or an in-memory `Cursor`.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
    length: Option<u64>,
}

impl<R: Read + Seek> ReaderSource<R> {
    /// Wraps `inner`, measuring its length without moving its position.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let position = inner.stream_position()?;
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;
        Ok(ReaderSource {
            inner,
            length: Some(length),
        })
    }

    /// Wraps `inner` without announcing a length, for deferred-length uploads.
    pub fn with_unknown_length(inner: R) -> Self {
        ReaderSource {
            inner,
            length: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl ReaderSource<File> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        ReaderSource::new(File::open(path)?)
    }
}

impl<R: Read + Seek> ByteSource for ReaderSource<R> {
    fn length(&self) -> Option<u64> {
        self.length
    }

    fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}
