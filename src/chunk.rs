//! Splits a byte source into PATCH bodies.

use crate::source::ByteSource;
use bytes::{Bytes, BytesMut};
use std::io;

/// One PATCH body and where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub offset: u64,
    pub data: Bytes,
    /// Whether this chunk ends the source.
    pub is_last: bool,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }
}

/// Reads a source lazily in chunks of at most `chunk_size` bytes.
///
/// With a known total the stream ends exactly at the total. With an unknown
/// total it ends at the end of the source, and one chunk is read ahead so the
/// last chunk can be flagged before it is sent. At most two chunks are held
/// in memory at once.
pub struct ChunkStreamer<'s> {
    source: &'s mut dyn ByteSource,
    chunk_size: Option<u64>,
    total_size: Option<u64>,
    offset: u64,
    lookahead: Option<Bytes>,
    yielded: bool,
    done: bool,
}

impl<'s> ChunkStreamer<'s> {
    /// Positions `source` at `offset`, seeking only if it is elsewhere.
    pub fn new(
        source: &'s mut dyn ByteSource,
        offset: u64,
        chunk_size: Option<u64>,
        total_size: Option<u64>,
    ) -> io::Result<Self> {
        if source.position()? != offset {
            source.seek(offset)?;
        }
        Ok(ChunkStreamer {
            source,
            chunk_size,
            total_size,
            offset,
            lookahead: None,
            yielded: false,
            done: false,
        })
    }

    /// Offset of the next chunk to be produced.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Restarts the stream at `offset`, dropping anything read ahead.
    pub fn rewind_to(&mut self, offset: u64) -> io::Result<()> {
        self.source.seek(offset)?;
        self.offset = offset;
        self.lookahead = None;
        self.done = false;
        Ok(())
    }

    /// Reads up to `limit` bytes, stopping early only at the end of the source.
    fn read_up_to(&mut self, limit: Option<u64>) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        let mut scratch = vec![0u8; scratch_len(limit)];
        loop {
            let want = match limit {
                Some(limit) => {
                    let left = limit - buf.len() as u64;
                    if left == 0 {
                        break;
                    }
                    left.min(scratch.len() as u64) as usize
                }
                None => scratch.len(),
            };
            let n = self.source.read(&mut scratch[..want])?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&scratch[..n]);
        }
        Ok(buf.freeze())
    }

    fn next_known(&mut self, total: u64) -> io::Result<Option<Chunk>> {
        let remaining = total.saturating_sub(self.offset);
        if remaining == 0 {
            return Ok(None);
        }
        let size = self.chunk_size.map_or(remaining, |chunk| chunk.min(remaining));
        let data = self.read_up_to(Some(size))?;
        if (data.len() as u64) < size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended at {} bytes but {} were announced",
                    self.offset + data.len() as u64,
                    total
                ),
            ));
        }
        let chunk = Chunk {
            offset: self.offset,
            is_last: self.offset + size == total,
            data,
        };
        Ok(Some(chunk))
    }

    fn next_deferred(&mut self) -> io::Result<Option<Chunk>> {
        let data = match self.lookahead.take() {
            Some(data) => data,
            None => self.read_up_to(self.chunk_size)?,
        };
        // An empty read still produces one empty, final chunk so the length
        // can be declared.
        if data.is_empty() && self.yielded {
            return Ok(None);
        }
        let next = if data.is_empty() {
            Bytes::new()
        } else {
            self.read_up_to(self.chunk_size)?
        };
        let is_last = next.is_empty();
        if !is_last {
            self.lookahead = Some(next);
        }
        Ok(Some(Chunk {
            offset: self.offset,
            data,
            is_last,
        }))
    }
}

fn scratch_len(limit: Option<u64>) -> usize {
    const MAX_SCRATCH: u64 = 64 * 1024;
    limit.map_or(MAX_SCRATCH, |limit| limit.min(MAX_SCRATCH)).max(1) as usize
}

impl Iterator for ChunkStreamer<'_> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match self.total_size {
            Some(total) => self.next_known(total),
            None => self.next_deferred(),
        };
        match next {
            Ok(Some(chunk)) => {
                self.offset = chunk.end();
                self.yielded = true;
                self.done = chunk.is_last;
                Some(Ok(chunk))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
