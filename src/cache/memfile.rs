//! Memory File Module
//!
//! An in-memory object body with random-access read/seek, so small cached
//! objects can be served without touching disk.

use std::io::{self, Read, Seek, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

// == Memory File ==
/// Read cursor over a reference-counted byte buffer.
///
/// Cloning is cheap and shares the underlying bytes; every clone keeps its
/// own offset, so concurrent readers never interfere with one another.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    content: Bytes,
    offset: u64,
}

impl MemoryFile {
    /// Creates a cursor positioned at the start of `content`.
    pub fn new(content: Bytes) -> Self {
        Self { content, offset: 0 }
    }

    /// Returns a fresh cursor over the same bytes, positioned at zero.
    pub fn reader(&self) -> Self {
        Self::new(self.content.clone())
    }

    /// Shared handle to the full content.
    pub fn bytes(&self) -> Bytes {
        self.content.clone()
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Current read offset.
    pub fn position(&self) -> u64 {
        self.offset
    }

    fn remaining(&self) -> &[u8] {
        let start = (self.offset as usize).min(self.content.len());
        &self.content[start..]
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.offset += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryFile {
    /// Seeking before the start or past the end is rejected and leaves the
    /// offset untouched.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.content.len() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.offset as i128 + delta as i128,
            SeekFrom::End(delta) => len + delta as i128,
        };

        if target < 0 || target > len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek offset {target} outside 0..={len}"),
            ));
        }

        self.offset = target as u64;
        Ok(self.offset)
    }
}

impl AsyncRead for MemoryFile {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let n = this.read(buf.initialize_unfilled())?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for MemoryFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        self.get_mut().seek(position).map(|_| ())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.offset))
    }
}
