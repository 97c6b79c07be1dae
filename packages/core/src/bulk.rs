//! Block transfer on top of a [`RangeByteChannel`].

use std::io::{self, Read, Write};

use crate::channel::{open_from, RangeByteChannel};
use crate::error::{Error, Result};
use crate::path::PathValue;

/// Largest range fetched by one request of [`BulkTransferChannel::transfer_to`].
pub const DEFAULT_TRANSFER_CHUNK: u64 = 1024 * 1024;

/// A file-channel style view of a remote resource.
///
/// Streaming reads go through the wrapped [`RangeByteChannel`]. Positional
/// reads and transfers issue their own bounded ranged GETs and leave the channel
/// position alone.
#[derive(Debug)]
pub struct BulkTransferChannel {
    inner: RangeByteChannel,
    chunk_size: u64,
}

impl BulkTransferChannel {
    pub fn new(inner: RangeByteChannel) -> Self {
        Self {
            inner,
            chunk_size: DEFAULT_TRANSFER_CHUNK,
        }
    }

    /// Use `chunk_size` bytes per transfer request. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn path(&self) -> &PathValue {
        self.inner.path()
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    pub fn position(&self) -> Result<u64> {
        self.inner.position()
    }

    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.inner.set_position(position)
    }

    pub fn size(&self) -> Result<u64> {
        self.inner.size()
    }

    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.inner.read(dst)
    }

    pub fn read_scatter(&mut self, dsts: &mut [&mut [u8]]) -> Result<usize> {
        self.inner.read_scatter(dsts)
    }

    /// Read up to `dst.len()` bytes starting at `position`.
    ///
    /// Returns 0 at or past the end of the resource.
    pub fn read_at(&self, dst: &mut [u8], position: u64) -> Result<usize> {
        let size = self.inner.size()?;
        if position >= size || dst.is_empty() {
            return Ok(0);
        }
        let end = size.min(position.saturating_add(dst.len() as u64));
        let wanted = (end - position) as usize;
        let mut connection = open_from(
            self.path().file_system(),
            self.inner.url(),
            position,
            Some(end - 1),
        )?;
        let mut filled = 0;
        while filled < wanted {
            match connection.read(&mut dst[filled..wanted]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    connection.disconnect();
                    return Err(e.into());
                }
            }
        }
        connection.disconnect();
        Ok(filled)
    }

    /// Copy up to `count` bytes starting at `position` into `sink`.
    ///
    /// Each chunk is a separate bounded request. The transfer stops early when
    /// the resource ends or a chunk comes back empty. Returns the bytes copied.
    pub fn transfer_to<W>(&self, position: u64, count: u64, sink: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let size = self.inner.size()?;
        if position >= size || count == 0 {
            return Ok(0);
        }
        let end = size.min(position.saturating_add(count));
        let fs = self.path().file_system();
        let url = self.inner.url();
        let mut offset = position;
        while offset < end {
            let chunk_end = end.min(offset.saturating_add(self.chunk_size));
            let mut connection = open_from(fs, url, offset, Some(chunk_end - 1))?;
            let copied = io::copy(&mut (&mut *connection).take(chunk_end - offset), sink);
            connection.disconnect();
            let copied = copied?;
            log::debug!(
                "transferred {} byte(s) of {} at offset {}",
                copied,
                url,
                offset
            );
            if copied == 0 {
                break;
            }
            offset += copied;
        }
        Ok(offset - position)
    }

    /// The remote side is read-only; nothing is pulled from `source`.
    pub fn transfer_from<R>(&mut self, _source: &mut R, _position: u64, _count: u64) -> Result<u64>
    where
        R: Read + ?Sized,
    {
        Err(Error::unsupported("transfer into a read-only channel"))
    }

    pub fn write(&mut self, src: &[u8]) -> Result<usize> {
        self.inner.write(src)
    }

    pub fn write_at(&mut self, _src: &[u8], _position: u64) -> Result<usize> {
        Err(Error::unsupported("positional write to a read-only channel"))
    }

    pub fn truncate(&mut self, size: u64) -> Result<()> {
        self.inner.truncate(size)
    }

    pub fn force(&mut self, _metadata: bool) -> Result<()> {
        Err(Error::unsupported("force a read-only channel"))
    }

    pub fn map(&self, _position: u64, _size: u64) -> Result<()> {
        Err(Error::unsupported("memory-map a remote resource"))
    }

    pub fn lock(&self, _position: u64, _size: u64, _shared: bool) -> Result<()> {
        Err(Error::unsupported("lock a remote resource"))
    }

    pub fn try_lock(&self, _position: u64, _size: u64, _shared: bool) -> Result<()> {
        Err(Error::unsupported("lock a remote resource"))
    }

    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn into_inner(self) -> RangeByteChannel {
        self.inner
    }
}

impl Read for BulkTransferChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.inner, buf)
    }
}
