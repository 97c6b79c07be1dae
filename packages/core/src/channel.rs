//! Seekable read channels over ranged GETs.
//!
//! A channel learns the resource size from its first request and keeps one live
//! response stream. Seeking only records the new offset; the next read tears the
//! stream down and opens a fresh `Range: bytes=<offset>-` request.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use http::StatusCode;
use url::Url;

use crate::connection::{content_range_total, open_ranged, Connection};
use crate::error::{Error, Result};
use crate::filesystem::MountedFileSystem;
use crate::path::PathValue;

/// State a channel shares with its file system, so the file system can force it
/// closed.
///
/// Reads take the connection out while they block on it and put it back
/// afterwards. A close in between wins: the returned connection is torn down and
/// the read fails with `ChannelClosed`.
pub(crate) struct ChannelShared {
    closed: AtomicBool,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl ChannelShared {
    fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            closed: AtomicBool::new(false),
            connection: Mutex::new(Some(connection)),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark closed and disconnect. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(connection) = connection {
            connection.disconnect();
        }
        true
    }

    fn take(&self) -> Result<Option<Box<dyn Connection>>> {
        let mut slot = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }
        Ok(slot.take())
    }

    fn restore(&self, connection: Box<dyn Connection>) -> Result<()> {
        let mut slot = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            drop(slot);
            connection.disconnect();
            return Err(Error::ChannelClosed);
        }
        if let Some(stale) = slot.replace(connection) {
            stale.disconnect();
        }
        Ok(())
    }
}

/// Open a ranged GET for `url` with the file system's headers.
///
/// A server that ignores `Range` and answers `200` for a non-zero start has its
/// body advanced to `start` before the connection is returned.
pub(crate) fn open_from(
    fs: &MountedFileSystem,
    url: &Url,
    start: u64,
    end_inclusive: Option<u64>,
) -> Result<Box<dyn Connection>> {
    let mut connection = open_ranged(
        fs.connections().as_ref(),
        url,
        fs.request_headers(),
        start,
        end_inclusive,
    )?;
    log::debug!(
        "GET {} from byte {} answered {}",
        url,
        start,
        connection.status().as_u16()
    );
    if start > 0 && connection.status() == StatusCode::OK {
        let skipped = match io::copy(&mut (&mut *connection).take(start), &mut io::sink()) {
            Ok(skipped) => skipped,
            Err(e) => {
                connection.disconnect();
                return Err(e.into());
            }
        };
        if skipped < start {
            connection.disconnect();
            return Err(Error::io_failure(format!(
                "{}: body ended at byte {} before requested offset {}",
                url, skipped, start
            )));
        }
    }
    Ok(connection)
}

/// A read-only, seekable channel on one remote resource.
///
/// The size is fixed when the channel opens. Closing is idempotent and also
/// happens on drop.
pub struct RangeByteChannel {
    path: PathValue,
    url: Url,
    id: u64,
    size: u64,
    position: u64,
    needs_new_connection: bool,
    shared: Arc<ChannelShared>,
}

impl RangeByteChannel {
    /// Issue the first ranged GET at byte 0 and learn the size from it.
    pub(crate) fn open(path: PathValue, id: u64) -> Result<Self> {
        let url = path.build_url()?;
        let connection = open_from(path.file_system(), &url, 0, None)?;
        let size = match content_range_total(connection.headers())
            .or_else(|| connection.content_length())
        {
            Some(size) => size,
            None => {
                connection.disconnect();
                return Err(Error::io_failure(format!(
                    "{}: response declares no content length",
                    url
                )));
            }
        };
        log::debug!("opened channel {} on {} ({} bytes)", id, url, size);
        Ok(Self {
            path,
            url,
            id,
            size,
            position: 0,
            needs_new_connection: false,
            shared: Arc::new(ChannelShared::new(connection)),
        })
    }

    pub(crate) fn shared(&self) -> Arc<ChannelShared> {
        Arc::clone(&self.shared)
    }

    pub fn path(&self) -> &PathValue {
        &self.path
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::ChannelClosed)
        }
    }

    pub fn position(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    /// Move to `position`. No I/O happens until the next read.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        if position >= self.size {
            return Err(Error::EndOfFile {
                position,
                size: self.size,
            });
        }
        if position != self.position {
            self.position = position;
            self.needs_new_connection = true;
        }
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.size)
    }

    /// Read into `dst`, returning the byte count. 0 means end of file.
    ///
    /// Short reads are normal. A reused stream that ends before the known size
    /// is renewed once at the current offset.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if self.position >= self.size || dst.is_empty() {
            return Ok(0);
        }
        let remaining = usize::try_from(self.size - self.position).unwrap_or(usize::MAX);
        let dst_len = dst.len().min(remaining);
        let dst = &mut dst[..dst_len];

        let (mut connection, fresh) = self.take_connection()?;
        let mut count = self.read_from(connection.as_mut(), dst)?;
        if count == 0 && !fresh {
            log::debug!(
                "stream of channel {} ended at {} of {}, renewing",
                self.id,
                self.position,
                self.size
            );
            connection.disconnect();
            connection = open_from(self.path.file_system(), &self.url, self.position, None)?;
            count = self.read_from(connection.as_mut(), dst)?;
        }
        if count == 0 {
            connection.disconnect();
            self.needs_new_connection = true;
            return Err(Error::io_failure(format!(
                "{}: stream ended at byte {} of {}",
                self.url, self.position, self.size
            )));
        }
        self.shared.restore(connection)?;
        self.position += count as u64;
        Ok(count)
    }

    /// Fill each buffer in turn. Stops early on a short read and returns what
    /// was read so far; an error is returned only if nothing was read.
    pub fn read_scatter(&mut self, dsts: &mut [&mut [u8]]) -> Result<usize> {
        let mut total = 0;
        for dst in dsts.iter_mut() {
            if dst.is_empty() {
                continue;
            }
            match self.read(dst) {
                Ok(count) => {
                    total += count;
                    if count < dst.len() {
                        break;
                    }
                }
                Err(e) if total == 0 => return Err(e),
                Err(e) => {
                    log::debug!("scatter read on channel {} stopped: {}", self.id, e);
                    break;
                }
            }
        }
        Ok(total)
    }

    fn take_connection(&mut self) -> Result<(Box<dyn Connection>, bool)> {
        let existing = self.shared.take()?;
        match existing {
            Some(connection) if !self.needs_new_connection => return Ok((connection, false)),
            Some(stale) => stale.disconnect(),
            None => {}
        }
        let connection = open_from(self.path.file_system(), &self.url, self.position, None)?;
        self.needs_new_connection = false;
        Ok((connection, true))
    }

    fn read_from(&mut self, connection: &mut dyn Connection, dst: &mut [u8]) -> Result<usize> {
        loop {
            match connection.read(dst) {
                Ok(count) => return Ok(count),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.needs_new_connection = true;
                    return Err(e.into());
                }
            }
        }
    }

    pub fn write(&mut self, _src: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        Err(Error::unsupported("write to a read-only channel"))
    }

    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        self.ensure_open()?;
        Err(Error::unsupported("truncate a read-only channel"))
    }

    /// Disconnect and leave the file system's open set. Never fails.
    pub fn close(&mut self) {
        if self.shared.close() {
            log::debug!("closed channel {} on {}", self.id, self.url);
            self.path.file_system().forget_channel(self.id);
        }
    }
}

impl Drop for RangeByteChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl Read for RangeByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        RangeByteChannel::read(self, buf).map_err(io::Error::from)
    }
}

impl Seek for RangeByteChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.ensure_open()?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        if target != self.position {
            self.set_position(target)?;
        }
        Ok(target)
    }
}

impl fmt::Debug for RangeByteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeByteChannel")
            .field("url", &self.url.as_str())
            .field("size", &self.size)
            .field("position", &self.position)
            .field("open", &self.is_open())
            .finish()
    }
}
