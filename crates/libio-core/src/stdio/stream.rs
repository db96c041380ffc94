//! FILE stream state management.
//!
//! `Stream` is the safe Rust model of a C `FILE`: one raw handle, one
//! byte buffer, one bit cursor, and the `eof` / `error` indicators.
//!
//! Reference: POSIX.1-2024 fopen/fread/fwrite/fseek, ISO C11 7.21
//!
//! Mode-switch rule: every byte-oriented entry point (`read`, `write`,
//! `seek`, `flush`, `close`, and the single-byte variants) first resolves
//! a pending partial byte held by the bit cursor. A write-side partial
//! byte is zero-padded and committed; a read-side one is dropped.

use std::fmt;
use std::io::{self, SeekFrom};
use std::path::Path;

use libio_runtime::{RuntimeConfig, StdioMetrics, global_metrics, runtime_config};

use super::bits::{BitCursor, PendingBits};
use super::buffer::{BufMode, ByteBuffer};
use super::error::StdioError;
use super::file::{Access, Disposition, OpenMode, Position, SeekOrigin};
use super::handle::{FileHandle, RawHandle, StandardStream};
use crate::errno;
use crate::meta::{FileStatus, StatusView};

/// Maximum bit count accepted by `get_bits` / `put_bits`.
pub const MAX_BITS: u32 = 64;

/// Runtime stream state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags {
    /// A read observed end of data. Cleared by seek, rewind, clear_err.
    pub eof: bool,
    /// An operation failed. Cleared only by clear_err / rewind.
    pub error: bool,
}

/// Buffered stream over a raw handle.
#[derive(Debug)]
pub struct Stream<H: RawHandle> {
    handle: H,
    buffer: ByteBuffer,
    bits: BitCursor,
    mode: OpenMode,
    flags: StreamFlags,
    /// Path (or channel name) the stream was opened with.
    name: String,
    /// Mode string as given to open.
    mode_str: String,
    /// Lazily fetched status; dropped whenever bytes reach the handle.
    status: Option<FileStatus>,
    /// errno of the most recent failed handle read or write.
    last_errno: i32,
    closed: bool,
}

impl Stream<FileHandle> {
    /// Open `path` with an `fopen` mode string.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self, StdioError> {
        let path = path.as_ref();
        let open_mode =
            OpenMode::parse(mode).ok_or_else(|| StdioError::InvalidMode(mode.to_string()))?;
        let handle = FileHandle::open(path, &open_mode).map_err(|source| StdioError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::assemble(
            handle,
            path.display().to_string(),
            mode.to_string(),
            open_mode,
            ByteBuffer::new(BufMode::Full, runtime_config().buffer_size),
        ))
    }
}

impl<H: RawHandle> Stream<H> {
    /// Wrap an already-open handle. `mode` must be a canonical mode string
    /// describing what the handle permits.
    pub fn from_handle(handle: H, name: impl Into<String>, mode: &str) -> Result<Self, StdioError> {
        let open_mode =
            OpenMode::parse(mode).ok_or_else(|| StdioError::InvalidMode(mode.to_string()))?;
        Ok(Self::assemble(
            handle,
            name.into(),
            mode.to_string(),
            open_mode,
            ByteBuffer::new(BufMode::Full, runtime_config().buffer_size),
        ))
    }

    /// Stream for one of the standard channels.
    ///
    /// stdin is line-buffered, stdout follows `config.stdout_policy`,
    /// stderr is unbuffered.
    pub fn standard(which: StandardStream, handle: H, config: &RuntimeConfig) -> Self {
        let (disposition, buf_mode) = match which {
            StandardStream::Input => (Disposition::Read, BufMode::Line),
            StandardStream::Output => (Disposition::Write, BufMode::from(config.stdout_policy)),
            StandardStream::Error => (Disposition::Write, BufMode::None),
        };
        let open_mode = OpenMode {
            disposition,
            update: false,
            binary: false,
        };
        Self::assemble(
            handle,
            which.name().to_string(),
            which.mode().to_string(),
            open_mode,
            ByteBuffer::new(buf_mode, config.buffer_size),
        )
    }

    fn assemble(
        handle: H,
        name: String,
        mode_str: String,
        mode: OpenMode,
        buffer: ByteBuffer,
    ) -> Self {
        StdioMetrics::inc(&global_metrics().opens);
        Self {
            handle,
            buffer,
            bits: BitCursor::Clean,
            mode,
            flags: StreamFlags::default(),
            name,
            mode_str,
            status: None,
            last_errno: 0,
            closed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Path (or channel name) used to open the stream.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mode string used to open the stream.
    pub fn mode(&self) -> &str {
        &self.mode_str
    }

    pub fn access(&self) -> Access {
        self.mode.access()
    }

    pub fn is_readable(&self) -> bool {
        self.access().readable()
    }

    pub fn is_writable(&self) -> bool {
        self.access().writable()
    }

    pub fn is_binary(&self) -> bool {
        self.mode.binary
    }

    pub fn is_eof(&self) -> bool {
        self.flags.eof
    }

    pub fn is_error(&self) -> bool {
        self.flags.error
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    /// errno of the most recent failed handle read or write, 0 if none.
    pub fn last_errno(&self) -> i32 {
        self.last_errno
    }

    /// Clear EOF and error indicators.
    pub fn clear_err(&mut self) {
        self.flags = StreamFlags::default();
    }

    pub fn buf_mode(&self) -> BufMode {
        self.buffer.mode()
    }

    /// Current bit cursor state.
    pub fn bit_cursor(&self) -> BitCursor {
        self.bits
    }

    /// Valid bits held by the bit cursor (0 when clean).
    pub fn pending_bits(&self) -> u8 {
        self.bits.pending_bits()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Change the buffering mode (POSIX setvbuf).
    ///
    /// Must be called before any I/O. Returns false if too late.
    pub fn set_buffering(&mut self, mode: BufMode, size: usize) -> bool {
        self.buffer.set_mode(mode, size)
    }

    // -----------------------------------------------------------------------
    // Byte reads
    // -----------------------------------------------------------------------

    /// Read up to `buf.len()` bytes (fread).
    ///
    /// A short count means end of data or an error; the flags tell which.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StdioError> {
        self.require_readable()?;
        self.resolve_bits()?;
        self.prepare_read()?;

        let mut total = 0;
        while total < buf.len() {
            let chunk = self.buffer.read(buf.len() - total);
            if !chunk.is_empty() {
                let n = chunk.len();
                buf[total..total + n].copy_from_slice(chunk);
                total += n;
                continue;
            }
            if self.flags.eof || self.flags.error {
                break;
            }
            match self.refill() {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) if total == 0 => return Err(err),
                Err(_) => break,
            }
        }

        StdioMetrics::add(&global_metrics().bytes_read, total as u64);
        Ok(total)
    }

    /// Read one byte (fgetc).
    pub fn get_byte(&mut self) -> Result<u8, StdioError> {
        self.require_readable()?;
        self.resolve_bits()?;
        let byte = self.next_byte()?;
        StdioMetrics::inc(&global_metrics().bytes_read);
        Ok(byte)
    }

    /// Push one byte back (ungetc). Clears the EOF indicator.
    pub fn unget_byte(&mut self, byte: u8) -> Result<u8, StdioError> {
        self.require_readable()?;
        self.resolve_bits()?;
        self.prepare_read()?;
        if !self.buffer.unget(byte) {
            return Err(StdioError::InvalidArgument("pushback buffer full"));
        }
        self.flags.eof = false;
        Ok(byte)
    }

    // -----------------------------------------------------------------------
    // Byte writes
    // -----------------------------------------------------------------------

    /// Write `data` (fwrite).
    ///
    /// Returns how many bytes of `data` were accepted. A short count means
    /// the handle failed partway; the error flag is set and
    /// [`Stream::last_errno`] says why. Nothing accepted is an `Err`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, StdioError> {
        self.require_writable()?;
        self.resolve_bits()?;
        let n = self.put_bytes(data)?;
        StdioMetrics::add(&global_metrics().bytes_written, n as u64);
        Ok(n)
    }

    /// Write one byte (fputc).
    pub fn put_byte(&mut self, byte: u8) -> Result<u8, StdioError> {
        self.write(&[byte])?;
        Ok(byte)
    }

    /// Write a string without terminator (fputs).
    pub fn put_str(&mut self, s: &str) -> Result<usize, StdioError> {
        self.write(s.as_bytes())
    }

    /// Formatted output primitive: `write!(stream, ...)`.
    ///
    /// Returns the number of bytes written.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize, StdioError> {
        match args.as_str() {
            Some(s) => self.write(s.as_bytes()),
            None => self.write(args.to_string().as_bytes()),
        }
    }

    /// Push buffered writes to the handle (fflush).
    ///
    /// On a stream holding read-ahead the handle is moved back to the
    /// logical position when it supports seeking.
    pub fn flush(&mut self) -> Result<(), StdioError> {
        self.resolve_bits()?;
        if self.buffer.is_reading() {
            // Non-seekable input keeps its read-ahead.
            let _ = self.sync_read_ahead();
        }
        self.flush_pending()
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    /// Reposition (fseek). Returns the new offset from the start.
    ///
    /// Commits pending bits and writes first, drops read-ahead and clears
    /// the EOF indicator. A failed seek leaves the position unchanged.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, StdioError> {
        self.resolve_bits()?;
        self.flush_pending()?;

        let target = match origin {
            SeekOrigin::Current => {
                let unread = self.buffer.readable() as i64;
                offset
                    .checked_sub(unread)
                    .map(SeekFrom::Current)
                    .ok_or(StdioError::InvalidArgument("seek offset out of range"))?
            }
            _ => origin
                .to_seek_from(offset)
                .ok_or(StdioError::InvalidArgument("negative seek offset"))?,
        };

        let pos = self.handle.seek(target).map_err(|err| {
            if err.raw_os_error() == Some(errno::EINVAL) {
                StdioError::InvalidArgument("seek before start of file")
            } else {
                StdioError::Io(err)
            }
        })?;
        self.buffer.reset();
        self.flags.eof = false;
        Ok(pos)
    }

    /// Current logical position (ftell).
    ///
    /// Pending bits in the cursor are not counted. Bytes pushed back at
    /// the start of the file leave no representable position.
    pub fn tell(&mut self) -> Result<u64, StdioError> {
        let raw = self.handle.seek(SeekFrom::Current(0))?;
        let pending = self.buffer.pending_write_data().len() as u64;
        let unread = self.buffer.readable() as u64;
        (raw + pending)
            .checked_sub(unread)
            .ok_or(StdioError::InvalidArgument("position before start of file"))
    }

    /// Seek to the start and clear both indicators (rewind).
    pub fn rewind(&mut self) -> Result<(), StdioError> {
        let result = self.seek(0, SeekOrigin::Start).map(|_| ());
        self.clear_err();
        result
    }

    /// Save the current position (fgetpos).
    pub fn get_pos(&mut self) -> Result<Position, StdioError> {
        self.tell().map(Position)
    }

    /// Return to a saved position (fsetpos).
    pub fn set_pos(&mut self, pos: Position) -> Result<(), StdioError> {
        let offset = i64::try_from(pos.0)
            .map_err(|_| StdioError::InvalidArgument("position out of range"))?;
        self.seek(offset, SeekOrigin::Start).map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Bit I/O
    // -----------------------------------------------------------------------

    /// Read one bit, most significant first (fgetbit).
    pub fn get_bit(&mut self) -> Result<u8, StdioError> {
        self.require_readable()?;
        if self.bits.is_writing() {
            self.resolve_bits()?;
        }
        let bit = match self.bits.take_bit() {
            Some(bit) => bit,
            None => {
                let byte = self.next_byte()?;
                self.bits.load_and_take(byte)
            }
        };
        StdioMetrics::inc(&global_metrics().bits_read);
        Ok(bit)
    }

    /// Write one bit (fputbit). A completed byte is committed to the
    /// byte buffer immediately.
    pub fn put_bit(&mut self, bit: bool) -> Result<bool, StdioError> {
        self.require_writable()?;
        if self.bits.is_reading() {
            self.resolve_bits()?;
        }
        if let Some(byte) = self.bits.push_bit(bit) {
            self.put_bytes(&[byte])?;
        }
        StdioMetrics::inc(&global_metrics().bits_written);
        Ok(bit)
    }

    /// Read `count` bits (at most 64); the first bit read is the most
    /// significant of the result (fgetbits).
    ///
    /// Bits consumed before a failure are lost.
    pub fn get_bits(&mut self, count: u32) -> Result<u64, StdioError> {
        if count > MAX_BITS {
            return Err(StdioError::InvalidArgument("bit count exceeds 64"));
        }
        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 1) | u64::from(self.get_bit()?);
        }
        Ok(value)
    }

    /// Write the `count` low bits of `value`, most significant first
    /// (fputbits). Bits committed before a failure stay committed.
    pub fn put_bits(&mut self, value: u64, count: u32) -> Result<(), StdioError> {
        if count > MAX_BITS {
            return Err(StdioError::InvalidArgument("bit count exceeds 64"));
        }
        for i in (0..count).rev() {
            self.put_bit((value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// Metadata facade. The status is fetched on first use and cached until
    /// bytes next reach the handle; a failed query yields neutral values.
    pub fn metadata(&mut self) -> StatusView {
        if self.status.is_none() {
            self.status = self.handle.status().ok();
        }
        StatusView::new(self.status)
    }

    /// Like [`Stream::metadata`] but reports why the query failed.
    pub fn try_metadata(&mut self) -> Result<FileStatus, StdioError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self
            .handle
            .status()
            .map_err(StdioError::MetadataUnavailable)?;
        self.status = Some(status);
        Ok(status)
    }

    /// Drop the cached status and query again.
    pub fn refresh_metadata(&mut self) -> StatusView {
        self.status = None;
        self.metadata()
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Pad pending bits, flush, and release the handle (fclose).
    ///
    /// The handle is released even when the final flush fails.
    pub fn close(mut self) -> Result<(), StdioError> {
        let result = self.finish();
        self.closed = true;
        result
    }

    fn finish(&mut self) -> Result<(), StdioError> {
        StdioMetrics::inc(&global_metrics().closes);
        let padded = self.resolve_bits();
        let flushed = self.flush_pending();
        padded.and(flushed)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn raise_error(&mut self) {
        self.flags.error = true;
        StdioMetrics::inc(&global_metrics().errors);
    }

    fn require_writable(&mut self) -> Result<(), StdioError> {
        if self.is_writable() {
            Ok(())
        } else {
            self.raise_error();
            Err(StdioError::NotPermitted("writable"))
        }
    }

    /// Refusals happen before the bit cursor is touched.
    fn require_readable(&mut self) -> Result<(), StdioError> {
        if self.is_readable() {
            Ok(())
        } else {
            self.raise_error();
            Err(StdioError::NotPermitted("readable"))
        }
    }

    /// Enter read direction: flush any dirty write data first.
    fn prepare_read(&mut self) -> Result<(), StdioError> {
        self.require_readable()?;
        self.flush_pending()
    }

    /// Resolve the bit cursor before a byte-oriented operation.
    fn resolve_bits(&mut self) -> Result<(), StdioError> {
        match self.bits.resolve() {
            PendingBits::None => Ok(()),
            PendingBits::Discarded(_) => {
                StdioMetrics::inc(&global_metrics().partial_discards);
                Ok(())
            }
            PendingBits::Commit(byte) => {
                StdioMetrics::inc(&global_metrics().partial_pads);
                self.put_bytes(&[byte]).map(|_| ())
            }
        }
    }

    /// Next byte for either byte or bit reads; does not touch the cursor.
    fn next_byte(&mut self) -> Result<u8, StdioError> {
        self.prepare_read()?;
        loop {
            if let Some(&byte) = self.buffer.read(1).first() {
                return Ok(byte);
            }
            if self.flags.eof {
                return Err(StdioError::EndOfData);
            }
            if self.flags.error {
                return Err(StdioError::Io(io::Error::from_raw_os_error(errno::EIO)));
            }
            if self.refill()? == 0 {
                return Err(StdioError::EndOfData);
            }
        }
    }

    /// Refill the read buffer from the handle. Sets EOF on a zero read.
    fn refill(&mut self) -> Result<usize, StdioError> {
        let handle = &mut self.handle;
        let result = self.buffer.refill_with(|dst| loop {
            match handle.read(dst) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        });
        match result {
            Ok(0) => {
                self.flags.eof = true;
                Ok(0)
            }
            Ok(n) => {
                StdioMetrics::inc(&global_metrics().refills);
                Ok(n)
            }
            Err(err) => {
                self.raise_error();
                self.last_errno = errno::from_io_error(&err);
                Err(StdioError::Io(err))
            }
        }
    }

    /// Byte write without bit resolution; shared by `write` and bit commits.
    fn put_bytes(&mut self, data: &[u8]) -> Result<usize, StdioError> {
        self.require_writable()?;
        if self.buffer.is_reading() {
            if let Err(err) = self.sync_read_ahead() {
                self.raise_error();
                return Err(err);
            }
        }
        let result = self.buffer.write(data);
        if !result.flush_needed {
            return Ok(data.len());
        }
        // flush_data is the older dirty bytes followed by the head of `data`.
        let held = result.flush_data.len() + result.buffered - data.len();
        match self.write_raw(&result.flush_data) {
            Ok(()) => Ok(data.len()),
            Err((done, err)) => {
                // Older bytes stay queued; `data` past the failure is dropped.
                self.buffer
                    .retain_unflushed(&result.flush_data[done.min(held)..held]);
                match done.saturating_sub(held) {
                    0 => Err(err),
                    written => Ok(written),
                }
            }
        }
    }

    /// Move the handle back over unread read-ahead, then drop it.
    fn sync_read_ahead(&mut self) -> Result<(), StdioError> {
        let unread = self.buffer.readable();
        if unread > 0 {
            self.handle.seek(SeekFrom::Current(-(unread as i64)))?;
        }
        let _ = self.buffer.discard_read_ahead();
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), StdioError> {
        if !self.buffer.is_dirty() {
            return Ok(());
        }
        let pending = self.buffer.pending_write_data().to_vec();
        match self.write_raw(&pending) {
            Ok(()) => {
                self.buffer.mark_flushed();
                Ok(())
            }
            Err((done, err)) => {
                self.buffer.retain_unflushed(&pending[done..]);
                Err(err)
            }
        }
    }

    /// Write everything to the handle, stopping at the first failure.
    ///
    /// On failure returns how many bytes did reach the handle.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), (usize, StdioError)> {
        let mut done = 0;
        let failure = loop {
            if done == data.len() {
                break None;
            }
            match self.handle.write(&data[done..]) {
                Ok(0) => break Some(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => done += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => break Some(err),
            }
        };
        if done > 0 {
            self.status = None;
        }
        match failure {
            None => {
                StdioMetrics::inc(&global_metrics().flushes);
                Ok(())
            }
            Some(err) => {
                self.raise_error();
                self.last_errno = errno::from_io_error(&err);
                Err((done, StdioError::Io(err)))
            }
        }
    }
}

impl<H: RawHandle> Drop for Stream<H> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.finish();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
