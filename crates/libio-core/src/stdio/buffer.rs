//! Byte buffer behind every stream.
//!
//! Holds either read-ahead or dirty write data, never both. It does no I/O
//! of its own: writes return the bytes that have to reach the handle now,
//! and refills borrow the storage through a closure.
//!
//! Reference: POSIX.1-2024 setvbuf, ISO C11 7.21.3

use libio_runtime::BufferPolicy;

/// Capacity used when nothing else is configured.
pub const BUFSIZ: usize = 8192;

/// When buffered writes are pushed to the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufMode {
    /// Only when the buffer overflows (`_IOFBF`).
    Full,
    /// Through the last newline of each write, or on overflow (`_IOLBF`).
    Line,
    /// Immediately (`_IONBF`).
    None,
}

/// `setvbuf` mode arguments.
pub const IOFBF: i32 = 0;
pub const IOLBF: i32 = 1;
pub const IONBF: i32 = 2;

impl BufMode {
    pub fn from_posix(mode: i32) -> Option<BufMode> {
        match mode {
            IOFBF => Some(BufMode::Full),
            IOLBF => Some(BufMode::Line),
            IONBF => Some(BufMode::None),
            _ => Option::None,
        }
    }
}

impl From<BufferPolicy> for BufMode {
    fn from(policy: BufferPolicy) -> Self {
        match policy {
            BufferPolicy::Full => BufMode::Full,
            BufferPolicy::Line => BufMode::Line,
            BufferPolicy::Unbuffered => BufMode::None,
        }
    }
}

/// Which direction currently owns the buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Idle,
    Reading,
    Writing,
}

/// Byte buffer shared by the read and write side of one stream.
///
/// Invariants:
/// - `Reading`: `pos <= filled <= data.len()`, `data[pos..filled]` is read-ahead
/// - `Writing`: `filled == 0`, `data[..pos]` is dirty (not yet on the handle)
/// - `Idle`: `pos == filled == 0`
/// - `data.len() >= 1` (capacity is fixed at creation or `set_mode`)
#[derive(Debug)]
pub struct ByteBuffer {
    data: Vec<u8>,
    pos: usize,
    filled: usize,
    mode: BufMode,
    direction: Direction,
    /// Set by the first read or write; `set_mode` is refused afterwards.
    io_started: bool,
}

impl ByteBuffer {
    /// The read side always keeps at least one byte of storage so that
    /// unbuffered streams can still refill and push back.
    pub fn new(mode: BufMode, capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)],
            pos: 0,
            filled: 0,
            mode,
            direction: Direction::Idle,
            io_started: false,
        }
    }

    pub fn mode(&self) -> BufMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Switch policy and capacity; refused once I/O has started.
    pub fn set_mode(&mut self, mode: BufMode, size: usize) -> bool {
        if self.io_started {
            return false;
        }
        self.mode = mode;
        self.data = vec![0u8; size.max(1)];
        self.reset();
        true
    }

    /// True while buffered bytes have not yet reached the handle.
    pub fn is_dirty(&self) -> bool {
        self.direction == Direction::Writing && self.pos > 0
    }

    /// True while read-ahead is held.
    pub fn is_reading(&self) -> bool {
        self.direction == Direction::Reading
    }

    // -----------------------------------------------------------------------
    // Write-side operations
    // -----------------------------------------------------------------------

    /// Buffer a write. Returns the bytes that must be flushed immediately
    /// (may be empty if buffering absorbs them) and the bytes retained.
    ///
    /// The caller must have discarded any read-ahead first.
    pub fn write(&mut self, data: &[u8]) -> WriteResult {
        debug_assert!(
            self.direction != Direction::Reading,
            "write with read-ahead pending"
        );
        self.io_started = true;
        self.direction = Direction::Writing;

        match self.mode {
            BufMode::None => self.write_through(data),
            BufMode::Full => self.write_full(data),
            BufMode::Line => self.write_line(data),
        }
    }

    /// Dirty bytes not yet handed to the handle.
    pub fn pending_write_data(&self) -> &[u8] {
        match self.direction {
            Direction::Writing => &self.data[..self.pos],
            _ => &[],
        }
    }

    /// Forget the dirty bytes once the caller has written them out.
    pub fn mark_flushed(&mut self) {
        if self.direction == Direction::Writing {
            self.reset();
        }
    }

    /// Replace the dirty bytes with `tail`, the part of a flush the handle
    /// did not accept. An empty tail leaves the buffer idle.
    pub fn retain_unflushed(&mut self, tail: &[u8]) {
        self.reset();
        let keep = tail.len().min(self.data.len());
        if keep > 0 {
            self.data[..keep].copy_from_slice(&tail[..keep]);
            self.pos = keep;
            self.direction = Direction::Writing;
        }
    }

    // -----------------------------------------------------------------------
    // Read-side operations
    // -----------------------------------------------------------------------

    /// Take up to `count` bytes of read-ahead.
    ///
    /// Returns an empty slice when the caller must refill.
    pub fn read(&mut self, count: usize) -> &[u8] {
        if self.direction != Direction::Reading {
            return &[];
        }
        self.io_started = true;
        let take = count.min(self.filled - self.pos);
        let slice = &self.data[self.pos..self.pos + take];
        self.pos += take;
        slice
    }

    /// Unread read-ahead, pushback included.
    pub fn readable(&self) -> usize {
        match self.direction {
            Direction::Reading => self.filled - self.pos,
            _ => 0,
        }
    }

    /// Refill the (drained) read buffer with `source`, which receives the
    /// whole backing storage and reports how many bytes it produced.
    pub fn refill_with<F, E>(&mut self, source: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, E>,
    {
        debug_assert!(!self.is_dirty(), "refill over dirty write data");
        debug_assert_eq!(self.readable(), 0, "refill over unread data");
        self.io_started = true;
        self.reset();
        let n = source(&mut self.data)?;
        let n = n.min(self.data.len());
        if n > 0 {
            self.direction = Direction::Reading;
            self.filled = n;
        }
        Ok(n)
    }

    /// Drop unread read-ahead. Returns how many bytes were dropped so the
    /// caller can move the handle back by that much.
    pub fn discard_read_ahead(&mut self) -> usize {
        let dropped = self.readable();
        if self.direction == Direction::Reading {
            self.reset();
        }
        dropped
    }

    /// Push one byte back in front of the read-ahead (ungetc). Refused while
    /// writes are pending or when the storage is full.
    pub fn unget(&mut self, byte: u8) -> bool {
        match self.direction {
            Direction::Writing => false,
            Direction::Idle => {
                self.data[0] = byte;
                self.pos = 0;
                self.filled = 1;
                self.direction = Direction::Reading;
                true
            }
            Direction::Reading if self.pos > 0 => {
                self.pos -= 1;
                self.data[self.pos] = byte;
                true
            }
            Direction::Reading if self.filled < self.data.len() => {
                self.data.copy_within(0..self.filled, 1);
                self.data[0] = byte;
                self.filled += 1;
                true
            }
            Direction::Reading => false,
        }
    }

    /// Back to idle, dropping whatever was held.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.filled = 0;
        self.direction = Direction::Idle;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn take_pending_with(&mut self, tail: &[u8]) -> Vec<u8> {
        let mut flush = Vec::with_capacity(self.pos + tail.len());
        flush.extend_from_slice(&self.data[..self.pos]);
        flush.extend_from_slice(tail);
        self.pos = 0;
        flush
    }

    fn write_through(&mut self, data: &[u8]) -> WriteResult {
        let flush = self.take_pending_with(data);
        WriteResult {
            buffered: 0,
            flush_needed: !flush.is_empty(),
            flush_data: flush,
        }
    }

    fn write_full(&mut self, data: &[u8]) -> WriteResult {
        let remaining = self.data.len() - self.pos;
        if data.len() <= remaining {
            self.data[self.pos..self.pos + data.len()].copy_from_slice(data);
            self.pos += data.len();
            WriteResult {
                buffered: data.len(),
                flush_needed: false,
                flush_data: Vec::new(),
            }
        } else {
            // Overflow: hand back existing + new bytes in one batch.
            self.write_through(data)
        }
    }

    fn write_line(&mut self, data: &[u8]) -> WriteResult {
        let Some(nl_pos) = data.iter().rposition(|&b| b == b'\n') else {
            return self.write_full(data);
        };

        // Everything up to and including the last newline goes out now.
        let flush_end = nl_pos + 1;
        let remainder = &data[flush_end..];
        if remainder.len() > self.data.len() {
            return self.write_through(data);
        }

        let flush = self.take_pending_with(&data[..flush_end]);
        self.data[..remainder.len()].copy_from_slice(remainder);
        self.pos = remainder.len();

        WriteResult {
            buffered: remainder.len(),
            flush_needed: true,
            flush_data: flush,
        }
    }
}

/// Flush plan returned by [`ByteBuffer::write`].
#[derive(Debug)]
pub struct WriteResult {
    /// Bytes of the write kept in the buffer.
    pub buffered: usize,
    /// `flush_data` must be written to the handle before anything else.
    pub flush_needed: bool,
    /// Older dirty bytes followed by the part of the write not retained.
    pub flush_data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn refill(buf: &mut ByteBuffer, bytes: &[u8]) -> usize {
        buf.refill_with(|dst| {
            let n = bytes.len().min(dst.len());
            dst[..n].copy_from_slice(&bytes[..n]);
            Ok::<usize, ()>(n)
        })
        .unwrap()
    }

    #[test]
    fn full_buffer_absorbs_small_writes() {
        let mut buf = ByteBuffer::new(BufMode::Full, 64);
        let result = buf.write(b"hello");
        assert!(!result.flush_needed);
        assert_eq!(result.buffered, 5);
        assert_eq!(buf.pending_write_data(), b"hello");
        assert!(buf.is_dirty());
    }

    #[test]
    fn full_buffer_flushes_on_overflow() {
        let mut buf = ByteBuffer::new(BufMode::Full, 8);
        let _ = buf.write(b"abcd");
        let result = buf.write(b"efghijklmn");
        assert!(result.flush_needed);
        assert_eq!(&result.flush_data, b"abcdefghijklmn");
        assert!(!buf.is_dirty());
    }

    #[test]
    fn exact_fit_stays_buffered() {
        let mut buf = ByteBuffer::new(BufMode::Full, 4);
        let result = buf.write(b"abcd");
        assert!(!result.flush_needed);
        assert_eq!(buf.pending_write_data(), b"abcd");
    }

    #[test]
    fn line_buffer_flushes_on_newline() {
        let mut buf = ByteBuffer::new(BufMode::Line, 64);
        let result = buf.write(b"hello\nworld");
        assert!(result.flush_needed);
        assert_eq!(&result.flush_data, b"hello\n");
        assert_eq!(buf.pending_write_data(), b"world");
    }

    #[test]
    fn line_buffer_keeps_long_tail() {
        let mut buf = ByteBuffer::new(BufMode::Line, 4);
        let result = buf.write(b"a\nbcdefgh");
        assert!(result.flush_needed);
        assert_eq!(&result.flush_data, b"a\nbcdefgh");
        assert!(buf.pending_write_data().is_empty());
    }

    #[test]
    fn line_buffer_no_newline_buffers() {
        let mut buf = ByteBuffer::new(BufMode::Line, 64);
        let result = buf.write(b"hello");
        assert!(!result.flush_needed);
        assert_eq!(buf.pending_write_data(), b"hello");
    }

    #[test]
    fn unbuffered_always_flushes() {
        let mut buf = ByteBuffer::new(BufMode::None, 0);
        let result = buf.write(b"hello");
        assert!(result.flush_needed);
        assert_eq!(&result.flush_data, b"hello");
        assert_eq!(result.buffered, 0);
        assert!(!buf.is_dirty());
    }

    #[test]
    fn read_from_filled_buffer() {
        let mut buf = ByteBuffer::new(BufMode::Full, 64);
        assert_eq!(refill(&mut buf, b"hello world"), 11);
        assert_eq!(buf.read(5), b"hello");
        assert_eq!(buf.readable(), 6);
        assert_eq!(buf.read(10), b" world");
        assert!(buf.read(1).is_empty());
    }

    #[test]
    fn refill_zero_leaves_idle() {
        let mut buf = ByteBuffer::new(BufMode::Full, 8);
        assert_eq!(refill(&mut buf, b""), 0);
        assert!(!buf.is_reading());
        assert_eq!(buf.readable(), 0);
    }

    #[test]
    fn refill_respects_capacity() {
        let mut buf = ByteBuffer::new(BufMode::Full, 3);
        assert_eq!(refill(&mut buf, b"abcdef"), 3);
        assert_eq!(buf.read(10), b"abc");
    }

    #[test]
    fn discard_reports_read_ahead() {
        let mut buf = ByteBuffer::new(BufMode::Full, 16);
        refill(&mut buf, b"abcdef");
        let _ = buf.read(2);
        assert_eq!(buf.discard_read_ahead(), 4);
        assert_eq!(buf.readable(), 0);
        assert_eq!(buf.discard_read_ahead(), 0);
    }

    #[test]
    fn unget_byte() {
        let mut buf = ByteBuffer::new(BufMode::Full, 64);
        refill(&mut buf, b"hello");
        let _ = buf.read(1);
        assert!(buf.unget(b'j'));
        assert_eq!(buf.read(5), b"jello");
    }

    #[test]
    fn unget_into_idle_and_full_buffers() {
        let mut buf = ByteBuffer::new(BufMode::None, 0);
        assert_eq!(buf.capacity(), 1);
        assert!(buf.unget(b'x'));
        assert!(!buf.unget(b'y'));
        assert_eq!(buf.read(1), b"x");
    }

    #[test]
    fn unget_refused_while_dirty() {
        let mut buf = ByteBuffer::new(BufMode::Full, 8);
        let _ = buf.write(b"a");
        assert!(!buf.unget(b'b'));
    }

    #[test]
    fn retain_unflushed_keeps_tail_dirty() {
        let mut buf = ByteBuffer::new(BufMode::Full, 8);
        let _ = buf.write(b"abcd");
        buf.retain_unflushed(b"cd");
        assert!(buf.is_dirty());
        assert_eq!(buf.pending_write_data(), b"cd");
        buf.retain_unflushed(&[]);
        assert!(!buf.is_dirty());
        assert!(buf.pending_write_data().is_empty());
    }

    #[test]
    fn set_mode_before_io() {
        let mut buf = ByteBuffer::new(BufMode::Full, 64);
        assert!(buf.set_mode(BufMode::Line, 128));
        assert_eq!(buf.mode(), BufMode::Line);
        assert_eq!(buf.capacity(), 128);
    }

    #[test]
    fn set_mode_after_io_fails() {
        let mut buf = ByteBuffer::new(BufMode::Full, 64);
        let _ = buf.write(b"x");
        assert!(!buf.set_mode(BufMode::Line, 128));
    }

    #[test]
    fn bufmode_from_posix() {
        assert_eq!(BufMode::from_posix(0), Some(BufMode::Full));
        assert_eq!(BufMode::from_posix(1), Some(BufMode::Line));
        assert_eq!(BufMode::from_posix(2), Some(BufMode::None));
        assert_eq!(BufMode::from_posix(3), Option::None);
    }

    #[test]
    fn bufmode_from_policy() {
        assert_eq!(BufMode::from(BufferPolicy::Full), BufMode::Full);
        assert_eq!(BufMode::from(BufferPolicy::Line), BufMode::Line);
        assert_eq!(BufMode::from(BufferPolicy::Unbuffered), BufMode::None);
    }
}
