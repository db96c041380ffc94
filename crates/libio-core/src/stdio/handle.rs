//! Raw handles: the OS-level file a stream sits on.
//!
//! [`RawHandle`] is the seam between the buffering layer and the
//! operating system. [`FileHandle`] is the real implementation over an
//! open file descriptor; [`MemoryHandle`] keeps its bytes in shared memory
//! and can inject faults, which is what tests and benches substitute.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::file::OpenMode;
use crate::meta::FileStatus;

/// Unbuffered byte transport with a seek position.
pub trait RawHandle {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of data.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some prefix of `data`, returning how much was taken.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Reposition, returning the new offset from the start.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Query filesystem status (`fstat`).
    fn status(&self) -> io::Result<FileStatus>;
}

impl<H: RawHandle + ?Sized> RawHandle for Box<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }

    fn status(&self) -> io::Result<FileStatus> {
        (**self).status()
    }
}

// ---------------------------------------------------------------------------
// Standard channels
// ---------------------------------------------------------------------------

/// The three process-wide standard channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardStream {
    Input,
    Output,
    Error,
}

impl StandardStream {
    pub const ALL: [StandardStream; 3] = [
        StandardStream::Input,
        StandardStream::Output,
        StandardStream::Error,
    ];

    /// Display name used for `name()` on the stream.
    pub fn name(self) -> &'static str {
        match self {
            StandardStream::Input => "<stdin>",
            StandardStream::Output => "<stdout>",
            StandardStream::Error => "<stderr>",
        }
    }

    /// Mode string the channel behaves as.
    pub fn mode(self) -> &'static str {
        match self {
            StandardStream::Input => "r",
            StandardStream::Output | StandardStream::Error => "w",
        }
    }
}

// ---------------------------------------------------------------------------
// File descriptor handle
// ---------------------------------------------------------------------------

/// Raw handle over an open file descriptor.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
}

impl FileHandle {
    /// `open(2)` `path` with the flags `mode` implies (creation mode 0666
    /// before umask).
    pub fn open(path: &Path, mode: &OpenMode) -> io::Result<Self> {
        let file = mode.open_options().open(path)?;
        Ok(Self { file })
    }

    /// Duplicate the descriptor of a standard channel.
    ///
    /// Closing the returned handle leaves the process's own descriptor open.
    pub fn standard(which: StandardStream) -> io::Result<Self> {
        let owned = match which {
            StandardStream::Input => io::stdin().as_fd().try_clone_to_owned()?,
            StandardStream::Output => io::stdout().as_fd().try_clone_to_owned()?,
            StandardStream::Error => io::stderr().as_fd().try_clone_to_owned()?,
        };
        Ok(Self {
            file: File::from(owned),
        })
    }
}

impl From<File> for FileHandle {
    fn from(file: File) -> Self {
        Self { file }
    }
}

impl RawHandle for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn status(&self) -> io::Result<FileStatus> {
        self.file.metadata().map(|md| FileStatus::from(&md))
    }
}

// ---------------------------------------------------------------------------
// In-memory handle
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    /// Bytes accepted so far across all clones.
    written: usize,
}

/// In-memory raw handle.
///
/// Clones share the same storage but keep independent positions, so a
/// test can hand one clone to a stream and inspect the bytes through
/// another after the stream is closed.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
    pos: u64,
    write_limit: Option<usize>,
    seekable: bool,
}

impl MemoryHandle {
    /// An empty, seekable handle.
    pub fn new() -> Self {
        Self::with_contents(Vec::new())
    }

    /// A seekable handle pre-loaded with `data`.
    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                data: data.into(),
                written: 0,
            })),
            pos: 0,
            write_limit: None,
            seekable: true,
        }
    }

    /// Fail every write once `limit` bytes have been accepted in total.
    #[must_use]
    pub fn fail_writes_after(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Behave like a pipe: every seek fails with `ESPIPE`.
    #[must_use]
    pub fn unseekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }
}

impl RawHandle for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.state.lock();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        if start >= state.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let mut take = data.len();
        if let Some(limit) = self.write_limit {
            let room = limit.saturating_sub(state.written);
            if room == 0 && !data.is_empty() {
                return Err(io::Error::from_raw_os_error(crate::errno::ENOSPC));
            }
            take = take.min(room);
        }
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        let end = start + take;
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(&data[..take]);
        state.written += take;
        self.pos = end as u64;
        Ok(take)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.seekable {
            return Err(io::Error::from_raw_os_error(crate::errno::ESPIPE));
        }
        let len = self.state.lock().data.len() as i64;
        let target = match pos {
            SeekFrom::Start(off) => i64::try_from(off).ok(),
            SeekFrom::Current(off) => (self.pos as i64).checked_add(off),
            SeekFrom::End(off) => len.checked_add(off),
        };
        match target {
            Some(t) if t >= 0 => {
                self.pos = t as u64;
                Ok(self.pos)
            }
            _ => Err(io::Error::from_raw_os_error(crate::errno::EINVAL)),
        }
    }

    fn status(&self) -> io::Result<FileStatus> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "in-memory handle has no filesystem status",
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
