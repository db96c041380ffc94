//! Open-stream registry.
//!
//! Streams are addressed by opaque [`StreamId`]s. The three standard
//! channels occupy fixed ids; everything opened later gets a fresh id that
//! is never reused within the table's lifetime.
//!
//! `flush(None)` flushes every writable stream, which is also what happens
//! at process exit through [`ExitFlush`] (Rust callers) or the `atexit`
//! hook the C ABI installs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use libio_runtime::{RuntimeConfig, runtime_config};
use parking_lot::Mutex;

use super::error::StdioError;
use super::handle::{FileHandle, RawHandle, StandardStream};
use super::stream::Stream;

/// Opaque stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(usize);

impl StreamId {
    pub const STDIN: StreamId = StreamId(1);
    pub const STDOUT: StreamId = StreamId(2);
    pub const STDERR: StreamId = StreamId(3);

    /// First id handed to a dynamically opened stream.
    const FIRST_DYNAMIC: usize = 16;

    pub fn standard(which: StandardStream) -> StreamId {
        match which {
            StandardStream::Input => StreamId::STDIN,
            StandardStream::Output => StreamId::STDOUT,
            StandardStream::Error => StreamId::STDERR,
        }
    }

    pub fn from_raw(raw: usize) -> StreamId {
        StreamId(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }

    pub fn is_standard(self) -> bool {
        (1..=3).contains(&self.0)
    }
}

/// Registry of open streams.
#[derive(Debug)]
pub struct StreamTable<H: RawHandle> {
    streams: HashMap<StreamId, Stream<H>>,
    next_id: usize,
}

impl<H: RawHandle> Default for StreamTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RawHandle> StreamTable<H> {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
            next_id: StreamId::FIRST_DYNAMIC,
        }
    }

    /// Install a standard channel under its fixed id, replacing any
    /// previous stream there.
    pub fn register_standard(
        &mut self,
        which: StandardStream,
        handle: H,
        config: &RuntimeConfig,
    ) -> StreamId {
        let id = StreamId::standard(which);
        self.streams
            .insert(id, Stream::standard(which, handle, config));
        id
    }

    /// Register an already-built stream under a fresh id.
    pub fn insert(&mut self, stream: Stream<H>) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;
        self.streams.insert(id, stream);
        id
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream<H>> {
        self.streams.get(&id)
    }

    pub fn get_mut(&mut self, id: StreamId) -> Result<&mut Stream<H>, StdioError> {
        self.streams.get_mut(&id).ok_or(StdioError::BadStream)
    }

    /// Remove and close a stream. The id is invalid afterwards even if the
    /// final flush fails.
    pub fn close(&mut self, id: StreamId) -> Result<(), StdioError> {
        let stream = self.streams.remove(&id).ok_or(StdioError::BadStream)?;
        stream.close()
    }

    /// Flush one stream, or every writable stream when `target` is `None`.
    ///
    /// Flushing all continues past failures and reports the first one.
    pub fn flush(&mut self, target: Option<StreamId>) -> Result<(), StdioError> {
        if let Some(id) = target {
            return self.get_mut(id)?.flush();
        }
        let mut first_err = None;
        for stream in self.streams.values_mut().filter(|s| s.is_writable()) {
            if let Err(err) = stream.flush() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Ids of all open streams, in ascending order.
    pub fn ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.streams.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl StreamTable<FileHandle> {
    /// Table pre-populated with the process's standard channels.
    ///
    /// A channel whose descriptor cannot be duplicated (closed by the
    /// parent, for instance) is left out.
    pub fn with_process_streams(config: &RuntimeConfig) -> Self {
        let mut table = Self::new();
        for which in StandardStream::ALL {
            if let Ok(handle) = FileHandle::standard(which) {
                table.register_standard(which, handle, config);
            }
        }
        table
    }

    /// Open `path` and register the stream.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: &str) -> Result<StreamId, StdioError> {
        let stream = Stream::open(path, mode)?;
        Ok(self.insert(stream))
    }
}

// ---------------------------------------------------------------------------
// Process-wide table
// ---------------------------------------------------------------------------

static GLOBAL_TABLE: OnceLock<Mutex<StreamTable<FileHandle>>> = OnceLock::new();

/// The process-wide stream table, created with the standard channels on
/// first use.
pub fn global_table() -> &'static Mutex<StreamTable<FileHandle>> {
    GLOBAL_TABLE.get_or_init(|| Mutex::new(StreamTable::with_process_streams(&runtime_config())))
}

/// Flush every writable stream in the process-wide table.
pub fn flush_all() -> Result<(), StdioError> {
    match GLOBAL_TABLE.get() {
        Some(table) => table.lock().flush(None),
        None => Ok(()),
    }
}

/// Guard that flushes the process-wide table when dropped.
///
/// Hold one in `main` so buffered output reaches its destination on a
/// normal return.
#[derive(Debug)]
#[must_use = "the table is flushed when the guard is dropped"]
pub struct ExitFlush {
    _private: (),
}

impl Drop for ExitFlush {
    fn drop(&mut self) {
        let _ = flush_all();
    }
}

pub fn exit_flush_guard() -> ExitFlush {
    ExitFlush { _private: () }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdio::handle::MemoryHandle;

    fn mem_table() -> (StreamTable<MemoryHandle>, MemoryHandle, MemoryHandle) {
        let config = RuntimeConfig::default();
        let out = MemoryHandle::new();
        let err = MemoryHandle::new();
        let mut table = StreamTable::new();
        table.register_standard(StandardStream::Input, MemoryHandle::new(), &config);
        table.register_standard(StandardStream::Output, out.clone(), &config);
        table.register_standard(StandardStream::Error, err.clone(), &config);
        (table, out, err)
    }

    #[test]
    fn standard_ids_are_fixed() {
        let (table, _, _) = mem_table();
        assert_eq!(table.ids(), vec![StreamId::STDIN, StreamId::STDOUT, StreamId::STDERR]);
        assert!(StreamId::STDOUT.is_standard());
        assert_eq!(table.get(StreamId::STDERR).unwrap().name(), "<stderr>");
    }

    #[test]
    fn dynamic_ids_are_fresh() {
        let mut table = StreamTable::new();
        let a = table.insert(Stream::from_handle(MemoryHandle::new(), "a", "w").unwrap());
        let b = table.insert(Stream::from_handle(MemoryHandle::new(), "b", "w").unwrap());
        assert_ne!(a, b);
        assert!(!a.is_standard());
        table.close(a).unwrap();
        let c = table.insert(Stream::from_handle(MemoryHandle::new(), "c", "w").unwrap());
        assert_ne!(a, c);
    }

    #[test]
    fn flush_none_flushes_every_writer() {
        let (mut table, out, _) = mem_table();
        let file = MemoryHandle::new();
        let id = table.insert(Stream::from_handle(file.clone(), "f", "w").unwrap());
        table.get_mut(StreamId::STDOUT).unwrap().put_str("no newline").unwrap();
        table.get_mut(id).unwrap().put_str("buffered").unwrap();
        assert!(out.contents().is_empty());
        assert!(file.contents().is_empty());

        table.flush(None).unwrap();
        assert_eq!(out.contents(), b"no newline");
        assert_eq!(file.contents(), b"buffered");
    }

    #[test]
    fn flush_one_leaves_others() {
        let (mut table, out, _) = mem_table();
        let file = MemoryHandle::new();
        let id = table.insert(Stream::from_handle(file.clone(), "f", "w").unwrap());
        table.get_mut(StreamId::STDOUT).unwrap().put_str("x").unwrap();
        table.get_mut(id).unwrap().put_str("y").unwrap();
        table.flush(Some(id)).unwrap();
        assert_eq!(file.contents(), b"y");
        assert!(out.contents().is_empty());
    }

    #[test]
    fn flush_all_reports_first_failure_and_continues() {
        let (mut table, out, _) = mem_table();
        let bad = MemoryHandle::new().fail_writes_after(0);
        let id = table.insert(Stream::from_handle(bad, "bad", "w").unwrap());
        table.get_mut(id).unwrap().put_str("lost").unwrap();
        table.get_mut(StreamId::STDOUT).unwrap().put_str("kept").unwrap();
        assert!(table.flush(None).is_err());
        assert_eq!(out.contents(), b"kept");
        assert!(table.get(id).unwrap().is_error());
    }

    #[test]
    fn close_after_failed_flush_all_still_fails() {
        let mut table = StreamTable::new();
        let bad = MemoryHandle::new().fail_writes_after(1);
        let id = table.insert(Stream::from_handle(bad.clone(), "bad", "w").unwrap());
        table.get_mut(id).unwrap().put_str("abc").unwrap();
        assert!(table.flush(None).is_err());
        let err = table.close(id).unwrap_err();
        assert!(matches!(err, StdioError::Io(_)));
        assert!(table.is_empty());
        assert_eq!(bad.contents(), b"a");
    }

    #[test]
    fn unknown_id_is_bad_stream() {
        let (mut table, _, _) = mem_table();
        let ghost = StreamId::from_raw(999);
        assert!(matches!(table.get_mut(ghost).unwrap_err(), StdioError::BadStream));
        assert!(matches!(table.close(ghost).unwrap_err(), StdioError::BadStream));
        assert!(matches!(table.flush(Some(ghost)).unwrap_err(), StdioError::BadStream));
    }

    #[test]
    fn close_pads_bits_and_removes() {
        let mut table = StreamTable::new();
        let handle = MemoryHandle::new();
        let id = table.insert(Stream::from_handle(handle.clone(), "bits", "wb").unwrap());
        table.get_mut(id).unwrap().put_bits(0b101, 3).unwrap();
        table.close(id).unwrap();
        assert!(!table.contains(id));
        assert_eq!(handle.contents(), vec![0b1010_0000]);
    }
}
