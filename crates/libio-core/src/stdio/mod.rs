//! Buffered stream I/O.
//!
//! Reference: POSIX.1-2024 `<stdio.h>`, ISO C11 7.21
//!
//! Layering, bottom to top: a [`RawHandle`] moves bytes to and from the
//! OS, a [`ByteBuffer`] batches them, a [`BitCursor`] splits bytes into
//! MSB-first bits, and [`Stream`] ties the three together with the
//! `eof` / `error` indicators. [`StreamTable`] names open streams.

pub mod bits;
pub mod buffer;
pub mod copy;
pub mod error;
pub mod file;
pub mod handle;
pub mod stream;
pub mod table;

pub use bits::{BitCursor, PendingBits};
pub use buffer::{BUFSIZ, BufMode, ByteBuffer, IOFBF, IOLBF, IONBF, WriteResult};
pub use copy::copy_file;
pub use error::StdioError;
pub use file::{
    Access, Disposition, OpenMode, Position, SEEK_CUR, SEEK_END, SEEK_SET, SeekOrigin,
};
pub use handle::{FileHandle, MemoryHandle, RawHandle, StandardStream};
pub use stream::{MAX_BITS, Stream, StreamFlags};
pub use table::{ExitFlush, StreamId, StreamTable, exit_flush_guard, flush_all, global_table};

/// End-of-file / failure sentinel returned by the character-level C entry
/// points.
pub const EOF: i32 = -1;
