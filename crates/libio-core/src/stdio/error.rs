//! Stream error taxonomy.

use std::io;

use thiserror::Error;

use crate::errno;

/// Failure of a stream operation.
///
/// Every operation that returns one of these also leaves the stream's
/// `eof` / `error` flags in the state the failure implies.
#[derive(Debug, Error)]
pub enum StdioError {
    /// The path could not be opened in the requested mode.
    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The mode string is not one of the canonical forms.
    #[error("invalid open mode {0:?}")]
    InvalidMode(String),
    /// The underlying read, write or seek failed.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    /// No more bytes or bits are available.
    #[error("end of data")]
    EndOfData,
    /// Bad seek origin or offset, oversized bit count, and similar.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The stream was not opened for this direction.
    #[error("stream is not {0}")]
    NotPermitted(&'static str),
    /// No stream is registered under the given id.
    #[error("unknown stream")]
    BadStream,
    /// The filesystem status query failed.
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(#[source] io::Error),
}

impl StdioError {
    /// POSIX errno equivalent.
    pub fn errno(&self) -> i32 {
        match self {
            StdioError::Open { source, .. } => errno::from_io_error(source),
            StdioError::InvalidMode(_) | StdioError::InvalidArgument(_) => errno::EINVAL,
            StdioError::Io(err) | StdioError::MetadataUnavailable(err) => {
                errno::from_io_error(err)
            }
            StdioError::EndOfData => 0,
            StdioError::NotPermitted(_) | StdioError::BadStream => errno::EBADF,
        }
    }

    /// True for the end-of-data condition.
    pub fn is_eof(&self) -> bool {
        matches!(self, StdioError::EndOfData)
    }
}
