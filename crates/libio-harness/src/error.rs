//! Harness failures.

use std::io;
use std::path::PathBuf;

use libio_core::stdio::StdioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("stream operation failed: {0}")]
    Stream(#[from] StdioError),
    #[error("I/O on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{count} log line(s) failed validation")]
    InvalidLog { count: usize },
    #[error("bad argument: {0}")]
    Usage(String),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }
}
