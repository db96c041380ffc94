// All extern "C" exports accept raw pointers from C callers; the pointer
// contracts are those of the matching <stdio.h> function.
#![allow(clippy::missing_safety_doc)]
//! # libio-abi
//!
//! `extern "C"` boundary for libio.
//!
//! Exports the `libio_*` replacements for the `<stdio.h>` stream calls
//! together with the bit-level (`fgetbit`, `fputbits`, ...) and metadata
//! (`fdevid`, `fsize`, `freg`, ...) extensions. Every export delegates to
//! the safe implementation in `libio-core` and converts its `Result` into
//! the C sentinel convention.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> StreamTable -> Stream -> RawHandle
//! ```
//!
//! The first call registers an `atexit` hook that flushes every writable
//! stream at normal process exit.

mod errno_abi;

pub mod stat_abi;
pub mod stdio_abi;

pub use libio_runtime::{MetricsSnapshot, global_metrics};

/// Snapshot of the process-wide stream counters.
pub fn metrics_snapshot() -> MetricsSnapshot {
    global_metrics().snapshot()
}
