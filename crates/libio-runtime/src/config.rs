//! Runtime configuration.
//!
//! Read from the environment on first use and cached for the life of
//! the process:
//! - `LIBIO_BUFSIZ`: capacity of the byte buffer given to newly opened
//!   streams (default 8192, clamped to `[1, MAX_BUFSIZ]`).
//! - `LIBIO_STDOUT_BUFFERING`: buffering policy of the standard output
//!   stream, one of `line` (default), `full`, `none`.
//!
//! Unparseable values fall back to the default rather than failing.

use std::sync::OnceLock;

/// Default byte-buffer capacity (POSIX `BUFSIZ`).
pub const DEFAULT_BUFSIZ: usize = 8192;

/// Largest accepted `LIBIO_BUFSIZ`.
pub const MAX_BUFSIZ: usize = 1 << 20;

/// When buffered output is pushed to the underlying handle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferPolicy {
    /// Flush when the buffer is full.
    Full,
    /// Flush on newline or when the buffer is full.
    #[default]
    Line,
    /// Every write goes straight to the handle.
    Unbuffered,
}

impl BufferPolicy {
    /// Parse from string (case-insensitive). Unknown input yields `None`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "fully" | "block" | "iofbf" => Some(Self::Full),
            "line" | "iolbf" => Some(Self::Line),
            "none" | "unbuffered" | "off" | "ionbf" => Some(Self::Unbuffered),
            _ => None,
        }
    }
}

/// Snapshot of every tunable the runtime reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Capacity of the byte buffer for newly opened streams.
    pub buffer_size: usize,
    /// Buffering policy of the standard output stream.
    pub stdout_policy: BufferPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFSIZ,
            stdout_policy: BufferPolicy::Line,
        }
    }
}

impl RuntimeConfig {
    /// Build a configuration from an arbitrary key lookup.
    ///
    /// `lookup` receives variable names and returns their value if set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let buffer_size = lookup("LIBIO_BUFSIZ")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(|n| n.clamp(1, MAX_BUFSIZ))
            .unwrap_or(defaults.buffer_size);
        let stdout_policy = lookup("LIBIO_STDOUT_BUFFERING")
            .and_then(|v| BufferPolicy::from_str_loose(&v))
            .unwrap_or(defaults.stdout_policy);
        Self {
            buffer_size,
            stdout_policy,
        }
    }

    /// Build a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

static GLOBAL_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Get the process configuration (reads env vars on first call, caches thereafter).
#[must_use]
pub fn runtime_config() -> RuntimeConfig {
    *GLOBAL_CONFIG.get_or_init(RuntimeConfig::from_env)
}
