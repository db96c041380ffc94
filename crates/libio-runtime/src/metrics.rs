//! Atomic counters for stream observability.
//!
//! Counters use relaxed ordering and are not synchronization points.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global stream operation counters.
pub struct StdioMetrics {
    /// Streams successfully opened.
    pub opens: AtomicU64,
    /// Streams closed (successfully or not).
    pub closes: AtomicU64,
    /// Bytes handed to callers by byte-oriented reads.
    pub bytes_read: AtomicU64,
    /// Bytes accepted from callers by byte-oriented writes.
    pub bytes_written: AtomicU64,
    /// Read-buffer refills from the raw handle.
    pub refills: AtomicU64,
    /// Write-buffer flushes that reached the raw handle.
    pub flushes: AtomicU64,
    /// Bits delivered by the bit cursor.
    pub bits_read: AtomicU64,
    /// Bits accepted by the bit cursor.
    pub bits_written: AtomicU64,
    /// Partial bytes zero-padded and committed at a mode switch or close.
    pub partial_pads: AtomicU64,
    /// Partially consumed bytes dropped at a mode switch.
    pub partial_discards: AtomicU64,
    /// Times a stream's error flag was raised.
    pub errors: AtomicU64,
}

impl StdioMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            opens: AtomicU64::new(0),
            closes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            refills: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            bits_read: AtomicU64::new(0),
            bits_written: AtomicU64::new(0),
            partial_pads: AtomicU64::new(0),
            partial_discards: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opens: Self::get(&self.opens),
            closes: Self::get(&self.closes),
            bytes_read: Self::get(&self.bytes_read),
            bytes_written: Self::get(&self.bytes_written),
            refills: Self::get(&self.refills),
            flushes: Self::get(&self.flushes),
            bits_read: Self::get(&self.bits_read),
            bits_written: Self::get(&self.bits_written),
            partial_pads: Self::get(&self.partial_pads),
            partial_discards: Self::get(&self.partial_discards),
            errors: Self::get(&self.errors),
        }
    }
}

impl Default for StdioMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all stream counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub opens: u64,
    pub closes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub refills: u64,
    pub flushes: u64,
    pub bits_read: u64,
    pub bits_written: u64,
    pub partial_pads: u64,
    pub partial_discards: u64,
    pub errors: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "libio metrics:")?;
        writeln!(f, "  streams:   opened={} closed={}", self.opens, self.closes)?;
        writeln!(
            f,
            "  bytes:     read={} written={}",
            self.bytes_read, self.bytes_written
        )?;
        writeln!(
            f,
            "  buffer:    refills={} flushes={}",
            self.refills, self.flushes
        )?;
        writeln!(
            f,
            "  bits:      read={} written={} padded={} discarded={}",
            self.bits_read, self.bits_written, self.partial_pads, self.partial_discards
        )?;
        write!(f, "  errors:    {}", self.errors)
    }
}

/// Global metrics instance.
static GLOBAL_METRICS: StdioMetrics = StdioMetrics::new();

/// Access the global metrics.
pub fn global_metrics() -> &'static StdioMetrics {
    &GLOBAL_METRICS
}
