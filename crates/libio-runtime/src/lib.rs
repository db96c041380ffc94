//! Process-wide runtime state for libio.
//!
//! This crate holds the small amount of state that is shared by every
//! stream in the process:
//! - **Configuration** (`config`): buffer sizing and standard-stream
//!   buffering, read once from the environment
//! - **Metrics** (`metrics`): relaxed atomic counters for observability

#![deny(unsafe_code)]

pub mod config;
pub mod metrics;

pub use config::{BufferPolicy, RuntimeConfig, runtime_config};
pub use metrics::{MetricsSnapshot, StdioMetrics, global_metrics};
