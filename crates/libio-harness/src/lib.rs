//! Conformance harness for libio streams.
//!
//! This crate provides:
//! - Property suite: run the stream contract against real temporary files
//! - Structured logging: JSONL records with sequential trace ids
//! - Artifact index: SHA-256 digests of the files a run produced
//! - Report generation: human-readable + machine-readable summaries

#![forbid(unsafe_code)]

pub mod error;
pub mod report;
pub mod structured_log;
pub mod verify;

pub use error::HarnessError;
pub use report::ConformanceReport;
pub use verify::{PropertySuite, VerificationResult, VerificationSummary};
