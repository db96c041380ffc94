//! # libio-core
//!
//! Safe Rust replacement for buffered stdio, extended with bit-granularity
//! reads and writes and direct access to file metadata.
//!
//! No `unsafe` code is permitted at the crate level. The C boundary lives
//! in `libio-abi`.

#![deny(unsafe_code)]

pub mod errno;
pub mod meta;
pub mod stdio;
