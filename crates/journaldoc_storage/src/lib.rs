//! # journaldoc Storage
//!
//! Bounded, crash-durable byte storage for journaldoc.
//!
//! This crate provides the lowest-level storage primitive: a fixed-capacity
//! append buffer over a memory-mapped file. It is an **opaque byte store**
//! and knows nothing about the journal format written into it.
//!
//! ## Design Principles
//!
//! - Writes are all-or-nothing; an overflow leaves the buffer untouched
//! - Clearing overwrites the whole region with a sentinel byte that can never
//!   be misread as journal text
//! - Durability does not depend on orderly shutdown: mapped writes reach the
//!   OS page cache immediately
//!
//! ## Example
//!
//! ```no_run
//! use journaldoc_storage::{MemoryMappedOutputStream, StorageError};
//! use std::path::Path;
//!
//! let mut stream = MemoryMappedOutputStream::open(Path::new("doc.journal"), 64).unwrap();
//! stream.clear().unwrap();
//! match stream.write(&[0u8; 128]) {
//!     Err(StorageError::BufferOverflow { .. }) => { /* snapshot and retry */ }
//!     other => other.unwrap(),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mmap;

pub use error::{StorageError, StorageResult};
pub use mmap::{MemoryMappedOutputStream, SENTINEL};
