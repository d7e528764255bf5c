//! # journaldoc Core
//!
//! Crash-safe journaled document store.
//!
//! This crate provides:
//! - A JSON-like [`Value`] model with shared, internally locked containers
//! - A dotted path language that compiles into [`Directive`]s
//! - A redo [`Journal`] with a NUL-delimited JSON wire format
//! - [`JournaledDocument`], which journals every mutation to a memory-mapped
//!   file before applying it and snapshots when the journal fills up
//! - Recovery from the snapshot and journal files after a crash
//!
//! ## Example
//!
//! ```rust,ignore
//! use journaldoc_core::{DocumentConfig, JournaledDocument};
//!
//! let doc = JournaledDocument::open_recovered("state/app", DocumentConfig::new("app", 1))?;
//! doc.add_command("sessions+", 1)?;
//! doc.add_command("history.", "opened")?;
//! doc.close()?;
//!
//! let stored = JournaledDocument::load_document_contents("state/app")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crashtime;
pub mod document;
pub mod error;
pub mod journal;
pub mod path;
pub mod value;

pub use config::{DocumentConfig, DEFAULT_BUFFER_SIZE};
pub use crashtime::CrashtimeJournal;
pub use document::{DocumentFiles, HighWaterMonitor, JournaledDocument};
pub use error::{CoreError, CoreResult};
pub use journal::{Command, Journal, JournalInfo};
pub use path::{escape_key, ContainerKind, Directive, DocumentPath, PathCache};
pub use value::{DocList, DocMap, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
