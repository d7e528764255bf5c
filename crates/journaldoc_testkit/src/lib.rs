//! # journaldoc Testkit
//!
//! Test utilities for journaldoc.
//!
//! This crate provides:
//! - Temporary document fixtures
//! - Property-based generators for keys, paths, values and commands
//! - A crash recovery harness that abandons documents without closing them
//!
//! ## Usage
//!
//! ```rust,ignore
//! use journaldoc_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_document() {
//!     with_temp_document(|doc| {
//!         doc.add_command("a.b", 1).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
