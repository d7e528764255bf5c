//! CLI command implementations.

pub mod apply;
pub mod dump_journal;
pub mod inspect;
pub mod recover;
