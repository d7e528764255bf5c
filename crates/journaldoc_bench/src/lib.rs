//! Benchmark utilities.

#![warn(missing_docs)]

use journaldoc_core::{DocMap, DocumentConfig, JournaledDocument};
use tempfile::TempDir;

/// Journal type used by benchmark documents.
pub const BENCH_JOURNAL_TYPE: &str = "bench";

/// Generate patterned entry data of the specified size.
pub fn entry_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| b'a' + (i % 26) as u8).collect()
}

/// Open an empty document in `temp_dir` with the given journal buffer size.
pub fn open_document(temp_dir: &TempDir, buffer_size: usize) -> JournaledDocument {
    let config = DocumentConfig::new(BENCH_JOURNAL_TYPE, 1).buffer_size(buffer_size);
    JournaledDocument::open(temp_dir.path().join("doc"), config, &DocMap::new())
        .expect("Failed to open benchmark document")
}
