//! Test fixtures and document helpers.
//!
//! Provides convenience functions for setting up journaled documents in
//! temporary directories.

use journaldoc_core::{DocMap, DocumentConfig, JournaledDocument, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Journal type used by test documents.
pub const TEST_JOURNAL_TYPE: &str = "testkit";

/// A journaled document in a temporary directory.
pub struct TestDocument {
    /// The document instance.
    pub doc: JournaledDocument,
    base: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestDocument {
    /// Creates an empty document with the default test configuration.
    pub fn new() -> Self {
        Self::with_config(test_config(), &DocMap::new())
    }

    /// Creates a document with `config` holding `initial`.
    pub fn with_config(config: DocumentConfig, initial: &DocMap) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path().join("doc");
        let doc = JournaledDocument::open(&base, config, initial).expect("Failed to open document");
        Self {
            doc,
            base,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the document's base path.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Abandons the document without closing it, as a crash would, and
    /// returns what recovery reads back.
    pub fn crash_and_recover(self) -> Option<Value> {
        let Self {
            doc,
            base,
            _temp_dir: temp_dir,
        } = self;
        std::mem::forget(doc);
        let recovered = JournaledDocument::load_document_contents(&base)
            .expect("Recovery failed")
            .map(Value::Map);
        drop(temp_dir);
        recovered
    }

    /// Closes the document and returns what recovery reads back.
    pub fn close_and_recover(self) -> Option<Value> {
        self.doc.close().expect("Failed to close document");
        JournaledDocument::load_document_contents(&self.base)
            .expect("Recovery failed")
            .map(Value::Map)
    }
}

impl Default for TestDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDocument {
    type Target = JournaledDocument;

    fn deref(&self) -> &Self::Target {
        &self.doc
    }
}

/// Default configuration for test documents.
pub fn test_config() -> DocumentConfig {
    DocumentConfig::new(TEST_JOURNAL_TYPE, 1)
}

/// Converts a JSON object literal into a [`DocMap`].
///
/// # Panics
///
/// Panics if `json` is not an object.
pub fn json_map(json: serde_json::Value) -> DocMap {
    match Value::from(json) {
        Value::Map(map) => map,
        other => panic!("expected a JSON object, found {}", other.type_name()),
    }
}

/// Runs a test with a temporary empty document.
///
/// # Example
///
/// ```rust,ignore
/// use journaldoc_testkit::with_temp_document;
///
/// #[test]
/// fn my_test() {
///     with_temp_document(|doc| {
///         doc.add_command("count+", 1).unwrap();
///     });
/// }
/// ```
pub fn with_temp_document<F, R>(f: F) -> R
where
    F: FnOnce(&JournaledDocument) -> R,
{
    let doc = TestDocument::new();
    f(&doc)
}
