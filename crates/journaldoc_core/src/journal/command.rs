//! Journal entries.

use crate::error::CoreResult;
use crate::path::PathCache;
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// One recorded mutation: set `value` at `path`.
///
/// A `Null` value deletes whatever the path addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Path string in the document path syntax.
    pub path: String,
    /// Value to apply.
    pub value: Value,
}

impl Command {
    /// Creates a command.
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Creates a command that deletes whatever `path` addresses.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, Value::Null)
    }

    /// Applies this command to `document` and returns the resulting document.
    ///
    /// The value is deep-copied first, so the document never shares
    /// containers with the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is malformed or the mutation is rejected.
    pub fn apply(&self, document: Value, cache: &PathCache) -> CoreResult<Value> {
        cache
            .compile(&self.path)?
            .modify_document(document, self.value.deep_clone())
    }
}

/// Serializes as the single-entry object `{path: value}`.
impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.path, &self.value)?;
        map.end()
    }
}

/// Identifies what a journal records, for compatibility checks on reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalInfo {
    /// Free-form journal type name.
    #[serde(rename = "type")]
    pub journal_type: String,
    /// Format version of the documents this journal mutates.
    pub version: u64,
}

impl JournalInfo {
    /// Creates a journal info tag.
    pub fn new(journal_type: impl Into<String>, version: u64) -> Self {
        Self {
            journal_type: journal_type.into(),
            version,
        }
    }
}
