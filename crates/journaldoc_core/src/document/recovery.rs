//! Rebuilding a document from its files after a restart or crash.
//!
//! # Protocol
//!
//! 1. If `P.snapshot.new` exists it holds the newest complete state: a
//!    snapshot was interrupted after the new file was synced but before the
//!    rename. Load it and apply the crash-time journal. The runtime journal is
//!    not applied; its commands are already folded into that snapshot. If the
//!    file cannot be decoded, fall through.
//! 2. Load `P.snapshot`. If it is absent there is no document. If it is
//!    corrupt, recovery fails.
//! 3. Apply `P.journal`.
//! 4. Apply `P.journal.crashtime`.
//!
//! Missing or corrupt journals are logged and skipped.
//!
//! Opening a document commits a snapshot of the recovered state and then
//! deletes the crash-time journal, so its commands are applied once.

use crate::document::files::DocumentFiles;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, JournalInfo};
use crate::path::PathCache;
use crate::value::{DocMap, Value};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Recovers the document stored under `files`.
///
/// With `expected` set, journals written for a different type or version
/// are skipped.
///
/// # Errors
///
/// Returns [`CoreError::SnapshotCorruption`] if the primary snapshot is
/// needed and cannot be decoded, or an I/O error if it cannot be read.
pub fn recover(
    files: &DocumentFiles,
    expected: Option<&JournalInfo>,
    cache: &PathCache,
) -> CoreResult<Option<DocMap>> {
    if files.new_snapshot().exists() {
        match read_snapshot(files.new_snapshot()) {
            Ok(document) => {
                debug!(path = %files.new_snapshot().display(), "recovering from interrupted snapshot");
                let document = apply_journal_file(files.crashtime_journal(), document, expected, cache);
                return Ok(Some(document));
            }
            Err(e) => warn!(
                path = %files.new_snapshot().display(),
                error = %e,
                "ignoring unreadable interrupted snapshot"
            ),
        }
    }

    if !files.snapshot().exists() {
        debug!(base = %files.base().display(), "no snapshot found");
        return Ok(None);
    }

    let document = read_snapshot(files.snapshot())?;
    debug!(path = %files.snapshot().display(), entries = document.len(), "loaded snapshot");

    let document = apply_journal_file(files.journal(), document, expected, cache);
    let document = apply_journal_file(files.crashtime_journal(), document, expected, cache);
    Ok(Some(document))
}

/// Reads and decodes a snapshot file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or
/// [`CoreError::SnapshotCorruption`] if it is not a JSON object.
pub fn read_snapshot(path: &Path) -> CoreResult<DocMap> {
    let bytes = fs::read(path)?;
    let value = Value::from_json_slice(&bytes).map_err(|e| {
        CoreError::snapshot_corruption(format!("{}: {e}", path.display()))
    })?;
    match value {
        Value::Map(map) => Ok(map),
        other => Err(CoreError::snapshot_corruption(format!(
            "{}: expected an object, found {}",
            path.display(),
            other.type_name()
        ))),
    }
}

/// Reads and decodes a journal file.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns an I/O error or [`CoreError::JournalCorruption`].
pub fn read_journal(path: &Path) -> CoreResult<Option<Journal>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Journal::deserialize(&bytes).map(Some)
}

fn apply_journal_file(
    path: &Path,
    document: DocMap,
    expected: Option<&JournalInfo>,
    cache: &PathCache,
) -> DocMap {
    let journal = match read_journal(path) {
        Ok(Some(journal)) => journal,
        Ok(None) => return document,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable journal");
            return document;
        }
    };

    if let Some(expected) = expected {
        if !journal.is_compatible(expected) {
            warn!(
                path = %path.display(),
                found_type = %journal.info().journal_type,
                found_version = journal.info().version,
                expected_type = %expected.journal_type,
                expected_version = expected.version,
                "skipping incompatible journal"
            );
            return document;
        }
    }

    debug!(path = %path.display(), commands = journal.len(), "replaying journal");
    let root = document.clone();
    match journal.apply_to(Value::Map(document), cache) {
        Value::Map(map) => map,
        other => {
            warn!(found = other.type_name(), "journal replaced the document with a non-map");
            root
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{serialize_command, serialize_info, Command};
    use journaldoc_storage::SENTINEL;
    use serde_json::json;
    use tempfile::tempdir;

    fn info() -> JournalInfo {
        JournalInfo::new("state", 1)
    }

    fn write_journal(path: &Path, info: &JournalInfo, commands: &[Command]) {
        let mut bytes = serialize_info(info).unwrap();
        for command in commands {
            bytes.extend(serialize_command(command).unwrap());
        }
        bytes.extend([SENTINEL; 32]);
        fs::write(path, bytes).unwrap();
    }

    fn map(value: serde_json::Value) -> DocMap {
        match Value::from(value) {
            Value::Map(map) => map,
            other => panic!("not a map: {other:?}"),
        }
    }

    fn setup() -> (tempfile::TempDir, DocumentFiles) {
        let dir = tempdir().unwrap();
        let files = DocumentFiles::new(&dir.path().join("doc"));
        (dir, files)
    }

    #[test]
    fn nothing_on_disk() {
        let (_dir, files) = setup();
        assert!(recover(&files, None, &PathCache::new()).unwrap().is_none());
    }

    #[test]
    fn snapshot_plus_journals() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"a":1}"#).unwrap();
        write_journal(files.journal(), &info(), &[Command::new("b", 2)]);
        write_journal(files.crashtime_journal(), &info(), &[Command::new("a+", 10)]);

        let document = recover(&files, Some(&info()), &PathCache::new())
            .unwrap()
            .unwrap();
        assert_eq!(document, map(json!({"a": 11, "b": 2})));
    }

    #[test]
    fn new_snapshot_takes_precedence() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"old":true}"#).unwrap();
        fs::write(files.new_snapshot(), br#"{"count":5}"#).unwrap();
        write_journal(files.journal(), &info(), &[Command::new("count+", 1)]);
        write_journal(files.crashtime_journal(), &info(), &[Command::new("flag", true)]);

        let document = recover(&files, None, &PathCache::new()).unwrap().unwrap();
        assert_eq!(document, map(json!({"count": 5, "flag": true})));
    }

    #[test]
    fn corrupt_new_snapshot_falls_through() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"a":1}"#).unwrap();
        fs::write(files.new_snapshot(), b"{\"a\":").unwrap();
        write_journal(files.journal(), &info(), &[Command::new("a+", 1)]);

        let document = recover(&files, None, &PathCache::new()).unwrap().unwrap();
        assert_eq!(document, map(json!({"a": 2})));
    }

    #[test]
    fn corrupt_primary_snapshot_is_fatal() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), b"not json").unwrap();
        assert!(matches!(
            recover(&files, None, &PathCache::new()),
            Err(CoreError::SnapshotCorruption { .. })
        ));
    }

    #[test]
    fn non_object_snapshot_is_corrupt() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), b"[1,2]").unwrap();
        assert!(matches!(
            read_snapshot(files.snapshot()),
            Err(CoreError::SnapshotCorruption { .. })
        ));
    }

    #[test]
    fn corrupt_journal_is_skipped() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"a":1}"#).unwrap();
        fs::write(files.journal(), b"garbage\0more").unwrap();
        write_journal(files.crashtime_journal(), &info(), &[Command::new("b", 1)]);

        let document = recover(&files, None, &PathCache::new()).unwrap().unwrap();
        assert_eq!(document, map(json!({"a": 1, "b": 1})));
    }

    #[test]
    fn incompatible_journal_is_skipped() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"a":1}"#).unwrap();
        write_journal(
            files.journal(),
            &JournalInfo::new("state", 2),
            &[Command::new("a", 99)],
        );

        let strict = recover(&files, Some(&info()), &PathCache::new())
            .unwrap()
            .unwrap();
        assert_eq!(strict, map(json!({"a": 1})));

        let lenient = recover(&files, None, &PathCache::new()).unwrap().unwrap();
        assert_eq!(lenient, map(json!({"a": 99})));
    }

    #[test]
    fn sentinel_only_journal_is_skipped() {
        let (_dir, files) = setup();
        fs::write(files.snapshot(), br#"{"a":1}"#).unwrap();
        fs::write(files.journal(), [SENTINEL; 128]).unwrap();

        let document = recover(&files, None, &PathCache::new()).unwrap().unwrap();
        assert_eq!(document, map(json!({"a": 1})));
    }
}
