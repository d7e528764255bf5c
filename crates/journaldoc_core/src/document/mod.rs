//! Crash-safe journaled document.
//!
//! A [`JournaledDocument`] keeps a map-rooted document in memory and makes
//! every mutation durable before applying it:
//!
//! 1. the command is appended to a memory-mapped journal file;
//! 2. it is applied to the live document;
//! 3. it is remembered in the in-memory journal.
//!
//! When the journal buffer fills up, the whole document is written to a new
//! snapshot and the journal starts over. After a crash,
//! [`JournaledDocument::load_document_contents`] rebuilds the document from
//! the last snapshot plus the journal.
//!
//! # Example
//!
//! ```rust,ignore
//! use journaldoc_core::{DocumentConfig, JournaledDocument};
//!
//! let config = DocumentConfig::new("settings", 1);
//! let doc = JournaledDocument::open_recovered("data/settings", config)?;
//!
//! doc.add_command("window.width", 1280)?;
//! doc.add_command("recent.", "notes.txt")?;
//! doc.add_command("launches+", 1)?;
//!
//! doc.close()?;
//! ```

pub mod files;
pub mod monitor;
pub mod recovery;

pub use files::DocumentFiles;
pub use monitor::HighWaterMonitor;

use crate::config::DocumentConfig;
use crate::error::{CoreError, CoreResult};
use crate::journal::{serialize_command, serialize_info, Command, Journal, JournalInfo};
use crate::path::PathCache;
use crate::value::{DocMap, Value};
use journaldoc_storage::MemoryMappedOutputStream;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, error, warn};

/// A map-rooted document whose mutations are journaled to disk.
///
/// All mutation and snapshotting is serialized by one mutex. Reads never
/// take it; they see each container through that container's own lock and
/// return detached copies.
pub struct JournaledDocument {
    files: DocumentFiles,
    config: DocumentConfig,
    /// Root of the live document. Replaced only by an empty-path command.
    root: RwLock<DocMap>,
    writer: Mutex<Writer>,
    is_open: AtomicBool,
    /// Bytes used in the mapped journal, readable without the writer lock.
    journal_bytes: AtomicUsize,
}

struct Writer {
    /// `None` once closed.
    stream: Option<MemoryMappedOutputStream>,
    journal: Journal,
}

impl JournaledDocument {
    /// Opens a document at `base` holding a copy of `initial`.
    ///
    /// Any previous files at `base` are superseded: an initial snapshot of
    /// `initial` is written before this returns, after which a leftover
    /// crash-time journal is deleted. Use [`Self::open_recovered`] to
    /// continue from the state on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the journal or
    /// initial snapshot cannot be written.
    pub fn open(
        base: impl AsRef<Path>,
        config: DocumentConfig,
        initial: &DocMap,
    ) -> CoreResult<Self> {
        config.validate()?;
        let files = DocumentFiles::new(base.as_ref());
        files.create_parent_dir()?;
        let stream = MemoryMappedOutputStream::open(files.journal(), config.buffer_size)?;

        let document = Self {
            root: RwLock::new(initial.deep_clone()),
            writer: Mutex::new(Writer {
                stream: Some(stream),
                journal: Journal::new(config.info.clone()),
            }),
            is_open: AtomicBool::new(true),
            journal_bytes: AtomicUsize::new(0),
            files,
            config,
        };
        document.snapshot()?;
        if document.files.remove_crashtime_journal()? {
            debug!(
                path = %document.files.crashtime_journal().display(),
                "retired crash-time journal"
            );
        }

        debug!(
            base = %document.files.base().display(),
            buffer_size = document.config.buffer_size,
            "document opened"
        );
        Ok(document)
    }

    /// Recovers the document at `base` and opens it, starting from an empty
    /// map if nothing is stored there.
    ///
    /// Journals written for a different [`JournalInfo`] than the
    /// configuration's are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if recovery or opening fails.
    pub fn open_recovered(base: impl AsRef<Path>, config: DocumentConfig) -> CoreResult<Self> {
        let files = DocumentFiles::new(base.as_ref());
        let initial = recovery::recover(&files, Some(&config.info), &config.path_cache)?
            .unwrap_or_else(DocMap::new);
        Self::open(base, config, &initial)
    }

    /// Records and applies one command.
    ///
    /// A `Null` value deletes what the path addresses.
    ///
    /// # Errors
    ///
    /// See [`Self::add_command_entry`].
    pub fn add_command(&self, path: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.add_command_entry(Command::new(path, value))
    }

    /// Records and applies one command.
    ///
    /// Malformed paths and values that can never apply are rejected before
    /// anything is journaled. A mutation rejected by the current document
    /// state (adding to a string, indexing past the end of a list) is
    /// journaled and reported; replay rejects it the same way.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DocumentClosed`] after [`Self::close`],
    /// [`CoreError::Storage`] with a buffer overflow if the command does not
    /// fit in an empty journal, or the mutation's own error.
    pub fn add_command_entry(&self, command: Command) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.record(&mut writer, command)
    }

    /// Records and applies commands in order under a single lock.
    ///
    /// Stops at the first failing command; earlier ones stay applied.
    ///
    /// # Errors
    ///
    /// See [`Self::add_command_entry`].
    pub fn add_commands<I>(&self, commands: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = Command>,
    {
        let mut writer = self.writer.lock();
        for command in commands {
            self.record(&mut writer, command)?;
        }
        Ok(())
    }

    /// Writes the whole document to a new snapshot and empties the journal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DocumentClosed`] after [`Self::close`] or an
    /// error if the snapshot cannot be written. A failure after the new
    /// snapshot reached disk also closes the document.
    pub fn snapshot(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.snapshot_locked(&mut writer)
    }

    /// Takes a snapshot if the journal has grown past the high water mark.
    ///
    /// Returns whether a snapshot was taken. A closed document never takes
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn snapshot_if_high_water(&self) -> CoreResult<bool> {
        if !self.is_over_high_water() {
            return Ok(false);
        }
        let mut writer = self.writer.lock();
        if writer.stream.is_none() || !self.is_over_high_water() {
            return Ok(false);
        }
        debug!(
            journal_bytes = self.journal_bytes(),
            high_water = self.config.high_water,
            "journal above high water mark"
        );
        self.snapshot_locked(&mut writer)?;
        Ok(true)
    }

    /// Takes a final snapshot and releases the journal mapping.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final snapshot or unmapping fails. The
    /// document is closed either way.
    pub fn close(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        if writer.stream.is_none() {
            return Ok(());
        }

        let result = self.snapshot_locked(&mut writer);
        self.is_open.store(false, Ordering::Release);
        if let Some(stream) = writer.stream.take() {
            stream.close()?;
        }

        debug!(base = %self.files.base().display(), "document closed");
        result
    }

    /// Returns true until [`Self::close`] is called or a snapshot fails
    /// part-way.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    // ---- Read view ----

    /// Returns a copy of the value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.root().get(key).map(|value| value.deep_clone())
    }

    /// Returns true if a top-level key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.root().contains_key(key)
    }

    /// Returns copies of the top-level entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.root()
            .entries()
            .into_iter()
            .map(|(key, value)| (key, value.deep_clone()))
            .collect()
    }

    /// Returns the top-level keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.root().keys()
    }

    /// Returns copies of the top-level values in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.root()
            .values()
            .iter()
            .map(Value::deep_clone)
            .collect()
    }

    /// Calls `f` for every top-level entry of a point-in-time copy.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Value),
    {
        for (key, value) in self.entries() {
            f(&key, &value);
        }
    }

    /// Returns the number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root().len()
    }

    /// Returns true if the document has no top-level entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root().is_empty()
    }

    /// Returns a detached copy of the whole document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(self.root().deep_clone())
    }

    // ---- Introspection ----

    /// Returns the number of commands recorded since the last snapshot.
    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.writer.lock().journal.len()
    }

    /// Returns the commands recorded since the last snapshot.
    #[must_use]
    pub fn journal_commands(&self) -> Vec<Command> {
        self.writer.lock().journal.commands().to_vec()
    }

    /// Returns the bytes used in the mapped journal, header included.
    #[must_use]
    pub fn journal_bytes(&self) -> usize {
        self.journal_bytes.load(Ordering::Acquire)
    }

    /// Returns the document's file paths.
    #[must_use]
    pub fn files(&self) -> &DocumentFiles {
        &self.files
    }

    /// Returns the configuration the document was opened with.
    #[must_use]
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    // ---- Static access to stored documents ----

    /// Returns true if a document is stored at `base`.
    #[must_use]
    pub fn document_exists(base: impl AsRef<Path>) -> bool {
        DocumentFiles::new(base.as_ref()).document_exists()
    }

    /// Recovers the document stored at `base`, replaying every journal.
    ///
    /// Returns `Ok(None)` if no document is stored there.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotCorruption`] if the snapshot is corrupt.
    pub fn load_document_contents(base: impl AsRef<Path>) -> CoreResult<Option<DocMap>> {
        recovery::recover(&DocumentFiles::new(base.as_ref()), None, &PathCache::new())
    }

    /// Recovers the document stored at `base`, replaying only journals
    /// written for `info`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotCorruption`] if the snapshot is corrupt.
    pub fn load_compatible_document_contents(
        base: impl AsRef<Path>,
        info: &JournalInfo,
    ) -> CoreResult<Option<DocMap>> {
        recovery::recover(
            &DocumentFiles::new(base.as_ref()),
            Some(info),
            &PathCache::new(),
        )
    }

    // ---- Internals ----

    fn root(&self) -> DocMap {
        self.root.read().clone()
    }

    fn is_over_high_water(&self) -> bool {
        self.journal_bytes() > self.config.high_water
    }

    fn record(&self, writer: &mut Writer, command: Command) -> CoreResult<()> {
        let stream = writer.stream.as_mut().ok_or(CoreError::DocumentClosed)?;
        let path = self.config.path_cache.compile(&command.path)?;
        path.validate_value(&command.value)?;

        let entry = serialize_command(&command)?;
        match stream.write(&entry) {
            Ok(()) => {}
            Err(e) if e.is_overflow() => {
                debug!(entry_bytes = entry.len(), "journal buffer full, taking snapshot");
                self.snapshot_locked(writer)?;
                writer
                    .stream
                    .as_mut()
                    .ok_or(CoreError::DocumentClosed)?
                    .write(&entry)?;
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(stream) = &writer.stream {
            self.journal_bytes.store(stream.position(), Ordering::Release);
        }

        let root = self.root();
        let applied = path.modify_document(Value::Map(root.clone()), command.value.deep_clone());
        writer.journal.add_command(command);

        match applied? {
            Value::Map(map) => {
                if !map.ptr_eq(&root) {
                    *self.root.write() = map;
                }
                Ok(())
            }
            other => Err(CoreError::type_mismatch(format!(
                "document root must be a map, found {}",
                other.type_name()
            ))),
        }
    }

    /// Once `P.snapshot.new` is on disk, recovery prefers it and skips the
    /// runtime journal, so any later failure closes the document: commands
    /// journaled after it would be lost.
    fn snapshot_locked(&self, writer: &mut Writer) -> CoreResult<()> {
        if writer.stream.is_none() {
            return Err(CoreError::DocumentClosed);
        }
        let bytes = serde_json::to_vec(&self.root())?;
        self.files.write_new_snapshot(&bytes)?;

        let dropped = writer.journal.len();
        if let Err(e) = self.reset_journal(writer) {
            error!(
                base = %self.files.base().display(),
                error = %e,
                "snapshot failed after writing new snapshot, closing document"
            );
            self.is_open.store(false, Ordering::Release);
            writer.stream = None;
            return Err(e);
        }
        debug!(
            path = %self.files.snapshot().display(),
            bytes = bytes.len(),
            commands = dropped,
            "snapshot written"
        );
        Ok(())
    }

    fn reset_journal(&self, writer: &mut Writer) -> CoreResult<()> {
        let stream = writer.stream.as_mut().ok_or(CoreError::DocumentClosed)?;
        writer.journal.clear();
        stream.clear()?;
        stream.write(&serialize_info(&self.config.info)?)?;
        stream.flush()?;
        self.journal_bytes.store(stream.position(), Ordering::Release);
        self.files.commit_new_snapshot()
    }
}

impl Drop for JournaledDocument {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!(base = %self.files.base().display(), error = %e, "failed to close document");
            }
        }
    }
}

impl std::fmt::Debug for JournaledDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournaledDocument")
            .field("base", &self.files.base())
            .field("is_open", &self.is_open())
            .field("journal_bytes", &self.journal_bytes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crashtime::CrashtimeJournal;
    use journaldoc_storage::StorageError;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let base = dir.path().join("doc");
        (dir, base)
    }

    fn config() -> DocumentConfig {
        DocumentConfig::new("state", 1)
    }

    fn map(value: serde_json::Value) -> DocMap {
        match Value::from(value) {
            Value::Map(map) => map,
            other => panic!("not a map: {other:?}"),
        }
    }

    fn reload(base: &Path) -> Value {
        Value::Map(
            JournaledDocument::load_document_contents(base)
                .unwrap()
                .unwrap(),
        )
    }

    #[test]
    fn open_writes_initial_snapshot() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &map(json!({"a": 1}))).unwrap();

        assert!(doc.files().snapshot().exists());
        assert!(doc.files().journal().exists());
        assert!(!doc.files().new_snapshot().exists());
        assert!(JournaledDocument::document_exists(&base));
        assert_eq!(
            fs::metadata(doc.files().journal()).unwrap().len(),
            config().buffer_size as u64
        );
        assert_eq!(doc.journal_len(), 0);
        assert_eq!(reload(&base), Value::from(json!({"a": 1})));
    }

    #[test]
    fn initial_map_is_copied() {
        let (_dir, base) = setup();
        let initial = map(json!({"list": [1]}));
        let doc = JournaledDocument::open(&base, config(), &initial).unwrap();

        initial.insert("extra", true);
        initial.get("list").unwrap().as_list().unwrap().push(2);

        assert_eq!(doc.to_value(), Value::from(json!({"list": [1]})));
    }

    #[test]
    fn round_trip_through_close() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("user.name", "ada").unwrap();
        doc.add_command("user.tags.", "admin").unwrap();
        doc.add_command("user.tags.", "ops").unwrap();
        doc.add_command("stats.logins+", 3).unwrap();
        doc.add_command("stats.logins+", 1).unwrap();
        doc.add_command("user.tags.0", Value::Null).unwrap();

        let expected = doc.to_value();
        doc.close().unwrap();

        assert_eq!(
            expected,
            Value::from(json!({
                "user": {"name": "ada", "tags": ["ops"]},
                "stats": {"logins": 4}
            }))
        );
        assert_eq!(reload(&base), expected);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("a", 1).unwrap();
        doc.add_command("b.", "x").unwrap();

        doc.snapshot().unwrap();
        let first = fs::read(doc.files().snapshot()).unwrap();
        let journal_after_first = doc.journal_bytes();
        doc.snapshot().unwrap();
        let second = fs::read(doc.files().snapshot()).unwrap();

        assert_eq!(first, second);
        assert_eq!(doc.journal_len(), 0);
        assert_eq!(doc.journal_bytes(), journal_after_first);
        assert_eq!(reload(&base), doc.to_value());
    }

    #[test]
    fn overflow_snapshots_once_and_retries() {
        let (_dir, base) = setup();
        let config = config().buffer_size(256).high_water(usize::MAX);
        let doc = JournaledDocument::open(&base, config, &DocMap::new()).unwrap();

        let mut previous_len = 0;
        let mut snapshots = 0;
        for _ in 0..100 {
            doc.add_command("counter+", 1).unwrap();
            let len = doc.journal_len();
            if len <= previous_len {
                assert_eq!(len, 1);
                snapshots += 1;
            }
            previous_len = len;
        }

        assert!(snapshots > 0);
        assert_eq!(doc.get("counter"), Some(Value::Integer(100)));

        std::mem::forget(doc);
        assert_eq!(reload(&base), Value::from(json!({"counter": 100})));
    }

    #[test]
    fn command_larger_than_buffer_fails() {
        let (_dir, base) = setup();
        let doc =
            JournaledDocument::open(&base, config().buffer_size(128), &DocMap::new()).unwrap();

        let err = doc.add_command("big", "x".repeat(500)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::BufferOverflow { .. })
        ));
        assert!(!doc.contains_key("big"));

        doc.add_command("small", 1).unwrap();
        assert_eq!(doc.get("small"), Some(Value::Integer(1)));
    }

    #[test]
    fn crash_recovers_journaled_commands() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &map(json!({"a": 1}))).unwrap();
        doc.add_command("a+", 1).unwrap();
        doc.add_command("b.", "x").unwrap();
        doc.add_command("c.d", true).unwrap();
        let expected = doc.to_value();

        std::mem::forget(doc);

        assert_eq!(reload(&base), expected);
    }

    #[test]
    fn reopen_continues_from_disk() {
        let (_dir, base) = setup();
        {
            let doc = JournaledDocument::open_recovered(&base, config()).unwrap();
            assert!(doc.is_empty());
            doc.add_command("runs+", 1).unwrap();
        }
        let doc = JournaledDocument::open_recovered(&base, config()).unwrap();
        doc.add_command("runs+", 1).unwrap();
        assert_eq!(doc.get("runs"), Some(Value::Integer(2)));
    }

    #[test]
    fn invalid_commands_are_not_journaled() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();

        assert!(matches!(
            doc.add_command("a..b", 1),
            Err(CoreError::InvalidPath { .. })
        ));
        assert!(matches!(
            doc.add_command("n+", "text"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            doc.add_command("", 5),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert_eq!(doc.journal_len(), 0);
    }

    #[test]
    fn rejected_mutation_replays_identically() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("name", "x").unwrap();
        assert!(doc.add_command("name+", 1).is_err());
        doc.add_command("ok", true).unwrap();
        let expected = doc.to_value();

        std::mem::forget(doc);
        assert_eq!(reload(&base), expected);
    }

    #[test]
    fn empty_path_replaces_document() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &map(json!({"old": 1}))).unwrap();
        doc.add_command("", Value::from(json!({"fresh": true}))).unwrap();
        doc.add_command("more", 2).unwrap();

        assert_eq!(doc.keys(), vec!["fresh".to_string(), "more".to_string()]);
        doc.close().unwrap();
        assert_eq!(reload(&base), Value::from(json!({"fresh": true, "more": 2})));
    }

    #[test]
    fn reads_return_detached_copies() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("list.", 1).unwrap();

        doc.get("list").unwrap().as_list().unwrap().push(2);
        for (_, value) in doc.entries() {
            value.as_list().unwrap().push(3);
        }

        assert_eq!(doc.get("list"), Some(Value::from(json!([1]))));
        assert_eq!(doc.values(), vec![Value::from(json!([1]))]);
        let mut seen = Vec::new();
        doc.for_each(|key, _| seen.push(key.to_string()));
        assert_eq!(seen, vec!["list".to_string()]);
    }

    #[test]
    fn use_after_close() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("a", 1).unwrap();
        doc.close().unwrap();

        assert!(!doc.is_open());
        assert!(matches!(doc.add_command("b", 2), Err(CoreError::DocumentClosed)));
        assert!(matches!(doc.snapshot(), Err(CoreError::DocumentClosed)));
        assert!(!doc.snapshot_if_high_water().unwrap());
        doc.close().unwrap();

        assert_eq!(doc.get("a"), Some(Value::Integer(1)));
        assert_eq!(reload(&base), Value::from(json!({"a": 1})));
    }

    #[test]
    fn high_water_snapshot() {
        let (_dir, base) = setup();
        let config = config().buffer_size(4096).high_water(200);
        let doc = JournaledDocument::open(&base, config, &DocMap::new()).unwrap();

        assert!(!doc.snapshot_if_high_water().unwrap());
        while doc.journal_bytes() <= 200 {
            doc.add_command("items.", "entry").unwrap();
        }

        assert!(doc.snapshot_if_high_water().unwrap());
        assert_eq!(doc.journal_len(), 0);
        assert!(!doc.snapshot_if_high_water().unwrap());
    }

    #[test]
    fn add_commands_batch() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_commands(vec![
            Command::new("a", 1),
            Command::new("b", 2),
            Command::delete("a"),
        ])
        .unwrap();

        assert_eq!(doc.to_value(), Value::from(json!({"b": 2})));
        assert_eq!(doc.journal_commands().len(), 3);
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let (_dir, base) = setup();
        let doc = Arc::new(
            JournaledDocument::open(&base, config().buffer_size(1024), &DocMap::new()).unwrap(),
        );

        let writer = {
            let doc = Arc::clone(&doc);
            std::thread::spawn(move || {
                for i in 0..500 {
                    doc.add_command("log.", i).unwrap();
                    doc.add_command("count+", 1).unwrap();
                }
            })
        };
        let reader = {
            let doc = Arc::clone(&doc);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    if let Some(Value::List(log)) = doc.get("log") {
                        for (index, entry) in log.to_vec().into_iter().enumerate() {
                            assert_eq!(entry.as_i64(), Some(index as i64));
                        }
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(doc.get("count"), Some(Value::Integer(500)));
        doc.close().unwrap();
        assert_eq!(reload(&base), doc.to_value());
    }

    #[test]
    fn reopen_applies_crashtime_journal_once() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &map(json!({"count": 1}))).unwrap();
        std::mem::forget(doc);
        CrashtimeJournal::write(&base, &config().info, &[Command::new("count+", 10)]).unwrap();

        for _ in 0..2 {
            let doc = JournaledDocument::open_recovered(&base, config()).unwrap();
            assert_eq!(doc.get("count"), Some(Value::Integer(11)));
            assert!(!doc.files().crashtime_journal().exists());
            doc.close().unwrap();
        }
        assert_eq!(reload(&base), Value::from(json!({"count": 11})));
    }

    #[cfg(unix)]
    #[test]
    fn failed_snapshot_commit_closes_document() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("before", 1).unwrap();

        // a non-empty directory cannot be replaced by rename
        let snapshot = doc.files().snapshot().to_path_buf();
        fs::remove_file(&snapshot).unwrap();
        fs::create_dir(&snapshot).unwrap();
        fs::write(snapshot.join("occupied"), b"x").unwrap();

        assert!(matches!(doc.snapshot(), Err(CoreError::Io(_))));
        assert!(!doc.is_open());
        assert!(matches!(
            doc.add_command("after", 2),
            Err(CoreError::DocumentClosed)
        ));
        doc.close().unwrap();

        assert_eq!(reload(&base), Value::from(json!({"before": 1})));
    }

    #[test]
    fn non_finite_floats_never_reach_disk() {
        let (_dir, base) = setup();
        let doc = JournaledDocument::open(&base, config(), &DocMap::new()).unwrap();
        doc.add_command("y", 1).unwrap();

        let err = doc.add_command("nan", f64::NAN).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert_eq!(doc.journal_len(), 1);

        doc.add_command("x+", 1e308).unwrap();
        let err = doc.add_command("x+", 1e308).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));

        let live = doc.to_value();
        assert_eq!(live, Value::from(json!({"y": 1, "x": 1e308})));
        std::mem::forget(doc);
        assert_eq!(reload(&base), live);
    }

    #[test]
    fn buffer_sized_for_k_commands_snapshots_on_the_next() {
        const K: usize = 5;
        let (_dir, base) = setup();
        let command = Command::new("n+", 1);
        let header = serialize_info(&config().info).unwrap().len();
        let entry = serialize_command(&command).unwrap().len();
        let config = config()
            .buffer_size(header + K * entry)
            .high_water(usize::MAX);
        let doc = JournaledDocument::open(&base, config, &DocMap::new()).unwrap();

        for _ in 0..K {
            doc.add_command_entry(command.clone()).unwrap();
        }
        assert_eq!(doc.journal_len(), K);
        assert_eq!(doc.journal_bytes(), header + K * entry);

        doc.add_command_entry(command.clone()).unwrap();
        assert_eq!(doc.journal_len(), 1);
        assert_eq!(doc.journal_bytes(), header + entry);

        std::mem::forget(doc);
        assert_eq!(reload(&base), Value::from(json!({"n": (K + 1) as i64})));
    }
}
