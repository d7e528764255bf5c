//! On-disk layout of a journaled document.
//!
//! ```text
//! <base>.snapshot            full document, valid once created
//! <base>.snapshot.new        next snapshot, present mid-write or after a crash
//! <base>.journal             memory-mapped journal buffer
//! <base>.journal.crashtime   journal written by a crash handler
//! ```

use crate::error::CoreResult;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix of the primary snapshot.
pub const SNAPSHOT_SUFFIX: &str = ".snapshot";
/// Suffix of the in-progress snapshot.
pub const NEW_SNAPSHOT_SUFFIX: &str = ".snapshot.new";
/// Suffix of the runtime journal.
pub const JOURNAL_SUFFIX: &str = ".journal";
/// Suffix of the crash-time journal.
pub const CRASHTIME_JOURNAL_SUFFIX: &str = ".journal.crashtime";

/// Paths of every file belonging to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFiles {
    base: PathBuf,
    snapshot: PathBuf,
    new_snapshot: PathBuf,
    journal: PathBuf,
    crashtime_journal: PathBuf,
}

impl DocumentFiles {
    /// Derives the file paths for the document at `base`.
    #[must_use]
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            snapshot: with_suffix(base, SNAPSHOT_SUFFIX),
            new_snapshot: with_suffix(base, NEW_SNAPSHOT_SUFFIX),
            journal: with_suffix(base, JOURNAL_SUFFIX),
            crashtime_journal: with_suffix(base, CRASHTIME_JOURNAL_SUFFIX),
        }
    }

    /// Returns the base path.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the path of the primary snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    /// Returns the path of the in-progress snapshot.
    #[must_use]
    pub fn new_snapshot(&self) -> &Path {
        &self.new_snapshot
    }

    /// Returns the path of the runtime journal.
    #[must_use]
    pub fn journal(&self) -> &Path {
        &self.journal
    }

    /// Returns the path of the crash-time journal.
    #[must_use]
    pub fn crashtime_journal(&self) -> &Path {
        &self.crashtime_journal
    }

    /// Returns true if a snapshot (complete or in progress) exists.
    #[must_use]
    pub fn document_exists(&self) -> bool {
        self.snapshot.exists() || self.new_snapshot.exists()
    }

    /// Creates the directory holding the document files.
    pub fn create_parent_dir(&self) -> CoreResult<()> {
        if let Some(parent) = self.base.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Writes `bytes` to the in-progress snapshot file and syncs it.
    pub fn write_new_snapshot(&self, bytes: &[u8]) -> CoreResult<()> {
        let mut file = File::create(&self.new_snapshot)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Atomically replaces the primary snapshot with the in-progress one.
    pub fn commit_new_snapshot(&self) -> CoreResult<()> {
        fs::rename(&self.new_snapshot, &self.snapshot)?;
        self.sync_directory()?;
        Ok(())
    }

    /// Deletes the crash-time journal once a committed snapshot includes its
    /// commands. Returns whether a file was removed.
    pub fn remove_crashtime_journal(&self) -> CoreResult<bool> {
        match fs::remove_file(&self.crashtime_journal) {
            Ok(()) => {
                self.sync_directory()?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every file of the document that exists.
    pub fn remove_all(&self) -> CoreResult<()> {
        for path in [
            &self.snapshot,
            &self.new_snapshot,
            &self.journal,
            &self.crashtime_journal,
        ] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Syncs the containing directory so a rename is durable.
    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        let dir = match self.base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        File::open(dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        // NTFS journals metadata updates itself
        Ok(())
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn derives_all_paths() {
        let files = DocumentFiles::new(Path::new("/data/state"));
        assert_eq!(files.snapshot(), Path::new("/data/state.snapshot"));
        assert_eq!(files.new_snapshot(), Path::new("/data/state.snapshot.new"));
        assert_eq!(files.journal(), Path::new("/data/state.journal"));
        assert_eq!(
            files.crashtime_journal(),
            Path::new("/data/state.journal.crashtime")
        );
    }

    #[test]
    fn snapshot_write_then_commit() {
        let dir = tempdir().unwrap();
        let files = DocumentFiles::new(&dir.path().join("doc"));
        assert!(!files.document_exists());

        files.write_new_snapshot(b"{}").unwrap();
        assert!(files.document_exists());
        assert!(!files.snapshot().exists());

        files.commit_new_snapshot().unwrap();
        assert!(!files.new_snapshot().exists());
        assert_eq!(fs::read(files.snapshot()).unwrap(), b"{}");
    }

    #[test]
    fn remove_all_ignores_missing() {
        let dir = tempdir().unwrap();
        let files = DocumentFiles::new(&dir.path().join("doc"));
        fs::write(files.journal(), b"x").unwrap();

        files.remove_all().unwrap();
        assert!(!files.journal().exists());
        files.remove_all().unwrap();
    }

    #[test]
    fn remove_crashtime_journal_reports_removal() {
        let dir = tempdir().unwrap();
        let files = DocumentFiles::new(&dir.path().join("doc"));
        fs::write(files.crashtime_journal(), b"x").unwrap();

        assert!(files.remove_crashtime_journal().unwrap());
        assert!(!files.crashtime_journal().exists());
        assert!(!files.remove_crashtime_journal().unwrap());
    }

    #[test]
    fn create_parent_dir_nested() {
        let dir = tempdir().unwrap();
        let files = DocumentFiles::new(&dir.path().join("a").join("b").join("doc"));
        files.create_parent_dir().unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }
}
