//! Crash-time journal writer.
//!
//! A crash handler that still holds the commands recorded since the last
//! snapshot can persist them to `P.journal.crashtime` with plain file writes.
//! Recovery replays that file after the runtime journal.

use crate::document::files::DocumentFiles;
use crate::error::CoreResult;
use crate::journal::{serialize_command, serialize_info, Command, JournalInfo};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writer for a document's crash-time journal.
pub struct CrashtimeJournal {
    path: PathBuf,
    file: File,
}

impl CrashtimeJournal {
    /// Creates (or truncates) the crash-time journal for the document at
    /// `base` and writes its info entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(base: &Path, info: &JournalInfo) -> CoreResult<Self> {
        let path = DocumentFiles::new(base).crashtime_journal().to_path_buf();
        let mut file = File::create(&path)?;
        file.write_all(&serialize_info(info)?)?;
        Ok(Self { path, file })
    }

    /// Opens an existing crash-time journal for appending.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file does not exist.
    pub fn open(base: &Path) -> CoreResult<Self> {
        let path = DocumentFiles::new(base).crashtime_journal().to_path_buf();
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Writes a complete crash-time journal holding `commands`.
    ///
    /// # Errors
    ///
    /// Returns an error if any write or the final sync fails.
    pub fn write(base: &Path, info: &JournalInfo, commands: &[Command]) -> CoreResult<()> {
        let mut journal = Self::create(base, info)?;
        for command in commands {
            journal.append(command)?;
        }
        journal.sync()
    }

    /// Appends one command entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded or written.
    pub fn append(&mut self, command: &Command) -> CoreResult<()> {
        self.file.write_all(&serialize_command(command)?)?;
        Ok(())
    }

    /// Flushes the journal to disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Returns the journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::recovery::read_journal;
    use tempfile::tempdir;

    fn info() -> JournalInfo {
        JournalInfo::new("state", 1)
    }

    #[test]
    fn write_produces_wire_format() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("doc");
        CrashtimeJournal::write(&base, &info(), &[Command::new("a", 1), Command::delete("b")])
            .unwrap();

        let bytes = std::fs::read(dir.path().join("doc.journal.crashtime")).unwrap();
        assert_eq!(
            bytes,
            b"{\"*\":{\"type\":\"state\",\"version\":1}}\0{\"a\":1}\0{\"b\":null}\0"
        );
    }

    #[test]
    fn append_to_existing() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("doc");
        CrashtimeJournal::write(&base, &info(), &[Command::new("a", 1)]).unwrap();

        let mut journal = CrashtimeJournal::open(&base).unwrap();
        journal.append(&Command::new("b", 2)).unwrap();
        journal.sync().unwrap();

        let decoded = read_journal(journal.path()).unwrap().unwrap();
        assert_eq!(decoded.commands(), &[Command::new("a", 1), Command::new("b", 2)]);
    }

    #[test]
    fn open_missing_fails() {
        let dir = tempdir().unwrap();
        assert!(CrashtimeJournal::open(&dir.path().join("doc")).is_err());
    }
}
