//! Crash recovery testing for journaldoc.
//!
//! A crash is simulated by leaking a [`JournaledDocument`] with
//! [`std::mem::forget`]: no final snapshot is taken and the mapping is never
//! flushed explicitly. Mapped writes already live in the page cache, so
//! recovery must rebuild the document from what is on disk.
//!
//! ## Test Strategy
//!
//! 1. **Crash after commands** - journaled commands survive
//! 2. **Crash across overflow snapshots** - no command is lost or applied twice
//! 3. **Crash during snapshot** - `.snapshot.new` wins over the stale primary
//! 4. **Crash-time journal** - commands written by a crash handler are applied
//! 5. **Orderly close** - the final snapshot holds everything
//!
//! ## Usage
//!
//! ```rust,ignore
//! use journaldoc_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::with_temp_dir()?;
//! assert!(harness.run_all().iter().all(|r| r.passed));
//! ```

use crate::fixtures::test_config;
use journaldoc_core::{
    Command, CoreError, CrashtimeJournal, DocMap, DocumentConfig, DocumentFiles,
    JournaledDocument, Value,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Document expected after recovery.
    pub expected: Option<Value>,
    /// Document actually recovered.
    pub actual: Option<Value>,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Compares the recovered document with the expected one.
    pub fn compare(description: &str, expected: Value, actual: Option<Value>) -> Self {
        let passed = actual.as_ref() == Some(&expected);
        Self {
            passed,
            description: description.to_string(),
            error: (!passed).then(|| "recovered document differs".to_string()),
            expected: Some(expected),
            actual,
        }
    }

    /// Creates a failing result from an error.
    pub fn error(description: &str, error: &CoreError) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected: None,
            actual: None,
            error: Some(error.to_string()),
        }
    }
}

/// Test harness for crash recovery scenarios.
pub struct CrashRecoveryHarness {
    /// Base path of the test document.
    pub base: PathBuf,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
    _temp_dir: Option<TempDir>,
}

impl CrashRecoveryHarness {
    /// Creates a harness for the document at `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            results: Vec::new(),
            _temp_dir: None,
        }
    }

    /// Creates a harness in a temporary directory removed on drop.
    pub fn with_temp_dir() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let mut harness = Self::new(temp_dir.path().join("crash"));
        harness._temp_dir = Some(temp_dir);
        Ok(harness)
    }

    /// Runs every scenario and returns the results.
    pub fn run_all(&mut self) -> &[CrashRecoveryResult] {
        self.test_crash_after_commands();
        self.test_crash_across_overflow();
        self.test_crash_during_snapshot();
        self.test_crashtime_journal_applied();
        self.test_close_then_reopen();
        &self.results
    }

    /// Tests that journaled commands survive a crash.
    pub fn test_crash_after_commands(&mut self) -> CrashRecoveryResult {
        let description = "Journaled commands survive crash";
        self.scenario(description, |base| {
            let doc = open_fresh(base, test_config())?;
            doc.add_command("user.name", "ada")?;
            doc.add_command("user.roles.", "admin")?;
            doc.add_command("launches+", 1)?;
            doc.add_command("launches+", 1)?;
            let expected = doc.to_value();
            std::mem::forget(doc);
            Ok(expected)
        })
    }

    /// Tests that overflow snapshots neither lose nor repeat commands.
    pub fn test_crash_across_overflow(&mut self) -> CrashRecoveryResult {
        let description = "Overflow snapshots neither lose nor repeat commands";
        self.scenario(description, |base| {
            let doc = open_fresh(base, test_config().buffer_size(256))?;
            for i in 0..200 {
                doc.add_command("total+", 1)?;
                doc.add_command("last", i)?;
            }
            let expected = doc.to_value();
            std::mem::forget(doc);
            Ok(expected)
        })
    }

    /// Tests that an interrupted snapshot takes precedence over the primary.
    ///
    /// The interrupted snapshot already includes the journaled commands, so
    /// replaying the journal over it would apply the add twice.
    pub fn test_crash_during_snapshot(&mut self) -> CrashRecoveryResult {
        let description = "Interrupted snapshot takes precedence";
        self.scenario(description, |base| {
            let doc = open_fresh(base, test_config())?;
            doc.add_command("count+", 5)?;
            doc.add_command("items.", "a")?;
            let expected = doc.to_value();

            let files = doc.files().clone();
            std::mem::forget(doc);
            files.write_new_snapshot(&expected.to_json_vec()?)?;
            Ok(expected)
        })
    }

    /// Tests that a crash-time journal is applied after the runtime journal.
    pub fn test_crashtime_journal_applied(&mut self) -> CrashRecoveryResult {
        let description = "Crash-time journal applied after runtime journal";
        self.scenario(description, |base| {
            let config = test_config();
            let doc = open_fresh(base, config.clone())?;
            doc.add_command("count+", 1)?;
            std::mem::forget(doc);

            let late = [Command::new("count+", 10), Command::new("flag", true)];
            CrashtimeJournal::write(base, &config.info, &late)?;

            let expected = json_value(&[("count", Value::Integer(11)), ("flag", Value::Bool(true))]);
            Ok(expected)
        })
    }

    /// Tests that a closed document reopens with its full state.
    pub fn test_close_then_reopen(&mut self) -> CrashRecoveryResult {
        let description = "Closed document reopens with full state";
        self.scenario(description, |base| {
            let doc = open_fresh(base, test_config())?;
            doc.add_command("a.b.c", 1)?;
            doc.add_command("a.b.d.", 2.5)?;
            doc.close()?;
            let expected = doc.to_value();
            drop(doc);

            let reopened = JournaledDocument::open_recovered(base, test_config())?;
            let reopened_value = reopened.to_value();
            reopened.close()?;
            if reopened_value != expected {
                return Err(CoreError::invalid_operation("reopened document differs"));
            }
            Ok(expected)
        })
    }

    fn scenario<F>(&mut self, description: &str, run: F) -> CrashRecoveryResult
    where
        F: FnOnce(&Path) -> Result<Value, CoreError>,
    {
        let result = run(&self.base)
            .and_then(|expected| {
                let actual = JournaledDocument::load_document_contents(&self.base)?;
                Ok(CrashRecoveryResult::compare(
                    description,
                    expected,
                    actual.map(Value::Map),
                ))
            })
            .unwrap_or_else(|e| CrashRecoveryResult::error(description, &e));

        self.results.push(result.clone());
        result
    }
}

/// Removes any previous files at `base` and opens an empty document.
fn open_fresh(base: &Path, config: DocumentConfig) -> Result<JournaledDocument, CoreError> {
    DocumentFiles::new(base).remove_all()?;
    JournaledDocument::open(base, config, &DocMap::new())
}

fn json_value(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect(),
    )
}
