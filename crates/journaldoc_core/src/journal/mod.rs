//! Redo log of document mutations.
//!
//! A [`Journal`] records every [`Command`] applied since the last snapshot.
//! Replaying it over that snapshot reproduces the live document.
//!
//! ## Replay Policy
//!
//! Commands whose mutation is rejected (type mismatch, list index past the
//! end) are skipped with a warning. Such a command was rejected in exactly
//! the same way when it was first recorded, against exactly the same state,
//! so skipping it keeps replay faithful to the live document.

mod codec;
mod command;

pub use codec::{decode, serialize_command, serialize_info, ENTRY_TERMINATOR, INFO_KEY};
pub use command::{Command, JournalInfo};

use crate::error::CoreResult;
use crate::path::PathCache;
use crate::value::Value;
use tracing::warn;

/// An ordered list of commands tagged with a [`JournalInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    info: JournalInfo,
    commands: Vec<Command>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new(info: JournalInfo) -> Self {
        Self {
            info,
            commands: Vec::new(),
        }
    }

    /// Creates a journal holding `commands`.
    #[must_use]
    pub fn with_commands(info: JournalInfo, commands: Vec<Command>) -> Self {
        Self { info, commands }
    }

    /// Returns the journal's type and version tag.
    #[must_use]
    pub fn info(&self) -> &JournalInfo {
        &self.info
    }

    /// Returns true if this journal was written for `expected`.
    #[must_use]
    pub fn is_compatible(&self, expected: &JournalInfo) -> bool {
        self.info == *expected
    }

    /// Appends a command.
    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Returns the recorded commands in order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if no commands are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops all commands, keeping the info tag.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Replays every command over `document` in order and returns the result.
    ///
    /// Only an empty-path command replaces the document object; all others
    /// mutate it in place.
    pub fn apply_to(&self, document: Value, cache: &PathCache) -> Value {
        let mut document = document;
        for (index, command) in self.commands.iter().enumerate() {
            match command.apply(document.clone(), cache) {
                Ok(next) => document = next,
                Err(e) => warn!(
                    index,
                    path = %command.path,
                    error = %e,
                    "skipping rejected journal command"
                ),
            }
        }
        document
    }

    /// Encodes the journal in the wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn serialize(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = serialize_info(&self.info)?;
        for command in &self.commands {
            bytes.extend(serialize_command(command)?);
        }
        Ok(bytes)
    }

    /// Decodes a journal from the wire format.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::JournalCorruption`] if the bytes are not a
    /// valid journal.
    pub fn deserialize(bytes: &[u8]) -> CoreResult<Self> {
        let (info, commands) = decode(bytes)?;
        Ok(Self { info, commands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info() -> JournalInfo {
        JournalInfo::new("state", 1)
    }

    #[test]
    fn serialize_deserialize() {
        let mut journal = Journal::new(info());
        journal.add_command(Command::new("app.id", "com.example"));
        journal.add_command(Command::new("counters.crashes+", 1));
        journal.add_command(Command::delete("app.id"));

        let bytes = journal.serialize().unwrap();
        let decoded = Journal::deserialize(&bytes).unwrap();

        assert_eq!(decoded, journal);
    }

    #[test]
    fn apply_folds_in_order() {
        let journal = Journal::with_commands(
            info(),
            vec![
                Command::new("a", 1),
                Command::new("b.", "x"),
                Command::new("b.", "y"),
                Command::new("a", 2),
                Command::new("b.0", Value::Null),
            ],
        );

        let document = journal.apply_to(Value::from(json!({})), &PathCache::new());
        assert_eq!(document, Value::from(json!({"a": 2, "b": ["y"]})));
    }

    #[test]
    fn empty_path_replaces_document() {
        let journal = Journal::with_commands(
            info(),
            vec![
                Command::new("a", 1),
                Command::new("", Value::from(json!({"fresh": true}))),
                Command::new("b", 2),
            ],
        );

        let document = journal.apply_to(Value::from(json!({"old": 1})), &PathCache::new());
        assert_eq!(document, Value::from(json!({"fresh": true, "b": 2})));
    }

    #[test]
    fn rejected_commands_are_skipped() {
        let journal = Journal::with_commands(
            info(),
            vec![
                Command::new("name", "x"),
                Command::new("name+", 1),
                Command::new("list.4", 1),
                Command::new("bad..path", 1),
                Command::new("ok", true),
            ],
        );

        let document = journal.apply_to(Value::from(json!({})), &PathCache::new());
        assert_eq!(document, Value::from(json!({"name": "x", "list": [], "ok": true})));
    }

    #[test]
    fn compatibility_check() {
        let journal = Journal::new(info());
        assert!(journal.is_compatible(&JournalInfo::new("state", 1)));
        assert!(!journal.is_compatible(&JournalInfo::new("state", 2)));
        assert!(!journal.is_compatible(&JournalInfo::new("other", 1)));
    }

    #[test]
    fn clear_keeps_info() {
        let mut journal = Journal::new(info());
        journal.add_command(Command::new("a", 1));
        journal.clear();
        assert!(journal.is_empty());
        assert_eq!(journal.info(), &info());
    }
}
