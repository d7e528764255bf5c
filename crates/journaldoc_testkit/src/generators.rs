//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, paths, values and commands. Command
//! strategies draw from a small key set so that generated commands collide
//! on the same containers.

use journaldoc_core::{escape_key, Command, DocList, DocMap, Value};
use proptest::prelude::*;

/// Strategy for map keys, including ones that need escaping in paths.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex"),
        1 => prop::string::string_regex("[a-z0-9.+\\\\-]{1,6}").expect("Invalid regex"),
    ]
}

/// Strategy for scalar values. Floats are finite so equality is reflexive.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..1_000_000).prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        prop::string::string_regex("\\PC{0,8}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for nested values without nulls.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|values| Value::List(DocList::from_vec(values))),
            prop::collection::vec((key_strategy(), inner), 0..4)
                .prop_map(|entries| Value::Map(entries.into_iter().collect::<DocMap>())),
        ]
    })
}

/// Strategy for a map value, usable as a whole document.
pub fn document_strategy() -> impl Strategy<Value = DocMap> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..6)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for a path of escaped keys, paired with the raw keys.
pub fn escaped_path_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec(key_strategy(), 1..4).prop_map(|keys| {
        let path = keys
            .iter()
            .map(|key| escape_key(key))
            .collect::<Vec<_>>()
            .join(".");
        (path, keys)
    })
}

/// Strategy for one path segment drawn from a small, colliding set.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::sample::select(vec!["a", "b", "c"]).prop_map(String::from),
        1 => prop::sample::select(vec!["0", "1", "-1"]).prop_map(String::from),
    ]
}

/// Kind of mutation a generated command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Set a value.
    Set,
    /// Append to a list.
    Append,
    /// Add a number.
    Add,
    /// Delete.
    Delete,
}

/// Strategy for command kinds, weighted towards sets.
pub fn command_kind_strategy() -> impl Strategy<Value = CommandKind> {
    prop_oneof![
        4 => Just(CommandKind::Set),
        2 => Just(CommandKind::Append),
        2 => Just(CommandKind::Add),
        1 => Just(CommandKind::Delete),
    ]
}

/// Strategy for commands over colliding paths.
///
/// Some generated commands are rejected by the document they are applied
/// to (adding to a string, indexing past a list end); that is intended.
pub fn command_strategy() -> impl Strategy<Value = Command> {
    (
        prop::collection::vec(segment_strategy(), 1..4),
        command_kind_strategy(),
        value_strategy(),
        -100i64..100,
    )
        .prop_map(|(segments, kind, value, amount)| {
            let path = segments.join(".");
            match kind {
                CommandKind::Set => Command::new(path, value),
                CommandKind::Append => Command::new(format!("{path}."), value),
                CommandKind::Add => Command::new(format!("{path}+"), amount),
                CommandKind::Delete => Command::delete(path),
            }
        })
}

/// Strategy for a sequence of commands.
pub fn command_sequence_strategy(
    min_commands: usize,
    max_commands: usize,
) -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(command_strategy(), min_commands..max_commands)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journaldoc_core::{Directive, DocumentPath, Journal, JournalInfo};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn escaped_keys_compile_to_map_keys((path, keys) in escaped_path_strategy()) {
            let compiled = DocumentPath::parse(&path).unwrap();
            let expected: Vec<Directive> = keys.into_iter().map(Directive::MapKey).collect();
            prop_assert_eq!(compiled.directives(), expected.as_slice());
        }

        #[test]
        fn generated_paths_compile(command in command_strategy()) {
            prop_assert!(DocumentPath::parse(&command.path).is_ok());
        }

        #[test]
        fn deep_clone_is_equal_and_detached(document in document_strategy()) {
            let copy = document.deep_clone();
            prop_assert_eq!(&copy, &document);
            copy.insert("__extra__", true);
            prop_assert!(!document.contains_key("__extra__"));
        }

        #[test]
        fn journal_survives_wire_format(commands in command_sequence_strategy(0, 20)) {
            let journal = Journal::with_commands(JournalInfo::new("prop", 1), commands);
            let decoded = Journal::deserialize(&journal.serialize().unwrap()).unwrap();
            prop_assert_eq!(decoded, journal);
        }
    }
}
