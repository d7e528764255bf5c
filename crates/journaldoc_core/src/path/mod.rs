//! Path-addressed document mutation.
//!
//! A path string compiles into a list of [`Directive`]s, one per segment.
//!
//! ## Syntax
//!
//! ```text
//! a.b.c        map keys
//! a.0          list index 0 inside map key "a"
//! a.-1         last element of "a" (index 0 if "a" is empty or absent)
//! a.           append to list "a"
//! a.hits+      add a number to "hits", inserting it if absent
//! a\.b         the single map key "a.b"
//! ""           replace the whole document (value must be a map)
//! ```
//!
//! `\` escapes the next character. A segment containing an escaped character
//! is always a map key. Malformed paths (empty segment, dangling escape,
//! index below -1) are rejected when compiled.

mod cache;
mod directive;

pub use cache::PathCache;
pub use directive::{ContainerKind, Directive};

use crate::error::{CoreError, CoreResult};
use crate::value::Value;

/// A compiled document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    path: String,
    directives: Vec<Directive>,
}

/// A raw segment collected by the scanner.
struct Segment {
    text: String,
    escaped: bool,
    trailing_plus: bool,
}

impl DocumentPath {
    /// Compiles a path string.
    ///
    /// Prefer [`PathCache::compile`] in hot paths; it memoizes the result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if the path is malformed.
    pub fn parse(path: &str) -> CoreResult<Self> {
        let directives = if path.is_empty() {
            Vec::new()
        } else {
            compile_directives(path)?
        };
        Ok(Self {
            path: path.to_string(),
            directives,
        })
    }

    /// Returns the raw path string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the compiled directives, one per segment.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Returns true for the empty path, which replaces the whole document.
    #[must_use]
    pub fn is_whole_document(&self) -> bool {
        self.directives.is_empty()
    }

    /// Checks the parts of a mutation that depend only on the value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the value can never be applied
    /// through this path.
    pub fn validate_value(&self, value: &Value) -> CoreResult<()> {
        match self.directives.last() {
            None if !value.is_finite() => Err(CoreError::type_mismatch(
                "non-finite floats cannot be stored",
            )),
            None if !matches!(value, Value::Map(_)) => Err(CoreError::type_mismatch(format!(
                "document replacement needs a map, found {}",
                value.type_name()
            ))),
            None => Ok(()),
            Some(last) => last.validate_value(value),
        }
    }

    /// Applies `value` at this path inside `document` and returns the
    /// resulting document.
    ///
    /// Containers are mutated in place, so the returned document is the same
    /// handle as `document` unless the path is empty, in which case `value`
    /// itself becomes the document. Missing or wrong-kind intermediate
    /// containers are replaced by fresh ones; deleting through a missing
    /// container changes nothing.
    ///
    /// Intermediate containers are created before the last directive runs
    /// and stay in place if it fails: `a.b.5 = 1` on `{}` is rejected but
    /// leaves `{"a": {"b": []}}`. Replaying the same command reproduces
    /// this.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a map, the value is rejected,
    /// or the last directive cannot be applied.
    pub fn modify_document(&self, document: Value, value: Value) -> CoreResult<Value> {
        let Some((last, intermediate)) = self.directives.split_last() else {
            self.validate_value(&value)?;
            return Ok(value);
        };

        if !matches!(document, Value::Map(_)) {
            return Err(CoreError::type_mismatch(format!(
                "document root must be a map, found {}",
                document.type_name()
            )));
        }

        let mut container = document.clone();
        for (depth, directive) in intermediate.iter().enumerate() {
            let next = &self.directives[depth + 1];
            container = match directive.get_from_container(&container)? {
                Some(child) if next.accepts(&child) => child,
                _ if value.is_null() => return Ok(document),
                _ => {
                    let fresh = next.new_container();
                    directive.set_in_container(&container, fresh.clone())?;
                    fresh
                }
            };
        }

        last.set_in_container(&container, value)?;
        Ok(document)
    }
}

/// Escapes `key` so that it compiles to exactly `MapKey(key)` when used as
/// a path segment.
///
/// Separators, backslashes and plus signs are escaped. A key that would read
/// as a list index gets its first character escaped.
#[must_use]
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len() + 2);
    for ch in key.chars() {
        if matches!(ch, '.' | '\\' | '+') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    if escaped.len() == key.len() && looks_like_integer(key) {
        escaped.insert(0, '\\');
    }
    escaped
}

/// Single-pass scan of a non-empty path into directives.
fn compile_directives(path: &str) -> CoreResult<Vec<Directive>> {
    let mut segments = Vec::new();
    let mut current = Segment::empty();
    let mut escaping = false;
    let mut ends_with_separator = false;

    for ch in path.chars() {
        ends_with_separator = false;
        if escaping {
            current.text.push(ch);
            current.escaped = true;
            current.trailing_plus = false;
            escaping = false;
            continue;
        }
        match ch {
            '\\' => escaping = true,
            '.' => {
                segments.push(std::mem::replace(&mut current, Segment::empty()));
                ends_with_separator = true;
            }
            c => {
                current.text.push(c);
                current.trailing_plus = c == '+';
            }
        }
    }

    if escaping {
        return Err(CoreError::invalid_path(path, "dangling escape at end of path"));
    }
    if !ends_with_separator {
        segments.push(current);
    }

    let count = segments.len();
    let mut directives = Vec::with_capacity(count + usize::from(ends_with_separator));
    for (index, segment) in segments.into_iter().enumerate() {
        let is_last = index + 1 == count && !ends_with_separator;
        directives.push(segment.into_directive(path, index, is_last)?);
    }
    if ends_with_separator {
        directives.push(Directive::ListInsert);
    }
    Ok(directives)
}

impl Segment {
    fn empty() -> Self {
        Self {
            text: String::new(),
            escaped: false,
            trailing_plus: false,
        }
    }

    fn into_directive(mut self, path: &str, index: usize, is_last: bool) -> CoreResult<Directive> {
        let add = is_last && self.trailing_plus;
        if add {
            self.text.pop();
        }
        if self.text.is_empty() {
            return Err(CoreError::invalid_path(
                path,
                format!("empty segment at position {index}"),
            ));
        }

        if !self.escaped && looks_like_integer(&self.text) {
            let parsed: i64 = self.text.parse().map_err(|_| {
                CoreError::invalid_path(path, format!("list index {} is out of range", self.text))
            })?;
            return match parsed {
                -1 if add => Ok(Directive::ListLastIndexAdd),
                -1 => Ok(Directive::ListLastIndex),
                n if n < -1 => Err(CoreError::invalid_path(
                    path,
                    format!("list index {n} at position {index} is below -1"),
                )),
                n => {
                    let n = usize::try_from(n).map_err(|_| {
                        CoreError::invalid_path(path, format!("list index {n} is out of range"))
                    })?;
                    Ok(if add {
                        Directive::ListIndexAdd(n)
                    } else {
                        Directive::ListIndex(n)
                    })
                }
            };
        }

        Ok(if add {
            Directive::MapKeyAdd(self.text)
        } else {
            Directive::MapKey(self.text)
        })
    }
}

/// An optional minus sign followed by one or more ASCII digits.
fn looks_like_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
