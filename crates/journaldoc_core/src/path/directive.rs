//! Per-segment navigation and mutation strategies.

use crate::error::{CoreError, CoreResult};
use crate::value::{DocList, DocMap, Value};

/// The kind of container a directive operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A [`DocMap`].
    Map,
    /// A [`DocList`].
    List,
}

/// What one path segment does to the container it addresses.
///
/// Intermediate directives only navigate (and create missing containers);
/// the last directive of a path performs the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Set or remove a map key.
    MapKey(String),
    /// Add a number to a map entry, inserting it if absent.
    MapKeyAdd(String),
    /// Set or remove a list element.
    ListIndex(usize),
    /// Add a number to a list element, inserting it if absent.
    ListIndexAdd(usize),
    /// Set or remove the last list element (index 0 of an empty list).
    ListLastIndex,
    /// Add a number to the last list element.
    ListLastIndexAdd,
    /// Append to a list.
    ListInsert,
}

impl Directive {
    /// Returns the kind of container this directive addresses.
    #[must_use]
    pub fn container_kind(&self) -> ContainerKind {
        match self {
            Directive::MapKey(_) | Directive::MapKeyAdd(_) => ContainerKind::Map,
            Directive::ListIndex(_)
            | Directive::ListIndexAdd(_)
            | Directive::ListLastIndex
            | Directive::ListLastIndexAdd
            | Directive::ListInsert => ContainerKind::List,
        }
    }

    /// Returns true for the numeric add-or-insert variants.
    #[must_use]
    pub fn is_add(&self) -> bool {
        matches!(
            self,
            Directive::MapKeyAdd(_) | Directive::ListIndexAdd(_) | Directive::ListLastIndexAdd
        )
    }

    /// Creates an empty container of the kind this directive addresses.
    #[must_use]
    pub fn new_container(&self) -> Value {
        match self.container_kind() {
            ContainerKind::Map => Value::Map(DocMap::new()),
            ContainerKind::List => Value::List(DocList::new()),
        }
    }

    /// Returns true if `value` is a container this directive can address.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self.container_kind(), value),
            (ContainerKind::Map, Value::Map(_)) | (ContainerKind::List, Value::List(_))
        )
    }

    /// Checks the parts of a mutation that depend only on the incoming value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the value holds a NaN or
    /// infinite float, an add directive receives a non-number or an append
    /// receives null.
    pub fn validate_value(&self, value: &Value) -> CoreResult<()> {
        if !value.is_finite() {
            return Err(CoreError::type_mismatch(
                "non-finite floats cannot be stored",
            ));
        }
        if self.is_add() && !value.is_number() {
            return Err(CoreError::type_mismatch(format!(
                "cannot add a {} value, expected a number",
                value.type_name()
            )));
        }
        if *self == Directive::ListInsert && value.is_null() {
            return Err(CoreError::type_mismatch("cannot append null to a list"));
        }
        Ok(())
    }

    /// Reads the value this directive addresses inside `container`.
    ///
    /// `ListInsert` always reports absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if `container` is not of this
    /// directive's kind.
    pub fn get_from_container(&self, container: &Value) -> CoreResult<Option<Value>> {
        match self {
            Directive::MapKey(key) | Directive::MapKeyAdd(key) => Ok(self.map(container)?.get(key)),
            Directive::ListIndex(index) | Directive::ListIndexAdd(index) => {
                Ok(self.list(container)?.get(*index))
            }
            Directive::ListLastIndex | Directive::ListLastIndexAdd => {
                Ok(self.list(container)?.last())
            }
            Directive::ListInsert => {
                self.list(container)?;
                Ok(None)
            }
        }
    }

    /// Applies this directive's mutation to `container`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container has the wrong kind, the value is
    /// rejected by [`validate_value`](Self::validate_value), an add targets a
    /// non-numeric value, or a list index is past the end of the list.
    pub fn set_in_container(&self, container: &Value, value: Value) -> CoreResult<()> {
        self.validate_value(&value)?;

        match self {
            Directive::MapKey(key) => {
                self.map(container)?.update(|entries| {
                    if value.is_null() {
                        entries.shift_remove(key);
                    } else {
                        entries.insert(key.clone(), value);
                    }
                });
                Ok(())
            }
            Directive::MapKeyAdd(key) => self.map(container)?.update(|entries| {
                let sum = add_numbers(entries.get(key), value)?;
                entries.insert(key.clone(), sum);
                Ok(())
            }),
            Directive::ListIndex(index) => self
                .list(container)?
                .update(|items| set_at(items, *index, value)),
            Directive::ListIndexAdd(index) => self
                .list(container)?
                .update(|items| add_at(items, *index, value)),
            Directive::ListLastIndex => self.list(container)?.update(|items| {
                if items.is_empty() {
                    if !value.is_null() {
                        items.push(value);
                    }
                    return Ok(());
                }
                let last = items.len() - 1;
                set_at(items, last, value)
            }),
            Directive::ListLastIndexAdd => self.list(container)?.update(|items| {
                let last = items.len().saturating_sub(1);
                add_at(items, last, value)
            }),
            Directive::ListInsert => {
                self.list(container)?.push(value);
                Ok(())
            }
        }
    }

    fn map<'a>(&self, container: &'a Value) -> CoreResult<&'a DocMap> {
        container.as_map().ok_or_else(|| self.wrong_container(container))
    }

    fn list<'a>(&self, container: &'a Value) -> CoreResult<&'a DocList> {
        container.as_list().ok_or_else(|| self.wrong_container(container))
    }

    fn wrong_container(&self, container: &Value) -> CoreError {
        CoreError::type_mismatch(format!(
            "{self:?} needs a {} container, found {}",
            match self.container_kind() {
                ContainerKind::Map => "map",
                ContainerKind::List => "list",
            },
            container.type_name()
        ))
    }
}

fn set_at(items: &mut Vec<Value>, index: usize, value: Value) -> CoreResult<()> {
    let len = items.len();
    if value.is_null() {
        if index < len {
            items.remove(index);
        }
        return Ok(());
    }
    match index.cmp(&len) {
        std::cmp::Ordering::Less => items[index] = value,
        std::cmp::Ordering::Equal => items.push(value),
        std::cmp::Ordering::Greater => return Err(CoreError::IndexOutOfRange { index, len }),
    }
    Ok(())
}

fn add_at(items: &mut Vec<Value>, index: usize, value: Value) -> CoreResult<()> {
    let len = items.len();
    match index.cmp(&len) {
        std::cmp::Ordering::Less => {
            items[index] = add_numbers(Some(&items[index]), value)?;
            Ok(())
        }
        std::cmp::Ordering::Equal => {
            items.push(value);
            Ok(())
        }
        std::cmp::Ordering::Greater => Err(CoreError::IndexOutOfRange { index, len }),
    }
}

/// Adds `incoming` to `prior`, widening to float if either side is a float.
///
/// An absent or null prior value yields `incoming` unchanged. Integer overflow
/// wraps; a float sum that is not finite is rejected.
fn add_numbers(prior: Option<&Value>, incoming: Value) -> CoreResult<Value> {
    let prior = match prior {
        None | Some(Value::Null) => return Ok(incoming),
        Some(prior) => prior,
    };
    if let (Value::Integer(a), Value::Integer(b)) = (prior, &incoming) {
        return Ok(Value::Integer(a.wrapping_add(*b)));
    }
    match (prior.as_f64(), incoming.as_f64()) {
        (Some(a), Some(b)) => {
            let sum = a + b;
            if sum.is_finite() {
                Ok(Value::Float(sum))
            } else {
                Err(CoreError::type_mismatch(format!(
                    "adding {b} to {a} does not give a finite float"
                )))
            }
        }
        _ => Err(CoreError::type_mismatch(format!(
            "cannot add to an existing {} value",
            prior.type_name()
        ))),
    }
}
