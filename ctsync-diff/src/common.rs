//! Comparison primitives shared by every comparator.
//!
//! A missing value and an empty value are the same thing to the remote store:
//! an unset description and an empty localized map must not produce an action.

use crate::error::{SynthesisError, SynthesisResult};
use ctsync_types::{Reference, UpdateAction};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Values that have an "empty" state equivalent to being absent.
pub trait Emptiable {
    fn is_empty_value(&self) -> bool;
}

impl Emptiable for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiable for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiable for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Emptiable for HashMap<K, V, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiable for BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> Emptiable for HashSet<T, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiable for Value {
    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            _ => false,
        }
    }
}

impl Emptiable for Reference {
    fn is_empty_value(&self) -> bool {
        false
    }
}

macro_rules! never_empty {
    ($($t:ty),*) => {
        $(impl Emptiable for $t {
            fn is_empty_value(&self) -> bool {
                false
            }
        })*
    };
}

never_empty!(bool, i32, i64, u32, u64, f64);

/// Whether `value` is absent or empty.
pub fn is_absent<T: Emptiable>(value: Option<&T>) -> bool {
    value.is_none_or(Emptiable::is_empty_value)
}

/// Compares two optional values with null/empty equivalence.
///
/// Both absent-or-empty: equal. Otherwise plain equality.
pub fn values_equal<T: PartialEq + Emptiable>(old: Option<&T>, new: Option<&T>) -> bool {
    if is_absent(old) && is_absent(new) {
        return true;
    }
    old == new
}

/// Builds the action returned by `make` only if `old` and `new` differ.
pub fn build_update_action<T, F>(old: Option<&T>, new: Option<&T>, make: F) -> Option<UpdateAction>
where
    T: PartialEq + Emptiable,
    F: FnOnce() -> UpdateAction,
{
    if values_equal(old, new) {
        None
    } else {
        Some(make())
    }
}

/// Builds a [`UpdateAction::SetField`] named `action` carrying the new value,
/// or an unset when the new value is absent or empty. No action if unchanged.
pub fn build_set_field_action<T>(
    action: &str,
    old: Option<&T>,
    new: Option<&T>,
) -> SynthesisResult<Option<UpdateAction>>
where
    T: PartialEq + Emptiable + Serialize,
{
    if values_equal(old, new) {
        return Ok(None);
    }
    let value = match new.filter(|v| !v.is_empty_value()) {
        Some(v) => Some(to_value(action, v)?),
        None => None,
    };
    Ok(Some(UpdateAction::set_field(action, value)))
}

/// Serializes `value` for the payload of `action`.
pub fn to_value<T: Serialize + ?Sized>(action: &str, value: &T) -> SynthesisResult<Value> {
    serde_json::to_value(value).map_err(|e| SynthesisError::Serialization {
        action: action.to_string(),
        message: e.to_string(),
    })
}

/// Membership difference between two collections: `(added, removed)`.
///
/// `added` keeps the order of `new`, `removed` the order of `old`; duplicates
/// are reported once.
pub fn diff_members<'a, T>(old: &'a [T], new: &'a [T]) -> (Vec<&'a T>, Vec<&'a T>)
where
    T: Eq + std::hash::Hash,
{
    let old_set: HashSet<&T> = old.iter().collect();
    let new_set: HashSet<&T> = new.iter().collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|m| !old_set.contains(m) && seen.insert(*m))
        .collect();

    let mut seen = HashSet::new();
    let removed = old
        .iter()
        .filter(|m| !new_set.contains(m) && seen.insert(*m))
        .collect();

    (added, removed)
}
