//! # Document Model
//!
//! Immutable, path-addressed access to the configuration tree.
//!
//! Writes never touch their input. They clone the root handle and copy only
//! the containers along the written path, so untouched siblings stay
//! `Arc::ptr_eq` with the previous revision.
//!
//! Writes also never fail: a scalar or missing node in the middle of a path is
//! replaced with an empty object before descending. An index more than
//! [`MAX_INDEX_GAP`] past the end of an array turns that array into an object
//! keyed by decimal index instead of padding it.

use crate::path::{Path, Step};
use crate::value::{Map, Value};
use std::sync::Arc;

/// Largest number of `null`s a single write pads an array with
pub const MAX_INDEX_GAP: usize = 1024;

/// Look up the node at `path`.
///
/// Returns `None` as soon as a step hits a scalar or an absent key/index. An
/// index step against an object looks up the decimal key.
pub fn get<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for step in path.steps() {
        current = match (current, step) {
            (Value::Object(map), Step::Key(key)) => map.get(key)?,
            (Value::Object(map), Step::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(items), Step::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Return a new document with `value` written at `path`
pub fn set(doc: &Value, path: &Path, value: Value) -> Value {
    let mut root = doc.clone();
    write(&mut root, path.steps(), Some(value));
    root
}

/// Return a new document with the node at `path` removed.
///
/// Removing an object member makes [`get`] return `None` for `path`.
/// Removing an array slot leaves a `null` in place so sibling indices stay
/// stable.
pub fn remove(doc: &Value, path: &Path) -> Value {
    if get(doc, path).is_none() {
        return doc.clone();
    }
    let mut root = doc.clone();
    write(&mut root, path.steps(), None);
    root
}

/// Deep-merge an object `patch` into `doc`.
///
/// Objects merge key by key; any other patch value replaces the target
/// wholesale. A non-object patch replaces the whole document.
pub fn merge(doc: &Value, patch: &Value) -> Value {
    match (doc, patch) {
        (Value::Object(base), Value::Object(changes)) => {
            let mut map: Map = (**base).clone();
            for (key, change) in changes.iter() {
                let merged = match map.get(key) {
                    Some(existing) => merge(existing, change),
                    None => change.clone(),
                };
                map.insert(key.clone(), merged);
            }
            Value::from_map(map)
        }
        (_, patch) => patch.clone(),
    }
}

fn write(node: &mut Value, steps: &[Step], value: Option<Value>) {
    let Some((step, rest)) = steps.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    let replacement = match (&*node, step) {
        (Value::Object(_), _) => None,
        (Value::Array(items), Step::Index(index))
            if index.saturating_sub(items.len()) > MAX_INDEX_GAP =>
        {
            Some(index_keyed(items))
        }
        (Value::Array(_), Step::Index(_)) => None,
        _ => Some(Value::object()),
    };
    if let Some(replacement) = replacement {
        *node = replacement;
    }

    match node {
        Value::Object(map) => {
            let key = step.to_string();
            let map = Arc::make_mut(map);
            if rest.is_empty() {
                match value {
                    Some(value) => {
                        map.insert(key, value);
                    }
                    None => {
                        map.shift_remove(&key);
                    }
                }
                return;
            }
            let child = map.entry(key).or_insert(Value::Null);
            write(child, rest, value);
        }
        Value::Array(items) => {
            let Step::Index(index) = step else {
                return;
            };
            let items = Arc::make_mut(items);
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            write(&mut items[*index], rest, value);
        }
        _ => {}
    }
}

fn index_keyed(items: &[Value]) -> Value {
    Value::from_map(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item.clone()))
            .collect(),
    )
}
