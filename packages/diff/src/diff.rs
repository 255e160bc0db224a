//! Changed-path diffing between two document revisions.
//!
//! The diff is structural, not semantic. Arrays of different length are
//! reported as one changed path; arrays of equal length are paired by index,
//! so a reorder only shows up where paired values differ.

use serde::{Serialize, Serializer};
use stagesync_document::{Path, Value};
use std::collections::HashSet;
use std::fmt;

/// Name a change set uses for the document root
pub const ROOT: &str = "root";

/// Ordered set of paths whose values differ between two revisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<Path>,
    seen: HashSet<Path>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path, keeping first-insertion order
    pub fn insert(&mut self, path: Path) -> bool {
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    /// Canonical text of every path, the root spelled as [`ROOT`]
    pub fn to_strings(&self) -> Vec<String> {
        self.paths.iter().map(render).collect()
    }
}

impl FromIterator<Path> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        let mut set = ChangeSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strings().join(", "))
    }
}

fn render(path: &Path) -> String {
    if path.is_root() {
        ROOT.to_string()
    } else {
        path.to_string()
    }
}

/// Compute the changed paths between `old` and `new` below `prefix`.
///
/// With no previous revision everything counts as changed and the result is
/// the single path `prefix` (the root when `prefix` is empty).
pub fn compute_changed_paths(old: Option<&Value>, new: &Value, prefix: &Path) -> ChangeSet {
    let mut changes = ChangeSet::new();
    match old {
        None => {
            changes.insert(prefix.clone());
        }
        Some(old) => diff_values(old, new, prefix, &mut changes),
    }
    changes
}

fn diff_values(old: &Value, new: &Value, path: &Path, out: &mut ChangeSet) {
    if old.same(new) {
        return;
    }

    match (old, new) {
        (Value::Object(before), Value::Object(after)) => {
            let keys = before
                .keys()
                .chain(after.keys().filter(|key| !before.contains_key(*key)));
            for key in keys {
                match (before.get(key), after.get(key)) {
                    (Some(a), Some(b)) => diff_values(a, b, &path.key(key.as_str()), out),
                    _ => {
                        out.insert(path.key(key.as_str()));
                    }
                }
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            if before.len() != after.len() {
                out.insert(path.clone());
                return;
            }
            for (i, (a, b)) in before.iter().zip(after.iter()).enumerate() {
                if a.is_object() && b.is_object() {
                    diff_values(a, b, &path.index(i), out);
                } else if !a.same(b) {
                    out.insert(path.index(i));
                }
            }
        }
        _ => {
            out.insert(path.clone());
        }
    }
}
