//! # Change Classification
//!
//! A change is *structural* when it alters the set or identity of renderable
//! units (phases, stages, blocks, tasks): the preview must rebuild its
//! navigation state. Anything else is *content* and can be patched into the
//! rendered tree in place.

use crate::diff::ChangeSet;
use regex::RegexSet;
use stagesync_document::Value;
use std::sync::OnceLock;

/// Structural path patterns, matched against canonical path text
pub const DEFAULT_PATTERNS: &[&str] = &[
    // Hierarchy slots and the arrays holding them
    r"^phases(\[\d+\])?$",
    r"^phases\[\d+\]\.stages(\[\d+\])?$",
    r"^phases\[\d+\]\.stages\[\d+\]\.blocks(\[\d+\])?$",
    r"^phases\[\d+\]\.stages\[\d+\]\.blocks\[\d+\]\.tasks(\[\d+\])?$",
    // Identity and kind of any unit
    r"\.id$",
    r"\.type$",
    // Visibility and branching rules
    r"\.rules\.",
    r"\.ordering$",
    // Flat documents without phases
    r"^stages(\[\d+\])?$",
];

/// Top-level collections whose cardinality is compared as a fallback
const COUNTED_COLLECTIONS: &[&str] = &["phases", "stages"];

#[derive(Debug, Clone)]
pub struct StructuralPatterns {
    set: RegexSet,
}

impl StructuralPatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            set: RegexSet::new(patterns)?,
        })
    }

    /// Shared instance built from [`DEFAULT_PATTERNS`]
    pub fn standard() -> &'static StructuralPatterns {
        static STANDARD: OnceLock<StructuralPatterns> = OnceLock::new();
        STANDARD.get_or_init(|| StructuralPatterns {
            set: RegexSet::new(DEFAULT_PATTERNS).expect("built-in structural patterns are valid"),
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    /// Classify using these patterns
    pub fn classify(&self, old: Option<&Value>, new: &Value, changes: &ChangeSet) -> bool {
        // Initial load has nothing to reconcile against
        let Some(old) = old else {
            return false;
        };

        if changes.to_strings().iter().any(|path| self.is_match(path)) {
            return true;
        }

        COUNTED_COLLECTIONS
            .iter()
            .any(|key| collection_len(old, key) != collection_len(new, key))
    }
}

fn collection_len(doc: &Value, key: &str) -> Option<usize> {
    doc.get(key).and_then(Value::as_array).map(<[Value]>::len)
}

/// Classify a change set with the built-in patterns
pub fn detect_structural_change(old: Option<&Value>, new: &Value, changes: &ChangeSet) -> bool {
    StructuralPatterns::standard().classify(old, new, changes)
}
