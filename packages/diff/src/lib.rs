//! # Stagesync Diff
//!
//! Decides *what changed* between two config revisions and whether the
//! preview can patch the change in place.
//!
//! ```text
//! old, new ──▶ compute_changed_paths ──▶ ChangeSet
//!                                           │
//!                  detect_structural_change ◀┘──▶ reload | live patch
//! ```

pub mod classify;
pub mod diff;

pub use classify::{detect_structural_change, StructuralPatterns, DEFAULT_PATTERNS};
pub use diff::{compute_changed_paths, ChangeSet, ROOT};
