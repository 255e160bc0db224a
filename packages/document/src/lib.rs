//! # Stagesync Document
//!
//! The experiment configuration tree and everything that reads or writes it
//! by path.
//!
//! ```text
//! phases[0].stages[2].id
//!   │       │         └─ Step::Key("id")
//!   │       └─ Step::Index(2) under Step::Key("stages")
//!   └─ Step::Key("phases"), Step::Index(0)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use stagesync_document::{model, Path, Value};
//!
//! let doc = Value::object();
//! let path = Path::parse("a.b.c").unwrap();
//! let next = model::set(&doc, &path, Value::from(5));
//!
//! assert_eq!(model::get(&next, &path), Some(&Value::from(5)));
//! assert_eq!(doc, Value::object());
//! ```

pub mod defaults;
pub mod model;
pub mod path;
pub mod value;

pub use defaults::{resolve_defaults, FieldDecl};
pub use path::{Path, PathError, Step};
pub use value::{Map, Value};
