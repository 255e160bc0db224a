//! # Schema Defaults
//!
//! Given a forest of field declarations, compute the patch that fills in every
//! declared default missing from a document. Only absent keys count as
//! missing; an explicit `false`, `0`, `""` or `null` is left alone.
//!
//! The patch is shaped for [`crate::model::merge`]: nested objects carry only
//! their missing keys, arrays are rebuilt whole.

use crate::model::merge;
use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};

/// A declared field of the editing schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Key relative to the enclosing object
    pub key: String,

    /// Value injected when the key is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Nested declarations for object-typed fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDecl>,

    /// Per-element declarations for array-typed fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<FieldDecl>,
}

impl FieldDecl {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldDecl>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_items(mut self, items: Vec<FieldDecl>) -> Self {
        self.items = items;
        self
    }
}

/// Compute the defaults patch for `data`, or `None` when nothing is missing
pub fn resolve_defaults(data: &Value, fields: &[FieldDecl]) -> Option<Value> {
    let mut patch = Map::new();

    for field in fields {
        match data.get(&field.key) {
            None => {
                if let Some(default) = &field.default {
                    patch.insert(field.key.clone(), default.clone());
                }
            }
            Some(current @ Value::Object(_)) if !field.fields.is_empty() => {
                if let Some(nested) = resolve_defaults(current, &field.fields) {
                    patch.insert(field.key.clone(), nested);
                }
            }
            Some(Value::Array(elements)) if !field.items.is_empty() => {
                if let Some(rebuilt) = resolve_elements(elements, &field.items) {
                    patch.insert(field.key.clone(), rebuilt);
                }
            }
            Some(_) => {}
        }
    }

    if patch.is_empty() {
        None
    } else {
        Some(Value::from_map(patch))
    }
}

fn resolve_elements(elements: &[Value], items: &[FieldDecl]) -> Option<Value> {
    let mut changed = false;
    let rebuilt: Vec<Value> = elements
        .iter()
        .map(|element| {
            if !element.is_object() {
                return element.clone();
            }
            match resolve_defaults(element, items) {
                Some(patch) => {
                    changed = true;
                    merge(element, &patch)
                }
                None => element.clone(),
            }
        })
        .collect();

    changed.then(|| Value::from_vec(rebuilt))
}
