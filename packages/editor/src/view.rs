//! # Active View
//!
//! Which part of the config a form is currently editing. Edits arrive
//! relative to the view's data and are reassembled into the full document.
//!
//! ```text
//! Whole                          → the document itself
//! Settings { collection: "phases" } → every top-level key but `phases`
//! Item { "phases[0].stages", 2 } → document.phases[0].stages[2]
//! ```

use crate::errors::SyncError;
use stagesync_document::{model, Map, Path, Value};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    Whole,

    /// Top-level settings, leaving the named collection out
    Settings { collection: String },

    /// One element of the list at `collection`
    Item { collection: Path, index: usize },
}

impl ActiveView {
    pub fn settings(collection: impl Into<String>) -> Self {
        ActiveView::Settings {
            collection: collection.into(),
        }
    }

    pub fn item(collection: Path, index: usize) -> Self {
        ActiveView::Item { collection, index }
    }

    /// Data shown for this view, `None` when the document doesn't have it
    pub fn project(&self, doc: &Value) -> Option<Value> {
        match self {
            ActiveView::Whole => Some(doc.clone()),
            ActiveView::Settings { collection } => {
                let map = doc.as_object()?;
                Some(Value::from_map(
                    map.iter()
                        .filter(|(key, _)| *key != collection)
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                ))
            }
            ActiveView::Item { collection, index } => {
                model::get(doc, collection)?.as_array()?.get(*index).cloned()
            }
        }
    }

    /// Put edited view `data` back into `doc`
    pub fn reassemble(&self, doc: &Value, data: Value) -> Result<Value, SyncError> {
        match self {
            ActiveView::Whole => Ok(data),
            ActiveView::Settings { collection } => {
                let edited = data.as_object().ok_or(SyncError::NotAnObject(data.kind()))?;
                let original = doc.as_object().cloned().unwrap_or_default();

                // Original key order first, keys new to the view after
                let mut out = Map::with_capacity(edited.len() + 1);
                for (key, value) in original.iter() {
                    if key == collection {
                        out.insert(key.clone(), value.clone());
                    } else if let Some(value) = edited.get(key) {
                        out.insert(key.clone(), value.clone());
                    }
                }
                for (key, value) in edited.iter() {
                    if key != collection && !out.contains_key(key) {
                        out.insert(key.clone(), value.clone());
                    }
                }
                Ok(Value::from_map(out))
            }
            ActiveView::Item { collection, index } => {
                let items = model::get(doc, collection)
                    .and_then(Value::as_array)
                    .ok_or_else(|| SyncError::NotACollection {
                        collection: collection.to_string(),
                    })?;
                if *index >= items.len() {
                    return Err(SyncError::ItemOutOfRange {
                        collection: collection.to_string(),
                        index: *index,
                        len: items.len(),
                    });
                }
                Ok(model::set(doc, &collection.index(*index), data))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        Value::from(json!({
            "name": "Survey",
            "phases": [{"id": "p1", "stages": [{"id": "s1"}, {"id": "s2"}]}],
            "meta": {"owner": "lab"}
        }))
    }

    #[test]
    fn test_settings_projection_hides_collection() {
        let data = ActiveView::settings("phases").project(&doc()).unwrap();
        assert_eq!(data, Value::from(json!({"name": "Survey", "meta": {"owner": "lab"}})));
    }

    #[test]
    fn test_settings_reassembly_keeps_key_order() {
        let view = ActiveView::settings("phases");
        let data = Value::from(json!({"meta": {"owner": "lab"}, "name": "Renamed", "tags": []}));
        let out = view.reassemble(&doc(), data).unwrap();

        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "phases", "meta", "tags"]);
        assert_eq!(out.get("phases"), doc().get("phases"));
    }

    #[test]
    fn test_settings_reassembly_drops_removed_keys() {
        let view = ActiveView::settings("phases");
        let out = view.reassemble(&doc(), Value::from(json!({"name": "Survey"}))).unwrap();
        assert_eq!(out.get("meta"), None);
        assert!(out.get("phases").is_some());
    }

    #[test]
    fn test_item_projection_and_reassembly() {
        let view = ActiveView::item(Path::parse("phases[0].stages").unwrap(), 1);
        let data = view.project(&doc()).unwrap();
        assert_eq!(data, Value::from(json!({"id": "s2"})));

        let out = view
            .reassemble(&doc(), Value::from(json!({"id": "s2", "title": "B"})))
            .unwrap();
        assert_eq!(
            model::get(&out, &Path::parse("phases[0].stages[1].title").unwrap()),
            Some(&Value::from("B"))
        );
    }

    #[test]
    fn test_item_out_of_range() {
        let view = ActiveView::item(Path::parse("phases[0].stages").unwrap(), 5);
        assert_eq!(view.project(&doc()), None);
        assert!(matches!(
            view.reassemble(&doc(), Value::object()),
            Err(SyncError::ItemOutOfRange { index: 5, len: 2, .. })
        ));

        let missing = ActiveView::item(Path::parse("blocks").unwrap(), 0);
        assert!(matches!(
            missing.reassemble(&doc(), Value::object()),
            Err(SyncError::NotACollection { .. })
        ));
    }
}
