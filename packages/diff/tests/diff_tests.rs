//! Diff and classification over whole experiment documents

use serde_json::json;
use stagesync_diff::{compute_changed_paths, detect_structural_change};
use stagesync_document::{model, Path, Value};

fn experiment() -> Value {
    Value::from(json!({
        "meta": {"id": "exp-1", "title": "Reaction times"},
        "settings": {"timing": {"fixation_ms": 500}, "theme": "light"},
        "phases": [
            {
                "id": "main",
                "stages": [
                    {
                        "id": "block-stage",
                        "blocks": [
                            {"id": "b1", "tasks": [{"id": "t1", "type": "likert_scale", "label": "Rate"}]}
                        ]
                    }
                ]
            }
        ]
    }))
}

#[test]
fn test_every_single_leaf_edit_reports_exactly_that_path() {
    let doc = experiment();
    let leaves = [
        "meta.title",
        "settings.timing.fixation_ms",
        "settings.theme",
        "phases[0].stages[0].blocks[0].tasks[0].label",
        "phases[0].stages[0].blocks[0].tasks[0].type",
    ];

    for leaf in leaves {
        let path = Path::parse(leaf).unwrap();
        let edited = model::set(&doc, &path, Value::from("changed"));
        let changes = compute_changed_paths(Some(&doc), &edited, &Path::root());
        assert_eq!(changes.to_strings(), vec![leaf.to_string()], "edit at {leaf}");
    }
}

#[test]
fn test_task_level_changes_classified() {
    let doc = experiment();

    let relabel = model::set(
        &doc,
        &Path::parse("phases[0].stages[0].blocks[0].tasks[0].label").unwrap(),
        Value::from("Rate again"),
    );
    let changes = compute_changed_paths(Some(&doc), &relabel, &Path::root());
    assert!(!detect_structural_change(Some(&doc), &relabel, &changes));

    let add_task = model::set(
        &doc,
        &Path::parse("phases[0].stages[0].blocks[0].tasks[1]").unwrap(),
        Value::from(json!({"label": "Second"})),
    );
    let changes = compute_changed_paths(Some(&doc), &add_task, &Path::root());
    assert_eq!(
        changes.to_strings(),
        vec!["phases[0].stages[0].blocks[0].tasks"]
    );
    assert!(detect_structural_change(Some(&doc), &add_task, &changes));
}

#[test]
fn test_phase_removed_is_structural_via_cardinality() {
    let old = Value::from(json!({"phases": [{"title": "x"}, {"title": "y"}]}));
    let new = Value::from(json!({"phases": [{"title": "x"}]}));
    let changes = compute_changed_paths(Some(&old), &new, &Path::root());
    assert_eq!(changes.to_strings(), vec!["phases"]);
    assert!(detect_structural_change(Some(&old), &new, &changes));
}

#[test]
fn test_changeset_serializes_as_strings() {
    let changes = compute_changed_paths(None, &experiment(), &Path::root());
    assert_eq!(serde_json::to_value(&changes).unwrap(), json!(["root"]));
}

fn documents() -> Vec<Value> {
    vec![
        experiment(),
        Value::from(json!({
            "stages": [
                {"id": "s1", "type": "consent_form", "required": true},
                {"id": "s2", "type": "questionnaire", "questions": ["Age?", "Mood?"]}
            ],
            "ordering": "fixed"
        })),
        Value::from(json!({
            "grid": [{"x": 1, "y": 2}, {"x": 3, "y": 4}],
            "flags": {"debug": false, "seed": null, "ratio": 0.25},
            "tags": ["a", "b", "c"]
        })),
        Value::from(json!({
            "meta": {"a.id": "dotted", "x[0]": "bracketed", "": "empty", "say \"hi\"": 1},
            "settings": {"theme.type": "dark"}
        })),
        Value::object(),
    ]
}

/// Every path ending at a scalar, in document order
fn leaf_paths(value: &Value, path: &Path, out: &mut Vec<Path>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter() {
                leaf_paths(child, &path.key(key.as_str()), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                leaf_paths(child, &path.index(i), out);
            }
        }
        _ => out.push(path.clone()),
    }
}

#[test]
fn test_unchanged_documents_have_no_changes() {
    for doc in documents() {
        assert!(compute_changed_paths(Some(&doc), &doc, &Path::root()).is_empty());

        // Freshly allocated copy, so nothing is shared
        let copy = Value::from(serde_json::Value::from(&doc));
        let changes = compute_changed_paths(Some(&doc), &copy, &Path::root());
        assert!(changes.is_empty(), "{changes}");
        assert!(!detect_structural_change(Some(&doc), &copy, &changes));
    }
}

#[test]
fn test_single_leaf_edits_report_exactly_their_path() {
    for doc in documents() {
        let mut leaves = Vec::new();
        leaf_paths(&doc, &Path::root(), &mut leaves);

        for leaf in leaves {
            let edited = model::set(&doc, &leaf, Value::from(format!("edited {leaf}")));
            let changes = compute_changed_paths(Some(&doc), &edited, &Path::root());
            assert_eq!(changes.to_strings(), vec![leaf.to_string()], "edit at {leaf}");

            // The printed path leads back to the edited node
            let reparsed = Path::parse(&leaf.to_string()).unwrap();
            assert_eq!(model::get(&edited, &reparsed), model::get(&edited, &leaf));
        }
    }
}

#[test]
fn test_keys_with_separators_are_not_structural() {
    let doc = Value::from(json!({"meta": {"a.id": "x"}, "theme.type": "light"}));

    for (path, printed) in [
        (Path::root().key("meta").key("a.id"), r#"meta["a.id"]"#),
        (Path::root().key("theme.type"), r#"["theme.type"]"#),
    ] {
        let edited = model::set(&doc, &path, Value::from("y"));
        let changes = compute_changed_paths(Some(&doc), &edited, &Path::root());
        assert_eq!(changes.to_strings(), vec![printed.to_string()]);
        assert!(!detect_structural_change(Some(&doc), &edited, &changes));
    }
}
