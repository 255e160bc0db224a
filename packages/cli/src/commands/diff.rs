use super::{resolve, ConfigFile};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use stagesync_diff::{compute_changed_paths, detect_structural_change, ChangeSet};
use stagesync_document::{model, Path};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Previous revision
    pub old: PathBuf,

    /// New revision
    pub new: PathBuf,

    /// Only compare below this path
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub changed_paths: ChangeSet,
    pub is_structural_change: bool,
}

pub fn diff(args: DiffArgs, cwd: &str) -> Result<()> {
    let report = compare(&resolve(cwd, &args.old), &resolve(cwd, &args.new), &args.prefix)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.changed_paths.is_empty() {
        println!("{}", "No changes".dimmed());
        return Ok(());
    }
    for path in report.changed_paths.to_strings() {
        println!("  {} {}", "~".yellow(), path);
    }
    println!();
    if report.is_structural_change {
        println!("{} structural change, preview reloads", "⟳".bright_blue().bold());
    } else {
        println!("{} content change, patched in place", "✓".green());
    }
    Ok(())
}

pub fn compare(old: &std::path::Path, new: &std::path::Path, prefix: &str) -> Result<DiffReport> {
    let old = ConfigFile::read(old.to_path_buf())?.decode()?;
    let new = ConfigFile::read(new.to_path_buf())?.decode()?;
    let prefix = Path::parse(prefix)?;

    let scope_old = model::get(&old, &prefix);
    let scope_new = model::get(&new, &prefix).cloned().unwrap_or_default();
    let changed_paths = compute_changed_paths(scope_old, &scope_new, &prefix);
    let is_structural_change = detect_structural_change(Some(&old), &new, &changed_paths);

    Ok(DiffReport {
        changed_paths,
        is_structural_change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_compare_content_and_structure() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(
            &dir,
            "old.yaml",
            "phases:\n- id: p1\n  stages:\n  - id: s1\n    title: A\n",
        );
        let retitled = write(
            &dir,
            "retitled.yaml",
            "phases:\n- id: p1\n  stages:\n  - id: s1\n    title: B\n",
        );
        let added = write(
            &dir,
            "added.json",
            r#"{"phases": [{"id": "p1", "stages": [{"id": "s1", "title": "A"}, {"id": "s2"}]}]}"#,
        );

        let report = compare(&old, &retitled, "").unwrap();
        assert_eq!(report.changed_paths.to_strings(), vec!["phases[0].stages[0].title"]);
        assert!(!report.is_structural_change);

        let report = compare(&old, &added, "").unwrap();
        assert_eq!(report.changed_paths.to_strings(), vec!["phases[0].stages"]);
        assert!(report.is_structural_change);

        let report = compare(&old, &old, "").unwrap();
        assert!(report.changed_paths.is_empty());
    }

    #[test]
    fn test_compare_below_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(&dir, "old.json", r#"{"a": {"x": 1}, "b": 1}"#);
        let new = write(&dir, "new.json", r#"{"a": {"x": 2}, "b": 2}"#);

        let report = compare(&old, &new, "a").unwrap();
        assert_eq!(report.changed_paths.to_strings(), vec!["a.x"]);
    }

    #[test]
    fn test_report_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(&dir, "old.json", r#"{"a": 1}"#);
        let new = write(&dir, "new.json", r#"{"a": 2}"#);

        let report = compare(&old, &new, "").unwrap();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"changedPaths": ["a"], "isStructuralChange": false})
        );
    }
}
