use super::{parse_value, resolve, ConfigFile};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use stagesync_editor::{codec_for_path, ChangeOutcome, SyncCoordinator};
use stagesync_preview::ManualScheduler;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Experiment config file (.yaml, .yml or .json)
    pub file: PathBuf,

    /// Path to write, e.g. `phases[0].stages[1].title`
    pub path: String,

    /// New value as JSON; anything that isn't JSON is taken as a string
    pub value: String,

    /// Print the result instead of writing the file
    #[arg(long)]
    pub dry_run: bool,
}

pub fn set(args: SetArgs, cwd: &str) -> Result<()> {
    let file = ConfigFile::read(resolve(cwd, &args.file))?;
    let text = apply(&file, &args.path, &args.value)?;

    if args.dry_run {
        print!("{}", text);
        return Ok(());
    }

    std::fs::write(&file.path, &text)?;
    println!(
        "  {} {} = {}",
        "✓".green(),
        args.path.bright_white(),
        parse_value(&args.value)
    );
    Ok(())
}

/// Encoded file contents after the edit
fn apply(file: &ConfigFile, path: &str, raw: &str) -> Result<String> {
    let mut coordinator = SyncCoordinator::new(
        codec_for_path(&file.path),
        Arc::new(ManualScheduler::new()),
        file.source.clone(),
    );
    if let Some(e) = coordinator.parse_error() {
        return Err(anyhow!("Cannot parse {}: {}", file.path.display(), e));
    }

    match coordinator.handle_change(path, parse_value(raw))? {
        ChangeOutcome::Applied => Ok(coordinator.source().to_string()),
        other => Err(anyhow!("Edit not applied ({:?})", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::get::lookup;
    use stagesync_document::Value;

    #[test]
    fn test_set_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("exp.yaml");
        std::fs::write(&file, "name: Survey\nphases: []\n").unwrap();

        set(
            SetArgs {
                file: file.clone(),
                path: "meta.owner".into(),
                value: "lab".into(),
                dry_run: false,
            },
            "/",
        )
        .unwrap();

        assert_eq!(lookup(&file, "meta.owner").unwrap(), Value::from("lab"));
        assert_eq!(lookup(&file, "name").unwrap(), Value::from("Survey"));
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("exp.json");
        std::fs::write(&file, r#"{"a": 1}"#).unwrap();

        set(
            SetArgs {
                file: file.clone(),
                path: "a".into(),
                value: "2".into(),
                dry_run: true,
            },
            "/",
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("exp.yaml");
        std::fs::write(&file, "a: [1\n").unwrap();

        let file = ConfigFile::read(file).unwrap();
        assert!(apply(&file, "a", "2").is_err());
    }
}
