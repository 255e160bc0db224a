use super::{resolve, ConfigFile};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use stagesync_document::{FieldDecl, Path};
use stagesync_editor::{codec_for_path, ActiveView, ChangeOutcome, SyncCoordinator};
use stagesync_preview::ManualScheduler;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct DefaultsArgs {
    /// Experiment config file (.yaml, .yml or .json)
    pub file: PathBuf,

    /// JSON list of field declarations: `[{"key": "title", "default": "Untitled"}]`
    pub fields: PathBuf,

    /// Apply to one element of a list instead of the whole document,
    /// e.g. `phases[0].stages`
    #[arg(long, requires = "index")]
    pub collection: Option<String>,

    /// Index of the element within `--collection`
    #[arg(long)]
    pub index: Option<usize>,

    /// Print the result instead of writing the file
    #[arg(long)]
    pub dry_run: bool,
}

pub fn defaults(args: DefaultsArgs, cwd: &str) -> Result<()> {
    let file = ConfigFile::read(resolve(cwd, &args.file))?;
    let fields = load_fields(&resolve(cwd, &args.fields))?;
    let view = match (&args.collection, args.index) {
        (Some(collection), Some(index)) => ActiveView::item(Path::parse(collection)?, index),
        _ => ActiveView::Whole,
    };

    match fill(&file, &fields, view)? {
        Some(text) if args.dry_run => print!("{}", text),
        Some(text) => {
            std::fs::write(&file.path, text)?;
            println!("  {} Defaults applied to {}", "✓".green(), file.path.display());
        }
        None => println!("{}", "Nothing to fill, all defaults present".dimmed()),
    }
    Ok(())
}

fn load_fields(path: &std::path::Path) -> Result<Vec<FieldDecl>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid field declarations in {}", path.display()))
}

/// New file contents, or `None` when every default is already present
fn fill(file: &ConfigFile, fields: &[FieldDecl], view: ActiveView) -> Result<Option<String>> {
    let mut coordinator = SyncCoordinator::new(
        codec_for_path(&file.path),
        Arc::new(ManualScheduler::new()),
        file.source.clone(),
    );
    if let Some(e) = coordinator.parse_error() {
        return Err(anyhow!("Cannot parse {}: {}", file.path.display(), e));
    }
    coordinator.set_view(view);

    match coordinator.apply_defaults(fields)? {
        ChangeOutcome::Applied => Ok(Some(coordinator.source().to_string())),
        ChangeOutcome::Unchanged => Ok(None),
        other => Err(anyhow!("Defaults not applied ({:?})", other)),
    }
}
