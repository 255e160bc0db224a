use super::{resolve, ConfigFile};
use anyhow::{anyhow, Result};
use clap::Args;
use stagesync_document::{model, Path, Value};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Experiment config file (.yaml, .yml or .json)
    pub file: PathBuf,

    /// Path to read, e.g. `phases[0].stages[1].title`; omit for everything
    #[arg(default_value = "")]
    pub path: String,

    /// Print on one line
    #[arg(long)]
    pub compact: bool,
}

pub fn get(args: GetArgs, cwd: &str) -> Result<()> {
    let value = lookup(&resolve(cwd, &args.file), &args.path)?;
    let text = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{}", text);
    Ok(())
}

pub fn lookup(file: &std::path::Path, path: &str) -> Result<Value> {
    let doc = ConfigFile::read(file.to_path_buf())?.decode()?;
    let path = Path::parse(path)?;
    model::get(&doc, &path)
        .cloned()
        .ok_or_else(|| anyhow!("Nothing at {} in {}", display_path(&path), file.display()))
}

fn display_path(path: &Path) -> String {
    if path.is_root() {
        "the root".to_string()
    } else {
        path.to_string()
    }
}
