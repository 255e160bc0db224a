pub mod defaults;
pub mod diff;
pub mod get;
pub mod set;
pub mod watch;

pub use defaults::{defaults, DefaultsArgs};
pub use diff::{diff, DiffArgs};
pub use get::{get, GetArgs};
pub use set::{set, SetArgs};
pub use watch::{watch, WatchArgs};

use anyhow::{Context, Result};
use stagesync_document::Value;
use stagesync_editor::{codec_for_path, TextCodec};
use std::path::{Path, PathBuf};

/// Resolve `file` against the working directory
pub fn resolve(cwd: &str, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        PathBuf::from(cwd).join(file)
    }
}

/// A config file on disk with the codec its extension calls for
pub struct ConfigFile {
    pub path: PathBuf,
    pub codec: Box<dyn TextCodec>,
    pub source: String,
}

impl ConfigFile {
    pub fn read(path: PathBuf) -> Result<Self> {
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        Ok(Self {
            codec: codec_for_path(&path),
            path,
            source,
        })
    }

    pub fn decode(&self) -> Result<Value> {
        self.codec
            .decode(&self.source)
            .with_context(|| format!("Cannot parse {}", self.path.display()))
    }
}

/// Interpret a command-line value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}
