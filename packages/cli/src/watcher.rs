use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Cannot watch {0}: no parent directory")]
    NoParent(PathBuf),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Watches one file through its directory, so editors that save by
/// replacing the file keep being seen
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    file: PathBuf,
    receiver: UnboundedReceiver<notify::Result<Event>>,
}

impl FileWatcher {
    pub fn new(file: PathBuf) -> WatcherResult<Self> {
        let dir = file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| WatcherError::NoParent(file.clone()))?;
        let (tx, rx) = unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            file,
            receiver: rx,
        })
    }

    /// Wait for the next change touching the watched file
    pub async fn changed(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) if self.concerns_file(&event) => return Some(()),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Watch error"),
            }
        }
    }

    fn concerns_file(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_)
        ) && event.paths.iter().any(|path| same_file(path, &self.file))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.file_name() == b.file_name() && a.parent() == b.parent(),
    }
}
