use super::{resolve, ConfigFile};
use crate::config::Config;
use crate::watcher::FileWatcher;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use stagesync_editor::{codec_for_path, ChangeOutcome, LiveSession, SyncCoordinator};
use stagesync_preview::{
    MemoryBus, MessageKind, PreviewChannel, PreviewEndpoint, TokioScheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Experiment config file to watch
    pub file: PathBuf,

    /// Experiment id (overrides config; defaults to the file stem)
    #[arg(short, long)]
    pub experiment: Option<String>,

    /// Preview base URL (overrides config)
    #[arg(long)]
    pub preview_url: Option<String>,

    /// Debounce in milliseconds (overrides config)
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

pub fn watch(args: WatchArgs, cwd: &str) -> Result<()> {
    let path = resolve(cwd, &args.file);
    let config = settings(Config::load(cwd)?, &args, &path);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, path))
}

/// Config file values with command-line overrides applied
fn settings(mut config: Config, args: &WatchArgs, path: &std::path::Path) -> Config {
    if let Some(experiment) = &args.experiment {
        config.channel.experiment_id = experiment.clone();
    }
    if config.channel.experiment_id.is_empty() {
        config.channel.experiment_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "experiment".to_string());
    }
    if let Some(url) = &args.preview_url {
        config.channel.preview_url = url.clone();
    }
    if let Some(ms) = args.debounce_ms {
        config.channel.debounce_ms = ms;
    }
    config
}

async fn run(config: Config, path: PathBuf) -> Result<()> {
    let file = ConfigFile::read(path.clone())?;
    let scheduler = Arc::new(TokioScheduler::try_current()?);
    let bus = MemoryBus::new();

    let channel = PreviewChannel::new(config.channel.clone(), Arc::new(bus.clone()), scheduler.clone())?;
    channel.on_state_change(|state| info!(?state, "Preview channel state"));

    let coordinator = SyncCoordinator::new(codec_for_path(&path), scheduler, file.source)
        .with_settle_window(config.settle_window());
    if let Some(e) = coordinator.parse_error() {
        eprintln!("  {} {}", "✗".red(), e.to_string().red());
    }

    let mut session = LiveSession::new(coordinator, channel);
    session.open();

    let endpoint = bus.open_peer(session.channel().preview_origin());
    session.channel().attach_peer(endpoint.peer());
    let preview = tokio::spawn(simulate_preview(endpoint, config.channel.experiment_id.clone()));

    let mut watcher = FileWatcher::new(path.clone())?;
    println!(
        "{} {} {}",
        "👀".bright_blue(),
        "Watching".bright_blue().bold(),
        path.display()
    );
    println!(
        "   Experiment {} → {}",
        config.channel.experiment_id.bright_white(),
        session.channel().preview_origin()
    );

    loop {
        tokio::select! {
            changed = watcher.changed() => {
                if changed.is_none() {
                    break;
                }
                let text = match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Cannot read watched file");
                        continue;
                    }
                };
                match session.set_source(text) {
                    ChangeOutcome::Applied => debug!("Change queued for preview"),
                    ChangeOutcome::Invalid => {
                        if let Some(e) = session.coordinator().parse_error() {
                            eprintln!("  {} {}", "✗".red(), e.to_string().red());
                        }
                    }
                    ChangeOutcome::Suppressed | ChangeOutcome::Unchanged => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close();
    // Let the preview print the goodbye before it is torn down
    tokio::time::sleep(Duration::from_millis(50)).await;
    preview.abort();
    Ok(())
}

/// Stand-in preview page that answers the handshake and prints updates
async fn simulate_preview(mut endpoint: PreviewEndpoint, experiment_id: String) {
    endpoint.reply(MessageKind::PreviewReady, &experiment_id);
    endpoint.reply(MessageKind::PreviewConnected, &experiment_id);

    while let Some(message) = endpoint.recv().await {
        match message.kind {
            MessageKind::ConfigUpdate {
                changed_paths,
                is_structural_change,
                ..
            } => {
                let verdict = if is_structural_change {
                    "reload".yellow()
                } else {
                    "patch".green()
                };
                println!("  {} preview {} {}", "⇢".bright_blue(), verdict, changed_paths.join(", "));
            }
            MessageKind::Ping => endpoint.reply(MessageKind::Pong, &experiment_id),
            MessageKind::EditorClosed => {
                println!("  {} preview saw editor close", "⇢".bright_blue());
                break;
            }
            _ => {}
        }
    }
}
