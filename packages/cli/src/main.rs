mod commands;
mod config;
mod watcher;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    defaults, diff, get, set, watch, DefaultsArgs, DiffArgs, GetArgs, SetArgs, WatchArgs,
};
use tracing_subscriber::EnvFilter;

/// Stagesync CLI - experiment config editing with a live preview
#[derive(Parser, Debug)]
#[command(name = "stagesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value at a path as JSON
    Get(GetArgs),

    /// Write a value at a path
    Set(SetArgs),

    /// Show changed paths between two revisions
    Diff(DiffArgs),

    /// Fill in declared defaults
    Defaults(DefaultsArgs),

    /// Watch a config file and stream changes to a simulated preview
    Watch(WatchArgs),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} Cannot get current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Get(args) => get(args, &cwd),
        Command::Set(args) => set(args, &cwd),
        Command::Diff(args) => diff(args, &cwd),
        Command::Defaults(args) => defaults(args, &cwd),
        Command::Watch(args) => watch(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
