//! treewatch - watch a directory tree from the command line

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tree_watcher::{BackendKind, WatchMask};

mod cmd;
mod util;

/// treewatch - Recursive directory change watcher
#[derive(Parser)]
#[command(name = "treewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Configuration file (default: $XDG_CONFIG_HOME/treewatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print events under a directory until interrupted
    Watch {
        /// Directory to watch
        root: PathBuf,

        /// Event kinds, e.g. "close_write | moved_from", "changes" or "all"
        #[arg(short, long)]
        mask: Option<WatchMask>,

        /// Notification backend (auto, inotify, portable)
        #[arg(short, long)]
        backend: Option<BackendKind>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,

        /// Exit after this many events
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Prefix events with the local time
        #[arg(short, long)]
        timestamps: bool,
    },
    /// List the directories a watch would cover
    Tree {
        /// Directory to inspect
        root: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Print an example configuration file
        #[arg(long, conflicts_with = "path")]
        example: bool,

        /// Print the configuration file location
        #[arg(long)]
        path: bool,
    },
}

/// Exclusion flags shared by `watch` and `tree`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Exclude paths matching a gitignore-style pattern (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Honor the root's .gitignore
    #[arg(long)]
    pub gitignore: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Watch {
            root,
            mask,
            backend,
            filter,
            json,
            count,
            timestamps,
        } => {
            let mut config = util::load_config(config_path)?;
            util::apply_overrides(&mut config, mask, backend, &filter);
            let output = cmd::watch::Output {
                json,
                count,
                timestamps,
            };
            cmd::watch::run(&root, config, output).await
        }
        Commands::Tree { root, filter, json } => {
            let mut config = util::load_config(config_path)?;
            util::apply_overrides(&mut config, None, None, &filter);
            cmd::tree::run(&root, config, json).await
        }
        Commands::Config { example, path } => {
            if example {
                cmd::config::run_example().await
            } else if path {
                cmd::config::run_path(config_path).await
            } else {
                cmd::config::run_show(config_path).await
            }
        }
    }
}

/// Install the tracing subscriber
///
/// The returned guard flushes the log file and must live until exit.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(directory).with_context(|| {
                format!("Failed to create log directory {}", directory.display())
            })?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
