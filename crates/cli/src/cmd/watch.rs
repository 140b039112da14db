//! Watch command
//!
//! Starts a tree watcher and prints its events until Ctrl-C, or until the
//! requested number of events has been printed.

use crate::util;
use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;
use tree_watcher::{DeliveryError, EventSink, RecursiveTreeWatcher, WatchEvent, WatcherConfig};

/// How events are printed
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub count: Option<usize>,
    pub timestamps: bool,
}

enum Notice {
    Event(WatchEvent),
    Error(DeliveryError),
}

/// Hands events from the delivery thread to the async printer
struct ForwardSink(UnboundedSender<Notice>);

impl EventSink for ForwardSink {
    fn on_event(&self, event: WatchEvent) {
        let _ = self.0.send(Notice::Event(event));
    }

    fn on_error(&self, error: DeliveryError) {
        let _ = self.0.send(Notice::Error(error));
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<&'a str>,
    #[serde(flatten)]
    event: &'a WatchEvent,
}

pub async fn run(root: &Path, config: WatcherConfig, output: Output) -> Result<()> {
    if output.count == Some(0) {
        bail!("--count must be at least 1");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();

    let watcher = RecursiveTreeWatcher::with_config(root, config)
        .context("Invalid configuration")?
        .with_sink(ForwardSink(tx));
    watcher
        .start_watching()
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    eprintln!(
        "{} Watching {} ({} directories, mask: {})",
        "✓".green(),
        root.display(),
        watcher.watch_count(),
        watcher.mask()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("Interrupted");
                break;
            }
            notice = rx.recv() => match notice {
                Some(Notice::Event(event)) => {
                    print_event(&event, output)?;
                    printed += 1;
                    if output.count.is_some_and(|limit| printed >= limit) {
                        break;
                    }
                }
                Some(Notice::Error(error)) => {
                    eprintln!("{} {}", "warning:".yellow(), error);
                }
                None => break,
            },
        }
    }

    watcher.stop_watching();
    debug!("Printed {} events", printed);
    Ok(())
}

fn print_event(event: &WatchEvent, output: Output) -> Result<()> {
    let timestamp = output.timestamps.then(util::timestamp_now);

    if output.json {
        let line = JsonLine {
            time: timestamp.as_deref(),
            event,
        };
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!("{}", util::format_event(event, timestamp.as_deref()));
    }

    Ok(())
}
