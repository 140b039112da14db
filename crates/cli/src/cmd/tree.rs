//! Tree command
//!
//! Runs discovery only and reports which directories a watch would cover.

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tree_watcher::{RecursiveTreeWatcher, WatcherConfig};

#[derive(Serialize)]
struct Report {
    root: PathBuf,
    directories: Vec<String>,
    skipped: Vec<Skipped>,
    pruned: Vec<String>,
}

#[derive(Serialize)]
struct Skipped {
    path: String,
    error: String,
}

pub async fn run(root: &Path, config: WatcherConfig, json: bool) -> Result<()> {
    let canonical = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let watcher =
        RecursiveTreeWatcher::with_config(&canonical, config).context("Invalid configuration")?;
    let discovery = watcher
        .discover()
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    let relative = |path: &Path| util::display_path(path.strip_prefix(&canonical).unwrap_or(path));

    let mut directories: Vec<String> = discovery.directories.iter().map(|d| relative(d.as_path())).collect();
    directories.sort();
    let mut pruned: Vec<String> = discovery.pruned.iter().map(|d| relative(d.as_path())).collect();
    pruned.sort();
    let skipped: Vec<Skipped> = discovery
        .skipped
        .iter()
        .map(|error| Skipped {
            path: error.path().map(|p| relative(p)).unwrap_or_default(),
            error: error.to_string(),
        })
        .collect();

    if json {
        let report = Report {
            root: canonical,
            directories,
            skipped,
            pruned,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", canonical.display().bold());
    for dir in &directories {
        println!("  {}", dir);
    }
    for dir in &pruned {
        println!("  {} {}", dir.dimmed(), "(excluded)".dimmed());
    }
    for skipped in &skipped {
        println!("  {} {}", skipped.path.yellow(), "(not listable)".yellow());
    }

    println!(
        "\n{} directories, {} excluded, {} not listable",
        directories.len(),
        pruned.len(),
        skipped.len()
    );

    Ok(())
}
