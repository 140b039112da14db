//! Configuration command
//!
//! Shows the effective configuration, its location, or an example file.

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use tree_watcher::config::{MAX_READ_BUFFER, MIN_READ_BUFFER};
use tree_watcher::WatcherConfig;

/// Print the effective configuration
pub async fn run_show(explicit: Option<&Path>) -> Result<()> {
    let config = util::load_config(explicit)?;
    let location = explicit
        .map(Path::to_path_buf)
        .or_else(util::default_config_path);

    println!("{}", "Configuration".bold());
    match &location {
        Some(path) if path.exists() => {
            println!("{}: {}\n", "Location".dimmed(), path.display().dimmed())
        }
        _ => println!("{}\n", "Using built-in defaults".dimmed()),
    }

    print!("{}", config.to_toml_string()?);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  read_buffer: {}-{} bytes", MIN_READ_BUFFER, MAX_READ_BUFFER);
    println!("  mask: any of all, changes, none or kind names joined with '|'");

    Ok(())
}

/// Print the configuration file path
pub async fn run_path(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => util::default_config_path().context("Could not determine config file path")?,
    };

    println!("{}", path.display());
    if !path.exists() {
        println!(
            "{}",
            "File does not exist. Use --example to generate one.".yellow()
        );
    }

    Ok(())
}

/// Print an example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", WatcherConfig::example());
    Ok(())
}
