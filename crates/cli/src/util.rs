//! Shared utilities for CLI commands

use crate::FilterArgs;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tree_watcher::{BackendKind, EventKind, WatchEvent, WatchMask, WatcherConfig};

const CONFIG_DIR: &str = "treewatch";
const CONFIG_FILE: &str = "config.toml";

/// Default configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the effective configuration
///
/// An explicit path must exist. The default location is optional; without
/// it the built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<WatcherConfig> {
    if let Some(path) = explicit {
        return WatcherConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => WatcherConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(WatcherConfig::default()),
    }
}

/// Apply command-line flags on top of the loaded configuration
pub fn apply_overrides(
    config: &mut WatcherConfig,
    mask: Option<WatchMask>,
    backend: Option<BackendKind>,
    filter: &FilterArgs,
) {
    if let Some(mask) = mask {
        config.mask = mask;
    }
    if let Some(backend) = backend {
        config.backend = backend;
    }
    if filter.gitignore {
        config.ignore.use_gitignore = true;
    }
    config
        .ignore
        .additional_patterns
        .extend(filter.exclude.iter().cloned());
}

/// Display form of a root-relative path ("." for the root)
pub fn display_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.display().to_string()
    }
}

fn colored_kind(kind: EventKind) -> String {
    let label = format!("{:<13}", kind.as_str());
    match kind {
        EventKind::Create | EventKind::MovedTo => label.green().to_string(),
        EventKind::Delete | EventKind::DeleteSelf => label.red().to_string(),
        EventKind::MovedFrom | EventKind::MoveSelf => label.yellow().to_string(),
        EventKind::CloseWrite | EventKind::Modify => label.cyan().to_string(),
        _ => label.dimmed().to_string(),
    }
}

/// One line of human-readable output for an event
pub fn format_event(event: &WatchEvent, timestamp: Option<&str>) -> String {
    let mut line = String::new();

    if let Some(timestamp) = timestamp {
        line.push_str(&timestamp.dimmed().to_string());
        line.push(' ');
    }

    line.push_str(&colored_kind(event.kind));
    line.push(' ');
    line.push_str(&display_path(&event.path));
    if event.is_dir && !event.path.as_os_str().is_empty() {
        line.push('/');
    }
    if let Some(cookie) = event.cookie {
        line.push_str(&format!(" {}", format!("(cookie {cookie})").dimmed()));
    }

    line
}

/// Current local time for event prefixes
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_root() {
        assert_eq!(display_path(Path::new("")), ".");
        assert_eq!(display_path(Path::new("b/x.txt")), "b/x.txt");
    }

    #[test]
    fn test_overrides_extend_patterns() {
        let mut config = WatcherConfig::default();
        config.ignore.additional_patterns.push("target/".to_string());

        let filter = FilterArgs {
            exclude: vec!["*.tmp".to_string()],
            gitignore: true,
        };
        apply_overrides(
            &mut config,
            Some(tree_watcher::CHANGES_ONLY),
            Some(BackendKind::Portable),
            &filter,
        );

        assert_eq!(config.mask, tree_watcher::CHANGES_ONLY);
        assert_eq!(config.backend, BackendKind::Portable);
        assert!(config.ignore.use_gitignore);
        assert_eq!(config.ignore.additional_patterns, vec!["target/", "*.tmp"]);
    }

    #[test]
    fn test_format_event_contains_path_and_kind() {
        let event = WatchEvent {
            kind: EventKind::CloseWrite,
            path: PathBuf::from("b/x.txt"),
            is_dir: false,
            cookie: None,
        };
        let line = format_event(&event, None);
        assert!(line.contains("close_write"));
        assert!(line.ends_with("b/x.txt"));
    }

    #[test]
    fn test_format_directory_event_has_trailing_slash() {
        let event = WatchEvent {
            kind: EventKind::Create,
            path: PathBuf::from("new"),
            is_dir: true,
            cookie: None,
        };
        assert!(format_event(&event, None).ends_with("new/"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/treewatch.toml"))).is_err());
    }
}
