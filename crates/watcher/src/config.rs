//! Watcher configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid:
//!
//! ```toml
//! mask = "close_write | moved_from | move_self"
//! backend = "auto"
//! read_buffer = 4096
//!
//! [ignore]
//! use_gitignore = false
//! additional_patterns = ["target/"]
//! ```

use crate::error::{Result, WatchError};
use crate::ignore::IgnoreConfig;
use crate::mask::{WatchMask, CHANGES_ONLY};
use crate::platform::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bounds for the inotify read buffer, in bytes
pub const MIN_READ_BUFFER: usize = 1024;
pub const MAX_READ_BUFFER: usize = 1024 * 1024;
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// Settings for a [`RecursiveTreeWatcher`](crate::RecursiveTreeWatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Event kinds to deliver
    pub mask: WatchMask,

    /// Native backend
    pub backend: BackendKind,

    /// inotify read buffer size in bytes (1KiB..=1MiB)
    pub read_buffer: usize,

    /// Exclusion rules (none by default)
    pub ignore: IgnoreConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mask: WatchMask::all(),
            backend: BackendKind::Auto,
            read_buffer: DEFAULT_READ_BUFFER,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl WatcherConfig {
    /// Default configuration with a specific mask
    pub fn with_mask(mask: WatchMask) -> Self {
        Self {
            mask,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| WatchError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WatchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            WatchError::Config(message) => {
                WatchError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WatchError::Config(e.to_string()))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.mask.is_empty() {
            return Err(WatchError::Config(
                "mask selects no event kinds".to_string(),
            ));
        }

        if !(MIN_READ_BUFFER..=MAX_READ_BUFFER).contains(&self.read_buffer) {
            return Err(WatchError::Config(format!(
                "read_buffer must be between {} and {} bytes, got {}",
                MIN_READ_BUFFER, MAX_READ_BUFFER, self.read_buffer
            )));
        }

        if self.ignore.additional_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(WatchError::Config(
                "ignore.additional_patterns contains an empty pattern".to_string(),
            ));
        }

        Ok(())
    }

    /// Commented example configuration
    pub fn example() -> String {
        format!(
            r#"# treewatch configuration

# Event kinds to report. Names are joined with '|'; "all" and "changes"
# (close_write | moved_from | move_self) are shorthands.
mask = "{changes}"

# Notification backend: "auto", "inotify" (Linux) or "portable"
backend = "auto"

# inotify read buffer in bytes ({min}..={max})
read_buffer = {buffer}

[ignore]
# Honor the root's .gitignore
use_gitignore = false

# Extra gitignore-style patterns
additional_patterns = []
"#,
            changes = CHANGES_ONLY,
            min = MIN_READ_BUFFER,
            max = MAX_READ_BUFFER,
            buffer = DEFAULT_READ_BUFFER,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = WatcherConfig::from_toml_str("").unwrap();
        assert_eq!(config, WatcherConfig::default());
        assert_eq!(config.mask, WatchMask::all());
        assert!(!config.ignore.is_active());
    }

    #[test]
    fn test_parse_full_document() {
        let config = WatcherConfig::from_toml_str(
            r#"
            mask = "changes"
            backend = "portable"
            read_buffer = 65536

            [ignore]
            use_gitignore = true
            additional_patterns = ["target/"]
            "#,
        )
        .unwrap();

        assert_eq!(config.mask, CHANGES_ONLY);
        assert_eq!(config.backend, BackendKind::Portable);
        assert_eq!(config.read_buffer, 65536);
        assert!(config.ignore.use_gitignore);
        assert_eq!(config.ignore.additional_patterns, vec!["target/"]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_buffer() {
        let config = WatcherConfig {
            read_buffer: 16,
            ..WatcherConfig::default()
        };
        assert!(matches!(config.validate(), Err(WatchError::Config(_))));

        let config = WatcherConfig {
            read_buffer: MAX_READ_BUFFER + 1,
            ..WatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_mask() {
        let err = WatcherConfig::from_toml_str(r#"mask = "none""#).unwrap_err();
        assert!(err.to_string().contains("no event kinds"));
    }

    #[test]
    fn test_unknown_backend_is_a_config_error() {
        assert!(WatcherConfig::from_toml_str(r#"backend = "kqueue""#).is_err());
    }

    #[test]
    fn test_example_parses_to_valid_config() {
        let config = WatcherConfig::from_toml_str(&WatcherConfig::example()).unwrap();
        assert_eq!(config.mask, CHANGES_ONLY);
        assert_eq!(config.read_buffer, DEFAULT_READ_BUFFER);
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let config = WatcherConfig::with_mask(CHANGES_ONLY);

        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(WatcherConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = WatcherConfig::load(Path::new("/nonexistent/treewatch.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/treewatch.toml"));
    }
}
