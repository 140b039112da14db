//! Exclusion rules for discovery and delivery
//!
//! Two optional sources, both gitignore syntax:
//! 1. the root's own `.gitignore` (off by default)
//! 2. patterns supplied through configuration
//!
//! With neither enabled nothing is excluded and the watch set covers every
//! directory under the root.

use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compiled exclusion rules for one root
#[derive(Debug)]
pub struct IgnoreRules {
    /// Root the patterns are anchored at
    root: PathBuf,

    /// Root `.gitignore`, when enabled and present
    gitignore: Option<Gitignore>,

    /// Patterns from configuration
    patterns: Option<Gitignore>,

    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Compile the rules for `root`
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut rules = Self {
            root: root.to_path_buf(),
            gitignore: None,
            patterns: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Rebuild from disk and configuration
    pub fn reload(&mut self) -> Result<()> {
        self.gitignore = None;
        if self.config.use_gitignore {
            let gitignore_path = self.root.join(".gitignore");
            if gitignore_path.exists() {
                let mut builder = GitignoreBuilder::new(&self.root);
                if let Some(e) = builder.add(&gitignore_path) {
                    return Err(e.into());
                }
                self.gitignore = Some(builder.build()?);
            }
        }

        self.patterns = None;
        if !self.config.additional_patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(&self.root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            self.patterns = Some(builder.build()?);
        }

        Ok(())
    }

    /// Whether `path` (relative to the root, or absolute beneath it) is
    /// excluded, either directly or through an excluded parent
    ///
    /// The root itself is never excluded.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() || relative.is_absolute() {
            return false;
        }

        [&self.patterns, &self.gitignore]
            .into_iter()
            .flatten()
            .any(|rules| {
                rules
                    .matched_path_or_any_parents(relative, is_dir)
                    .is_ignore()
            })
    }

    /// Number of active rule sources
    pub fn active_sources(&self) -> usize {
        usize::from(self.gitignore.is_some()) + usize::from(self.patterns.is_some())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Exclusion configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Honor the root's `.gitignore` (default: false)
    #[serde(default)]
    pub use_gitignore: bool,

    /// Extra gitignore-style patterns
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl IgnoreConfig {
    /// Whether any source could exclude something
    pub fn is_active(&self) -> bool {
        self.use_gitignore || !self.additional_patterns.is_empty()
    }
}
