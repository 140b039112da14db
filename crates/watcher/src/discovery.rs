//! Snapshot discovery of a directory tree
//!
//! Walks the tree with an explicit stack. Symlinks are not followed, so the
//! walk cannot loop. A directory that cannot be listed is recorded and its
//! subtree skipped; siblings are still walked.

use crate::error::WatchError;
use crate::ignore::IgnoreRules;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of one discovery walk
#[derive(Debug, Default)]
pub struct Discovery {
    /// Directories to watch, root first
    pub directories: Vec<PathBuf>,
    /// Directories whose children could not be listed
    pub skipped: Vec<WatchError>,
    /// Directories left out by exclusion rules
    pub pruned: Vec<PathBuf>,
}

impl Discovery {
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// Enumerate `root` and every directory beneath it
///
/// The root is always included, even when it cannot be listed; whether it
/// can actually be watched is decided when its watch is started.
pub fn discover(root: &Path, rules: Option<&IgnoreRules>) -> Discovery {
    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if !seen.insert(dir.clone()) {
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) => {
                debug!("Skipping subtree of {}: {}", dir.display(), source);
                discovery.skipped.push(WatchError::Listing {
                    path: dir.clone(),
                    source,
                });
                discovery.directories.push(dir);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    debug!("Failed to read entry in {}: {}", dir.display(), source);
                    continue;
                }
            };

            // file_type() does not follow symlinks
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            // read_dir never yields these, but the invariant is cheap to keep
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let child = entry.path();
            if rules.is_some_and(|rules| rules.is_excluded(&child, true)) {
                discovery.pruned.push(child);
                continue;
            }

            stack.push(child);
        }

        discovery.directories.push(dir);
    }

    discovery
}
