//! Common utilities for integration tests

pub mod cli;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory tree plus an isolated config home
pub struct TestTree {
    root: TempDir,
    config_home: TempDir,
}

impl TestTree {
    /// Create a tree containing the given relative directories
    pub fn with_dirs(dirs: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }

        Self {
            root,
            config_home: TempDir::new().unwrap(),
        }
    }

    /// Canonical root path
    pub fn root(&self) -> PathBuf {
        self.root.path().canonicalize().unwrap()
    }

    pub fn config_home(&self) -> &Path {
        self.config_home.path()
    }

    /// Command builder running inside this tree
    pub fn command(&self) -> cli::TwCommand {
        cli::TwCommand::new(self.root.path(), self.config_home.path())
    }
}
