//! CLI command implementations

pub mod config;
pub mod tree;
pub mod watch;
