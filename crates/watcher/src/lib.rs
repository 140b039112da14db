//! Recursive directory-tree watching
//!
//! This crate watches a directory and every subdirectory beneath it as if
//! one watch covered the whole subtree:
//! - One native, non-recursive watch per directory ([`DirectoryWatch`])
//! - Snapshot discovery with an explicit stack ([`discover`])
//! - Events reported with paths relative to the root ([`WatchEvent`])
//! - inotify on Linux, the `notify` crate elsewhere ([`BackendKind`])
//!
//! The watch set is fixed when watching starts. Directories created later
//! are not watched until the next restart.

pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod event;
pub mod ignore;
pub mod mask;
pub mod platform;
pub mod tree;

pub use config::WatcherConfig;
pub use directory::DirectoryWatch;
pub use discovery::{discover, Discovery};
pub use error::{DeliveryError, Result, WatchError};
pub use event::{ChannelSink, EventSink, LocalEvent, NoopSink, WatchEvent};
pub use self::ignore::{IgnoreConfig, IgnoreRules};
pub use mask::{EventKind, ParseMaskError, WatchMask, ALL_EVENTS, CHANGES_ONLY};
pub use platform::BackendKind;
pub use tree::RecursiveTreeWatcher;
