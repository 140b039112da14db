//! Native notification backends
//!
//! A backend hands out one native handle per watched directory and routes
//! every raw notification for that directory to the route registered with
//! it. Two implementations exist: raw inotify on Linux, and the `notify`
//! crate everywhere.

#[cfg(target_os = "linux")]
pub mod linux;

pub mod portable;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::{DeliveryError, Result, WatchError};
use crate::mask::WatchMask;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

#[cfg(target_os = "linux")]
pub use linux::InotifyBackend;
pub use portable::NotifyBackend;

/// A notification addressed to one directory watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// Kind bits carried by the notification
    pub mask: WatchMask,
    /// Entry name within the directory; `None` for the directory itself
    pub name: Option<OsString>,
    /// The entry is a directory
    pub is_dir: bool,
    /// Rename cookie (0 when absent)
    pub cookie: u32,
}

/// Callback receiving the raw notifications of one directory
pub type Route = Arc<dyn Fn(RawNotification) + Send + Sync>;

/// Callback receiving backend-wide delivery problems
pub type ErrorHook = Arc<dyn Fn(DeliveryError) + Send + Sync>;

/// Source of per-directory native watch handles
pub trait Backend: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &'static str;

    /// Start monitoring `dir` with `mask`, routing its notifications to `route`
    ///
    /// The directory itself is not recursed into.
    fn subscribe(&self, dir: &Path, mask: WatchMask, route: Route)
        -> io::Result<Box<dyn NativeHandle>>;
}

/// Exclusive ownership of one native watch
///
/// Releasing consumes the handle, so it can only happen once.
pub trait NativeHandle: Send + Sync {
    /// Stop the native watch and unregister its route
    fn release(self: Box<Self>) -> io::Result<()>;
}

/// Which backend a tree watcher should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// inotify on Linux, notify elsewhere
    #[default]
    Auto,
    /// Raw inotify (Linux only)
    Inotify,
    /// The cross-platform `notify` crate
    Portable,
}

impl BackendKind {
    /// Resolve `Auto` to the concrete backend for this platform
    pub fn resolve(self) -> BackendKind {
        match self {
            BackendKind::Auto if cfg!(target_os = "linux") => BackendKind::Inotify,
            BackendKind::Auto => BackendKind::Portable,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Inotify => "inotify",
            BackendKind::Portable => "portable",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "inotify" => Ok(BackendKind::Inotify),
            "portable" | "notify" => Ok(BackendKind::Portable),
            other => Err(WatchError::Config(format!(
                "unknown backend '{other}' (expected auto, inotify or portable)"
            ))),
        }
    }
}

/// Create a backend instance for one watching session
pub fn connect(kind: BackendKind, read_buffer: usize, on_error: ErrorHook) -> Result<Arc<dyn Backend>> {
    match kind.resolve() {
        #[cfg(target_os = "linux")]
        BackendKind::Inotify => {
            let backend = InotifyBackend::new(read_buffer, on_error).map_err(|source| {
                WatchError::Backend {
                    backend: "inotify",
                    source,
                }
            })?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(target_os = "linux"))]
        BackendKind::Inotify => {
            let _ = (read_buffer, on_error);
            Err(WatchError::Config(
                "the inotify backend is only available on Linux".to_string(),
            ))
        }
        BackendKind::Portable | BackendKind::Auto => {
            let backend = NotifyBackend::new(on_error).map_err(|source| WatchError::Backend {
                backend: "portable",
                source,
            })?;
            Ok(Arc::new(backend))
        }
    }
}
