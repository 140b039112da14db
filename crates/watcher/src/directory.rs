//! Single-directory watch
//!
//! A `DirectoryWatch` owns one native handle for one directory. It turns raw
//! notifications into `(kind, name)` pairs and forwards them to its owner.
//! It knows nothing about the tree it belongs to.

use crate::error::{Result, WatchError};
use crate::event::LocalEvent;
use crate::mask::WatchMask;
use crate::platform::{Backend, NativeHandle, RawNotification, Route};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

enum HandleState {
    Idle,
    Active(Box<dyn NativeHandle>),
    Released,
}

/// Watch on a single directory (non-recursive)
pub struct DirectoryWatch {
    base: PathBuf,
    mask: WatchMask,
    state: Mutex<HandleState>,
}

impl DirectoryWatch {
    /// Create an inactive watch for `base`
    pub fn new(base: impl Into<PathBuf>, mask: WatchMask) -> Self {
        Self {
            base: base.into(),
            mask,
            state: Mutex::new(HandleState::Idle),
        }
    }

    /// Directory being watched
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn mask(&self) -> WatchMask {
        self.mask
    }

    /// Whether the native handle is currently held
    pub fn is_active(&self) -> bool {
        matches!(*self.state.lock(), HandleState::Active(_))
    }

    /// Whether the handle has been released for good
    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool {
        matches!(*self.state.lock(), HandleState::Released)
    }

    /// Acquire the native handle and start forwarding events to `forward`
    ///
    /// A no-op if already active. Fails with [`WatchError::Setup`] when the
    /// backend cannot watch the directory, and with
    /// [`WatchError::Released`] once the watch has been stopped.
    pub fn start_watching<F>(&self, backend: &dyn Backend, forward: F) -> Result<()>
    where
        F: Fn(LocalEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        match *state {
            HandleState::Active(_) => return Ok(()),
            HandleState::Released => {
                return Err(WatchError::Released {
                    path: self.base.clone(),
                })
            }
            HandleState::Idle => {}
        }

        let mask = self.mask;
        let route: Route = Arc::new(move |raw: RawNotification| {
            for event in translate(mask, raw) {
                forward(event);
            }
        });

        let handle = backend
            .subscribe(&self.base, mask, route)
            .map_err(|source| WatchError::Setup {
                path: self.base.clone(),
                source,
            })?;

        *state = HandleState::Active(handle);
        Ok(())
    }

    /// Release the native handle
    ///
    /// Safe to call repeatedly. Release failures (typically because the
    /// directory is already gone) are logged and swallowed.
    pub fn stop_watching(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), HandleState::Released);

        if let HandleState::Active(handle) = previous {
            if let Err(e) = handle.release() {
                debug!("Releasing watch on {} failed: {}", self.base.display(), e);
            }
        }
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

impl std::fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("base", &self.base)
            .field("mask", &self.mask)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Split a raw notification into one local event per kind selected by `mask`
pub fn translate(mask: WatchMask, raw: RawNotification) -> SmallVec<[LocalEvent; 2]> {
    let name = raw.name.unwrap_or_default();
    let is_dir = raw.is_dir || name.is_empty();
    let cookie = (raw.cookie != 0).then_some(raw.cookie);

    (raw.mask & mask)
        .kinds()
        .map(|kind| LocalEvent {
            kind,
            name: name.clone(),
            is_dir,
            cookie,
        })
        .collect()
}
