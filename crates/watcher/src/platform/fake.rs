//! In-memory backend for unit tests: routes are kept in a map and fed by hand

use super::{Backend, NativeHandle, RawNotification, Route};
use crate::mask::WatchMask;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Routes = Arc<Mutex<HashMap<PathBuf, Route>>>;

#[derive(Default)]
pub(crate) struct FakeBackend {
    routes: Routes,
    releases: Arc<AtomicUsize>,
    deny_all: bool,
    denied: HashSet<PathBuf>,
}

impl FakeBackend {
    /// Refuse every subscription
    pub(crate) fn denying_all() -> Self {
        Self {
            deny_all: true,
            ..Self::default()
        }
    }

    /// Refuse subscriptions for `dir` only
    pub(crate) fn denying(dir: impl Into<PathBuf>) -> Self {
        let mut backend = Self::default();
        backend.denied.insert(dir.into());
        backend
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn live_routes(&self) -> usize {
        self.routes.lock().len()
    }

    /// Feed a notification to the route registered for `dir`, if any
    pub(crate) fn emit(&self, dir: &Path, mask: WatchMask, name: Option<&str>) {
        let route = self.routes.lock().get(dir).cloned();
        if let Some(route) = route {
            route(RawNotification {
                mask,
                name: name.map(OsString::from),
                is_dir: false,
                cookie: 0,
            });
        }
    }
}

struct FakeHandle {
    dir: PathBuf,
    routes: Routes,
    releases: Arc<AtomicUsize>,
}

impl NativeHandle for FakeHandle {
    fn release(self: Box<Self>) -> io::Result<()> {
        self.routes.lock().remove(&self.dir);
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn subscribe(
        &self,
        dir: &Path,
        _mask: WatchMask,
        route: Route,
    ) -> io::Result<Box<dyn NativeHandle>> {
        if self.deny_all || self.denied.contains(dir) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        self.routes.lock().insert(dir.to_path_buf(), route);
        Ok(Box::new(FakeHandle {
            dir: dir.to_path_buf(),
            routes: Arc::clone(&self.routes),
            releases: Arc::clone(&self.releases),
        }))
    }
}
