//! Cross-platform backend on top of the `notify` crate
//!
//! A single notify watcher per session, with every directory registered
//! non-recursively. notify reports full paths rather than per-directory
//! names, so each event is attributed back to the directory that owns it:
//! the parent directory when that is watched, otherwise the path itself
//! (self events on the root). The caller's mask is applied by the
//! directory watch, not here.
//!
//! notify invokes the handler on its own event thread, and `watch`/`unwatch`
//! wait for that same thread. A handle released from inside a sink callback
//! therefore skips `unwatch`; the watch goes away when the backend drops.

use super::{Backend, ErrorHook, NativeHandle, RawNotification, Route};
use crate::error::DeliveryError;
use crate::mask::{EventKind, WatchMask};
use dashmap::DashMap;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

type Routes = DashMap<PathBuf, Route>;

/// Identity of notify's event thread, recorded on its first callback
type EventThread = Arc<OnceLock<ThreadId>>;

fn on_event_thread(event_thread: &OnceLock<ThreadId>) -> bool {
    event_thread.get() == Some(&thread::current().id())
}

/// notify-backed watch source
pub struct NotifyBackend {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    routes: Arc<Routes>,
    event_thread: EventThread,
}

impl NotifyBackend {
    pub fn new(on_error: ErrorHook) -> io::Result<Self> {
        let routes: Arc<Routes> = Arc::new(DashMap::new());

        let event_thread: EventThread = Arc::new(OnceLock::new());

        let handler_routes = Arc::clone(&routes);
        let handler_thread = Arc::clone(&event_thread);
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            handler_thread.get_or_init(|| thread::current().id());
            match result {
                Ok(event) => route_event(&handler_routes, &on_error, event),
                Err(e) => {
                    warn!("notify reported an error: {}", e);
                    on_error(DeliveryError::Backend(e.to_string()));
                }
            }
        })
        .map_err(to_io)?;

        Ok(Self {
            watcher: Arc::new(Mutex::new(watcher)),
            routes,
            event_thread,
        })
    }

    /// Number of live routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl Backend for NotifyBackend {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn subscribe(
        &self,
        dir: &Path,
        _mask: WatchMask,
        route: Route,
    ) -> io::Result<Box<dyn NativeHandle>> {
        // Route first: notify may deliver before watch() returns
        self.routes.insert(dir.to_path_buf(), route);

        if let Err(e) = self.watcher.lock().watch(dir, RecursiveMode::NonRecursive) {
            self.routes.remove(dir);
            return Err(to_io(e));
        }

        Ok(Box::new(NotifyHandle {
            dir: dir.to_path_buf(),
            watcher: Arc::clone(&self.watcher),
            routes: Arc::clone(&self.routes),
            event_thread: Arc::clone(&self.event_thread),
        }))
    }
}

impl Drop for NotifyBackend {
    fn drop(&mut self) {
        // Some notify watchers join their event thread on drop
        if on_event_thread(&self.event_thread) {
            let watcher = Arc::clone(&self.watcher);
            let spawned = thread::Builder::new()
                .name("tree-watcher-notify-drop".to_string())
                .spawn(move || drop(watcher));
            if let Err(e) = spawned {
                warn!("Failed to hand off notify watcher shutdown: {}", e);
            }
        }
    }
}

struct NotifyHandle {
    dir: PathBuf,
    watcher: Arc<Mutex<RecommendedWatcher>>,
    routes: Arc<Routes>,
    event_thread: EventThread,
}

impl NativeHandle for NotifyHandle {
    fn release(self: Box<Self>) -> io::Result<()> {
        self.routes.remove(&self.dir);

        if on_event_thread(&self.event_thread) {
            debug!(
                "Deferring unwatch of {} to backend shutdown",
                self.dir.display()
            );
            return Ok(());
        }

        self.watcher.lock().unwatch(&self.dir).map_err(to_io)
    }
}

fn to_io(error: notify::Error) -> io::Error {
    match error.kind {
        notify::ErrorKind::Io(source) => source,
        notify::ErrorKind::PathNotFound => {
            io::Error::new(io::ErrorKind::NotFound, "path not found")
        }
        other => io::Error::new(io::ErrorKind::Other, format!("{other:?}")),
    }
}

/// What a notify event kind means before we know whose event it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classified {
    Kind(EventKind),
    Removed,
    MovedAway,
}

fn classify(kind: &notify::EventKind, path: &Path) -> Option<Classified> {
    use notify::EventKind as N;

    let classified = match kind {
        N::Access(AccessKind::Open(_)) => Classified::Kind(EventKind::Open),
        N::Access(AccessKind::Close(AccessMode::Write)) => Classified::Kind(EventKind::CloseWrite),
        N::Access(AccessKind::Close(_)) => Classified::Kind(EventKind::CloseNoWrite),
        N::Access(_) => Classified::Kind(EventKind::Access),
        N::Create(_) => Classified::Kind(EventKind::Create),
        N::Remove(_) => Classified::Removed,
        N::Modify(ModifyKind::Metadata(_)) => Classified::Kind(EventKind::Attrib),
        N::Modify(ModifyKind::Name(RenameMode::From)) => Classified::MovedAway,
        N::Modify(ModifyKind::Name(RenameMode::To)) => Classified::Kind(EventKind::MovedTo),
        // From and To are reported separately as well
        N::Modify(ModifyKind::Name(RenameMode::Both)) => return None,
        N::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                Classified::Kind(EventKind::MovedTo)
            } else {
                Classified::MovedAway
            }
        }
        N::Modify(_) | N::Any => Classified::Kind(EventKind::Modify),
        N::Other => return None,
    };

    Some(classified)
}

fn resolve(classified: Classified, is_self: bool) -> EventKind {
    match (classified, is_self) {
        (Classified::Kind(kind), _) => kind,
        (Classified::Removed, true) => EventKind::DeleteSelf,
        (Classified::Removed, false) => EventKind::Delete,
        (Classified::MovedAway, true) => EventKind::MoveSelf,
        (Classified::MovedAway, false) => EventKind::MovedFrom,
    }
}

/// Find the directory watch owning `path`, along with the entry name
/// (`None` for the directory itself)
fn attribute(routes: &Routes, path: &Path) -> Option<(Route, Option<OsString>)> {
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Some(route) = routes.get(parent) {
            return Some((Arc::clone(route.value()), Some(name.to_os_string())));
        }
    }

    routes
        .get(path)
        .map(|route| (Arc::clone(route.value()), None))
}

fn route_event(routes: &Routes, on_error: &ErrorHook, event: notify::Event) {
    if event.need_rescan() {
        warn!("notify requested a rescan, events were dropped");
        on_error(DeliveryError::Overflow);
        return;
    }

    let is_dir = matches!(
        event.kind,
        notify::EventKind::Create(CreateKind::Folder) | notify::EventKind::Remove(RemoveKind::Folder)
    );
    let cookie = event.attrs.tracker().map(|tracker| tracker as u32).unwrap_or(0);

    for path in &event.paths {
        let Some(classified) = classify(&event.kind, path) else {
            continue;
        };
        let Some((route, name)) = attribute(routes, path) else {
            trace!("Discarding notify event outside watched directories: {}", path.display());
            continue;
        };

        let kind = resolve(classified, name.is_none());
        route(RawNotification {
            mask: kind.mask(),
            is_dir: is_dir || name.is_none(),
            name,
            cookie,
        });
    }
}
