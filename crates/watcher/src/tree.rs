//! Recursive tree watcher
//!
//! Builds one [`DirectoryWatch`] per directory found under the root and
//! merges their events into a single stream of root-relative paths.
//!
//! The watch set is a snapshot taken by [`RecursiveTreeWatcher::start_watching`].
//! Directories created afterwards are not picked up until the watcher is
//! stopped and started again.

use crate::config::WatcherConfig;
use crate::directory::DirectoryWatch;
use crate::discovery::{discover, Discovery};
use crate::error::{DeliveryError, Result, WatchError};
use crate::event::{EventSink, LocalEvent, NoopSink, WatchEvent};
use crate::ignore::IgnoreRules;
use crate::mask::WatchMask;
use crate::platform::{self, Backend, ErrorHook};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

type SinkSlot = Arc<RwLock<Arc<dyn EventSink>>>;

/// State shared between the controlling thread and delivery callbacks
struct Shared {
    /// Canonical root
    root: PathBuf,
    /// Absolute directory path -> its watch
    watches: RwLock<HashMap<PathBuf, Arc<DirectoryWatch>>>,
    rules: Option<IgnoreRules>,
    sink: SinkSlot,
}

impl Shared {
    fn deliver(&self, base: &Path, event: LocalEvent) {
        // Queued before stop, delivered after: drop it
        if !self.watches.read().contains_key(base) {
            trace!("Discarding event from released watch on {}", base.display());
            return;
        }

        if event.kind.is_self_event() {
            debug!("Watched directory {} went away ({})", base.display(), event.kind);
        }

        let path = relative_path(&self.root, base, &event.name);
        if let Some(rules) = &self.rules {
            if rules.is_excluded(&path, event.is_dir) {
                return;
            }
        }

        trace!(kind = %event.kind, path = %path.display(), "Dispatching event");
        let sink = Arc::clone(&*self.sink.read());
        sink.on_event(WatchEvent {
            kind: event.kind,
            path,
            is_dir: event.is_dir,
            cookie: event.cookie,
        });
    }

    fn report(&self, error: DeliveryError) {
        let error = match error {
            DeliveryError::WatchLost { path } => DeliveryError::WatchLost {
                path: relative_path(&self.root, &path, OsStr::new("")),
            },
            other => other,
        };

        let sink = Arc::clone(&*self.sink.read());
        sink.on_error(error);
    }

    /// Empty the map and release every watch, without holding the map lock
    /// while handles are released
    fn teardown(&self) -> usize {
        let drained: Vec<Arc<DirectoryWatch>> =
            self.watches.write().drain().map(|(_, watch)| watch).collect();

        for watch in &drained {
            watch.stop_watching();
        }
        drained.len()
    }
}

/// A running session: the populated map plus the backend feeding it
struct Session {
    shared: Arc<Shared>,
    backend: Arc<dyn Backend>,
}

/// Watches a directory and everything beneath it
///
/// Events arrive at the configured [`EventSink`] on a background thread,
/// with paths relative to the root (`"b/x.txt"` for a file in `<root>/b`;
/// an empty path for the root itself).
///
/// ```no_run
/// use tree_watcher::{RecursiveTreeWatcher, WatchEvent, CHANGES_ONLY};
///
/// let watcher = RecursiveTreeWatcher::new("/srv/data", CHANGES_ONLY)
///     .with_sink(|event: WatchEvent| println!("{} {}", event.kind, event.path.display()));
/// watcher.start_watching()?;
/// # Ok::<(), tree_watcher::WatchError>(())
/// ```
pub struct RecursiveTreeWatcher {
    root: PathBuf,
    config: WatcherConfig,
    sink: SinkSlot,
    /// Serializes start and stop
    lifecycle: Mutex<Option<Session>>,
    /// Readable without the lifecycle lock, so a sink can query state
    current: RwLock<Option<Arc<Shared>>>,
}

impl RecursiveTreeWatcher {
    /// Create an idle watcher for `root` delivering the kinds in `mask`
    pub fn new(root: impl Into<PathBuf>, mask: WatchMask) -> Self {
        Self::from_parts(root.into(), WatcherConfig::with_mask(mask))
    }

    /// Create an idle watcher from a full configuration
    pub fn with_config(root: impl Into<PathBuf>, config: WatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(root.into(), config))
    }

    fn from_parts(root: PathBuf, config: WatcherConfig) -> Self {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        Self {
            root,
            config,
            sink: Arc::new(RwLock::new(sink)),
            lifecycle: Mutex::new(None),
            current: RwLock::new(None),
        }
    }

    /// Builder form of [`set_sink`](Self::set_sink)
    pub fn with_sink(self, sink: impl EventSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    /// Replace the event sink; takes effect for the next delivered event
    pub fn set_sink(&self, sink: impl EventSink + 'static) {
        let sink: Arc<dyn EventSink> = Arc::new(sink);
        *self.sink.write() = sink;
    }

    /// Root as given to the constructor
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mask(&self) -> WatchMask {
        self.config.mask
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Discover the tree and activate a watch on every directory
    ///
    /// A no-op while already watching. Fails when the root cannot be
    /// watched, leaving the watcher idle; any other directory that cannot be
    /// watched is skipped.
    pub fn start_watching(&self) -> Result<()> {
        let (kind, read_buffer) = (self.config.backend, self.config.read_buffer);
        self.start_with(|on_error| platform::connect(kind, read_buffer, on_error))
    }

    /// Start a session on the backend produced by `connect`
    pub(crate) fn start_with<C>(&self, connect: C) -> Result<()>
    where
        C: FnOnce(ErrorHook) -> Result<Arc<dyn Backend>>,
    {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_some() {
            debug!("Already watching {}", self.root.display());
            return Ok(());
        }

        let (root, rules) = self.prepare()?;
        let discovery = discover(&root, rules.as_ref());
        if !discovery.skipped.is_empty() {
            debug!(
                "{} directories under {} could not be listed",
                discovery.skipped.len(),
                root.display()
            );
        }

        let shared = Arc::new(Shared {
            root,
            watches: RwLock::new(HashMap::new()),
            rules,
            sink: Arc::clone(&self.sink),
        });
        let backend = connect(error_hook(Arc::downgrade(&shared)))?;

        // Register everything before activating anything
        let pending = self.register(&shared, discovery);
        self.activate(&shared, backend.as_ref(), &pending)?;
        drop(pending);

        let count = shared.watches.read().len();
        info!(
            "Watching {} directories under {} ({} backend)",
            count,
            shared.root.display(),
            backend.name()
        );

        *self.current.write() = Some(Arc::clone(&shared));
        *lifecycle = Some(Session { shared, backend });
        Ok(())
    }

    /// Release every watch and return to idle
    ///
    /// A no-op while idle. Never fails; handles whose directory has already
    /// disappeared are released quietly.
    pub fn stop_watching(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(session) = lifecycle.take() else {
            return;
        };
        *self.current.write() = None;

        let released = session.shared.teardown();
        drop(lifecycle);

        info!(
            "Stopped watching {} ({} directories released)",
            session.shared.root.display(),
            released
        );
        // Dropping the backend stops its delivery thread
        drop(session);
    }

    pub fn is_watching(&self) -> bool {
        self.current.read().is_some()
    }

    /// Absolute paths of the active watches, sorted
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let Some(shared) = self.current.read().clone() else {
            return Vec::new();
        };

        let mut paths: Vec<PathBuf> = shared.watches.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of active watches (0 while idle)
    pub fn watch_count(&self) -> usize {
        self.current
            .read()
            .as_ref()
            .map_or(0, |shared| shared.watches.read().len())
    }

    /// Run discovery without watching anything
    pub fn discover(&self) -> Result<Discovery> {
        let (root, rules) = self.prepare()?;
        Ok(discover(&root, rules.as_ref()))
    }

    /// Canonicalize the root and compile exclusions
    fn prepare(&self) -> Result<(PathBuf, Option<IgnoreRules>)> {
        let root = self
            .root
            .canonicalize()
            .map_err(|source| WatchError::Setup {
                path: self.root.clone(),
                source,
            })?;

        if !root.is_dir() {
            return Err(WatchError::Setup {
                path: self.root.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let rules = if self.config.ignore.is_active() {
            let rules = IgnoreRules::load(&root, self.config.ignore.clone())?;
            debug!(
                "Loaded {} exclusion sources for {}",
                rules.active_sources(),
                rules.root().display()
            );
            Some(rules)
        } else {
            None
        };

        Ok((root, rules))
    }

    /// Insert one watch per discovered directory, returning them root first
    fn register(&self, shared: &Shared, discovery: Discovery) -> Vec<Arc<DirectoryWatch>> {
        let mut watches = shared.watches.write();
        let mut pending = Vec::with_capacity(discovery.directories.len());

        for dir in discovery.directories {
            if watches.contains_key(&dir) {
                continue;
            }
            let watch = Arc::new(DirectoryWatch::new(dir.clone(), self.config.mask));
            watches.insert(dir, Arc::clone(&watch));
            pending.push(watch);
        }

        pending
    }

    /// Start every registered watch; the root's failure undoes the session
    fn activate(
        &self,
        shared: &Arc<Shared>,
        backend: &dyn Backend,
        pending: &[Arc<DirectoryWatch>],
    ) -> Result<()> {
        for watch in pending {
            let base = watch.base().to_path_buf();
            let forward = {
                let shared = Arc::downgrade(shared);
                let base = base.clone();
                move |event: LocalEvent| {
                    if let Some(shared) = shared.upgrade() {
                        shared.deliver(&base, event);
                    }
                }
            };

            match watch.start_watching(backend, forward) {
                Ok(()) => {}
                Err(e) if base == shared.root => {
                    shared.teardown();
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", base.display(), e);
                    shared.watches.write().remove(&base);
                    watch.stop_watching();
                }
            }
        }

        Ok(())
    }
}

impl Drop for RecursiveTreeWatcher {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

impl std::fmt::Debug for RecursiveTreeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveTreeWatcher")
            .field("root", &self.root)
            .field("mask", &self.config.mask)
            .field("backend", &self.config.backend)
            .field("watching", &self.is_watching())
            .finish()
    }
}

fn error_hook(shared: Weak<Shared>) -> ErrorHook {
    Arc::new(move |error: DeliveryError| {
        if let Some(shared) = shared.upgrade() {
            shared.report(error);
        }
    })
}

/// Path of `name` inside `base`, relative to `root`
///
/// An empty `name` stands for `base` itself. Paths outside `root` are
/// returned unchanged.
pub(crate) fn relative_path(root: &Path, base: &Path, name: &OsStr) -> PathBuf {
    let full = if name.is_empty() {
        base.to_path_buf()
    } else {
        base.join(name)
    };

    match full.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => full,
    }
}
