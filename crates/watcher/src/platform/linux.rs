//! Linux inotify backend
//!
//! One inotify instance per watching session. Each directory gets its own
//! watch descriptor registered with the caller's mask, so filtering happens
//! in the kernel. A dedicated thread drives the inotify event stream and
//! routes every event by watch descriptor.

use super::{Backend, ErrorHook, NativeHandle, RawNotification, Route};
use crate::error::DeliveryError;
use crate::mask::WatchMask;
use futures::StreamExt;
use inotify::{Event, EventMask, Inotify, WatchDescriptor, WatchMask as InotifyMask, Watches};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

struct RouteEntry {
    dir: PathBuf,
    route: Route,
}

type Routes = RwLock<HashMap<WatchDescriptor, RouteEntry>>;

/// inotify-backed watch source
pub struct InotifyBackend {
    watches: Mutex<Watches>,
    routes: Arc<Routes>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl InotifyBackend {
    /// Initialize inotify and start the delivery thread
    ///
    /// `read_buffer` is the size in bytes of the buffer events are read into.
    pub fn new(read_buffer: usize, on_error: ErrorHook) -> io::Result<Self> {
        let inotify = Inotify::init()?;
        let watches = inotify.watches();
        let routes: Arc<Routes> = Arc::new(RwLock::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name("tree-watcher-inotify".to_string())
            .spawn({
                let routes = Arc::clone(&routes);
                move || run_delivery(inotify, read_buffer, routes, on_error, shutdown_rx)
            })?;

        Ok(Self {
            watches: Mutex::new(watches),
            routes,
            shutdown: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Number of live routes
    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }
}

impl Backend for InotifyBackend {
    fn name(&self) -> &'static str {
        "inotify"
    }

    fn subscribe(
        &self,
        dir: &Path,
        mask: WatchMask,
        route: Route,
    ) -> io::Result<Box<dyn NativeHandle>> {
        // Held across add() so the delivery thread cannot see the new
        // descriptor before its route exists
        let mut routes = self.routes.write();
        let mut watches = self.watches.lock();
        let wd = watches.add(dir, native_mask(mask))?;

        routes.insert(
            wd.clone(),
            RouteEntry {
                dir: dir.to_path_buf(),
                route,
            },
        );
        trace!("inotify watch added for {}", dir.display());

        Ok(Box::new(InotifyHandle {
            wd,
            watches: watches.clone(),
            routes: Arc::clone(&self.routes),
        }))
    }
}

impl Drop for InotifyBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }

        if let Some(thread) = self.thread.lock().take() {
            // Dropped from inside a sink callback: the thread exits on its own
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("inotify delivery thread panicked");
            }
        }
    }
}

struct InotifyHandle {
    wd: WatchDescriptor,
    watches: Watches,
    routes: Arc<Routes>,
}

impl NativeHandle for InotifyHandle {
    fn release(self: Box<Self>) -> io::Result<()> {
        let InotifyHandle {
            wd,
            mut watches,
            routes,
        } = *self;

        routes.write().remove(&wd);
        watches.remove(wd)
    }
}

fn native_mask(mask: WatchMask) -> InotifyMask {
    InotifyMask::from_bits_truncate(mask.bits()) | InotifyMask::ONLYDIR
}

fn run_delivery(
    inotify: Inotify,
    read_buffer: usize,
    routes: Arc<Routes>,
    on_error: ErrorHook,
    mut shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build inotify delivery runtime: {}", e);
            on_error(DeliveryError::Backend(e.to_string()));
            return;
        }
    };

    runtime.block_on(async move {
        let stream = match inotify.into_event_stream(vec![0u8; read_buffer]) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open inotify event stream: {}", e);
                on_error(DeliveryError::Backend(e.to_string()));
                return;
            }
        };
        let mut stream = std::pin::pin!(stream);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => dispatch(&routes, &on_error, event),
                    Some(Err(e)) => {
                        warn!("inotify read failed: {}", e);
                        on_error(DeliveryError::Backend(e.to_string()));
                        break;
                    }
                    None => break,
                },
            }
        }
    });

    debug!("inotify delivery thread stopped");
}

fn dispatch(routes: &Routes, on_error: &ErrorHook, event: Event<OsString>) {
    if event.mask.contains(EventMask::Q_OVERFLOW) {
        warn!("inotify queue overflowed, events were dropped");
        on_error(DeliveryError::Overflow);
        return;
    }

    if event.mask.contains(EventMask::IGNORED) {
        // Released handles remove their route first, so a route still being
        // present means the kernel dropped the watch (deleted or unmounted)
        if let Some(entry) = routes.write().remove(&event.wd) {
            debug!("inotify dropped watch on {}", entry.dir.display());
            on_error(DeliveryError::WatchLost { path: entry.dir });
        }
        return;
    }

    let route = match routes.read().get(&event.wd) {
        Some(entry) => Arc::clone(&entry.route),
        None => {
            trace!("Discarding event for unknown watch descriptor");
            return;
        }
    };

    route(RawNotification {
        mask: WatchMask::from_bits_truncate(event.mask.bits()),
        name: event.name,
        is_dir: event.mask.contains(EventMask::ISDIR),
        cookie: event.cookie,
    });
}
