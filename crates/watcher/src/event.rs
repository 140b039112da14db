//! Translated events and the sinks that receive them

use crate::error::DeliveryError;
use crate::mask::EventKind;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// A filesystem event, with its path relative to the watched root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// What happened
    pub kind: EventKind,
    /// Path relative to the root; empty for the root itself
    pub path: PathBuf,
    /// The subject of the event is a directory
    pub is_dir: bool,
    /// Rename cookie pairing `moved_from` with `moved_to`, when the
    /// backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<u32>,
}

/// An event as seen by a single directory watch: a kind and a name within
/// that directory. An empty name means the directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvent {
    pub kind: EventKind,
    pub name: OsString,
    pub is_dir: bool,
    pub cookie: Option<u32>,
}

/// Receiver of translated events
///
/// Called on the backend's delivery thread, so implementations should hand
/// work off quickly. A sink may stop its own watcher from inside a callback;
/// the delivery thread is then wound down in the background instead of
/// being joined.
pub trait EventSink: Send + Sync {
    /// Called once per translated event
    fn on_event(&self, event: WatchEvent);

    /// Called when delivery hits a problem; ignored by default
    fn on_error(&self, error: DeliveryError) {
        let _ = error;
    }
}

impl<F> EventSink for F
where
    F: Fn(WatchEvent) + Send + Sync,
{
    fn on_event(&self, event: WatchEvent) {
        self(event)
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_event(&self, _event: WatchEvent) {}
}

/// Sink that forwards events (and optionally errors) into crossbeam channels
#[derive(Debug, Clone)]
pub struct ChannelSink {
    events: Sender<WatchEvent>,
    errors: Option<Sender<DeliveryError>>,
}

impl ChannelSink {
    /// Forward events only
    pub fn new(events: Sender<WatchEvent>) -> Self {
        Self { events, errors: None }
    }

    /// Forward events and delivery errors
    pub fn with_errors(events: Sender<WatchEvent>, errors: Sender<DeliveryError>) -> Self {
        Self {
            events,
            errors: Some(errors),
        }
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: WatchEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.events.send(event);
    }

    fn on_error(&self, error: DeliveryError) {
        if let Some(errors) = &self.errors {
            let _ = errors.send(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::Mutex;

    fn sample() -> WatchEvent {
        WatchEvent {
            kind: EventKind::CloseWrite,
            path: PathBuf::from("b/x.txt"),
            is_dir: false,
            cookie: None,
        }
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: WatchEvent| seen.lock().unwrap().push(event);
        sink.on_event(sample());
        sink.on_error(DeliveryError::Overflow);
        assert_eq!(seen.lock().unwrap().as_slice(), &[sample()]);
    }

    #[test]
    fn test_channel_sink_forwards_events_and_errors() {
        let (event_tx, event_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        let sink = ChannelSink::with_errors(event_tx, error_tx);

        sink.on_event(sample());
        sink.on_error(DeliveryError::Overflow);

        assert_eq!(event_rx.try_recv().unwrap(), sample());
        assert_eq!(error_rx.try_recv().unwrap(), DeliveryError::Overflow);
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (event_tx, event_rx) = unbounded();
        drop(event_rx);
        ChannelSink::new(event_tx).on_event(sample());
    }

    #[test]
    fn test_event_serializes_with_snake_case_kind() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"kind":"close_write","path":"b/x.txt","is_dir":false}"#);
    }
}
