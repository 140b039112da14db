//! Error types for tree watching

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors surfaced by watch setup and discovery
#[derive(Debug, Error)]
pub enum WatchError {
    /// A directory could not be opened for monitoring
    #[error("failed to watch {}: {source}", path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory's children could not be enumerated
    #[error("failed to list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The native notification backend could not be created
    #[error("failed to initialize {backend} backend: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: io::Error,
    },

    /// A released watch cannot be started again
    #[error("watch on {} was released and cannot be restarted", path.display())]
    Released { path: PathBuf },

    /// Ignore patterns failed to compile
    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] ignore::Error),

    /// Configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WatchError {
    /// The directory this error concerns, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            WatchError::Setup { path, .. }
            | WatchError::Listing { path, .. }
            | WatchError::Released { path } => Some(path),
            _ => None,
        }
    }
}

/// Problems observed while events are being delivered
///
/// These never abort watching; they are handed to
/// [`EventSink::on_error`](crate::EventSink::on_error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The kernel queue overflowed and events were dropped
    #[error("event queue overflowed, events were lost")]
    Overflow,

    /// A watched directory went away; its path is relative to the root
    #[error("watch lost for '{}'", path.display())]
    WatchLost { path: PathBuf },

    /// The backend reported an error reading events
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_messages() {
        assert_eq!(
            DeliveryError::Overflow.to_string(),
            "event queue overflowed, events were lost"
        );
        assert_eq!(
            DeliveryError::WatchLost {
                path: PathBuf::from("b")
            }
            .to_string(),
            "watch lost for 'b'"
        );
        assert_eq!(
            DeliveryError::Backend("read failed".to_string()).to_string(),
            "backend error: read failed"
        );
    }

    #[test]
    fn test_setup_error_names_path_and_source() {
        let err = WatchError::Setup {
            path: PathBuf::from("/a/b"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.path(), Some(std::path::Path::new("/a/b")));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "failed to watch /a/b: denied");
    }
}
