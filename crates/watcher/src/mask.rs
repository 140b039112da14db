//! Event kinds and the masks that select them
//!
//! Bit values match the Linux inotify constants so the native backend can
//! pass a mask straight through to the kernel.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Set of event kinds a watch is interested in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatchMask: u32 {
        const ACCESS        = 0x0000_0001;
        const MODIFY        = 0x0000_0002;
        const ATTRIB        = 0x0000_0004;
        const CLOSE_WRITE   = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN          = 0x0000_0020;
        const MOVED_FROM    = 0x0000_0040;
        const MOVED_TO      = 0x0000_0080;
        const CREATE        = 0x0000_0100;
        const DELETE        = 0x0000_0200;
        const DELETE_SELF   = 0x0000_0400;
        const MOVE_SELF     = 0x0000_0800;
    }
}

/// Every event kind
pub const ALL_EVENTS: WatchMask = WatchMask::all();

/// Content and identity changes only: a file closed after writing, the
/// watched directory itself moved, or an entry moved away.
pub const CHANGES_ONLY: WatchMask = WatchMask::CLOSE_WRITE
    .union(WatchMask::MOVE_SELF)
    .union(WatchMask::MOVED_FROM);

impl WatchMask {
    /// Iterate the single kinds contained in this mask, in bit order
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }
}

impl Default for WatchMask {
    fn default() -> Self {
        ALL_EVENTS
    }
}

impl fmt::Display for WatchMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ALL_EVENTS {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }

        let mut first = true;
        for kind in self.kinds() {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(kind.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Error returned when a mask expression names an unknown kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}' (expected one of: all, changes, {})", EventKind::names())]
pub struct ParseMaskError(pub String);

impl FromStr for WatchMask {
    type Err = ParseMaskError;

    /// Parse `"close_write | moved_from"`, `"CLOSE_WRITE,MOVED_FROM"`,
    /// `"all"`, `"changes"` or `"none"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = WatchMask::empty();

        for token in s.split(|c: char| c == '|' || c == ',' || c == '+') {
            let token = token.trim().to_ascii_lowercase();
            match token.as_str() {
                "" | "none" => {}
                "all" | "all_events" => mask |= ALL_EVENTS,
                "changes" | "changes_only" => mask |= CHANGES_ONLY,
                name => {
                    let kind = EventKind::from_name(name)
                        .ok_or_else(|| ParseMaskError(name.to_string()))?;
                    mask |= kind.mask();
                }
            }
        }

        Ok(mask)
    }
}

impl Serialize for WatchMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WatchMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A single kind of filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// File was read
    Access,
    /// File content was written
    Modify,
    /// Metadata changed (permissions, timestamps, ownership)
    Attrib,
    /// File opened for writing was closed
    CloseWrite,
    /// File not opened for writing was closed
    CloseNoWrite,
    /// File or directory was opened
    Open,
    /// Entry was moved out of the directory
    MovedFrom,
    /// Entry was moved into the directory
    MovedTo,
    /// Entry was created in the directory
    Create,
    /// Entry was deleted from the directory
    Delete,
    /// The watched directory itself was deleted
    DeleteSelf,
    /// The watched directory itself was moved
    MoveSelf,
}

impl EventKind {
    /// All kinds, in bit order
    pub const ALL: [EventKind; 12] = [
        EventKind::Access,
        EventKind::Modify,
        EventKind::Attrib,
        EventKind::CloseWrite,
        EventKind::CloseNoWrite,
        EventKind::Open,
        EventKind::MovedFrom,
        EventKind::MovedTo,
        EventKind::Create,
        EventKind::Delete,
        EventKind::DeleteSelf,
        EventKind::MoveSelf,
    ];

    /// The single-bit mask for this kind
    pub const fn mask(self) -> WatchMask {
        match self {
            EventKind::Access => WatchMask::ACCESS,
            EventKind::Modify => WatchMask::MODIFY,
            EventKind::Attrib => WatchMask::ATTRIB,
            EventKind::CloseWrite => WatchMask::CLOSE_WRITE,
            EventKind::CloseNoWrite => WatchMask::CLOSE_NOWRITE,
            EventKind::Open => WatchMask::OPEN,
            EventKind::MovedFrom => WatchMask::MOVED_FROM,
            EventKind::MovedTo => WatchMask::MOVED_TO,
            EventKind::Create => WatchMask::CREATE,
            EventKind::Delete => WatchMask::DELETE,
            EventKind::DeleteSelf => WatchMask::DELETE_SELF,
            EventKind::MoveSelf => WatchMask::MOVE_SELF,
        }
    }

    /// Stable snake_case name, as used in config files and CLI output
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Access => "access",
            EventKind::Modify => "modify",
            EventKind::Attrib => "attrib",
            EventKind::CloseWrite => "close_write",
            EventKind::CloseNoWrite => "close_nowrite",
            EventKind::Open => "open",
            EventKind::MovedFrom => "moved_from",
            EventKind::MovedTo => "moved_to",
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::DeleteSelf => "delete_self",
            EventKind::MoveSelf => "move_self",
        }
    }

    /// Look a kind up by its snake_case name
    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Whether this kind describes the watched directory itself
    pub const fn is_self_event(self) -> bool {
        matches!(self, EventKind::DeleteSelf | EventKind::MoveSelf)
    }

    fn names() -> String {
        EventKind::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_only_composition() {
        assert!(CHANGES_ONLY.contains(WatchMask::CLOSE_WRITE));
        assert!(CHANGES_ONLY.contains(WatchMask::MOVE_SELF));
        assert!(CHANGES_ONLY.contains(WatchMask::MOVED_FROM));
        assert!(!CHANGES_ONLY.contains(WatchMask::MODIFY));
        assert_eq!(CHANGES_ONLY.bits(), 0x8 | 0x800 | 0x40);
        assert_eq!(ALL_EVENTS.bits(), 0xfff);
    }

    #[test]
    fn test_kinds_iterates_single_bits() {
        let kinds: Vec<_> = CHANGES_ONLY.kinds().collect();
        assert_eq!(
            kinds,
            vec![EventKind::CloseWrite, EventKind::MovedFrom, EventKind::MoveSelf]
        );
        assert_eq!(ALL_EVENTS.kinds().count(), 12);
        assert_eq!(WatchMask::empty().kinds().count(), 0);
    }

    #[test]
    fn test_parse_mask_expressions() {
        assert_eq!("all".parse::<WatchMask>().unwrap(), ALL_EVENTS);
        assert_eq!("changes".parse::<WatchMask>().unwrap(), CHANGES_ONLY);
        assert_eq!(
            "CLOSE_WRITE, moved_to".parse::<WatchMask>().unwrap(),
            WatchMask::CLOSE_WRITE | WatchMask::MOVED_TO
        );
        assert_eq!(
            "create | delete".parse::<WatchMask>().unwrap(),
            WatchMask::CREATE | WatchMask::DELETE
        );
        assert_eq!("none".parse::<WatchMask>().unwrap(), WatchMask::empty());
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let err = "close_write | renamed".parse::<WatchMask>().unwrap_err();
        assert_eq!(err, ParseMaskError("renamed".to_string()));
        assert!(err.to_string().contains("close_write"));
    }

    #[test]
    fn test_display_parses_back() {
        for mask in [CHANGES_ONLY, ALL_EVENTS, WatchMask::empty(), WatchMask::ATTRIB] {
            assert_eq!(mask.to_string().parse::<WatchMask>().unwrap(), mask);
        }
        assert_eq!(CHANGES_ONLY.to_string(), "close_write | moved_from | move_self");
    }

    #[test]
    fn test_event_kind_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
            assert_eq!(kind.mask().bits().count_ones(), 1);
        }
        assert!(EventKind::MoveSelf.is_self_event());
        assert!(!EventKind::MovedFrom.is_self_event());
    }
}
