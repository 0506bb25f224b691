//! Entry kind enum covering the three log event types.
//!
//! The string representation (`new`, `update`, `delete`) is the one used in
//! the `type` field of wire entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three event types of the entry log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A freshly published entry.
    New,
    /// Replaces the content (and key-event flag) of an earlier entry.
    Update,
    /// Removes an earlier entry.
    Delete,
}

/// Error returned when parsing an unknown entry kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntryKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown entry type '{}': expected one of new, update, delete",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEntryKind {}

impl EntryKind {
    /// All kinds in log order.
    pub const ALL: [Self; 3] = [Self::New, Self::Update, Self::Delete];

    /// Return the wire string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = UnknownEntryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(UnknownEntryKind { raw: s.to_string() }),
        }
    }
}

impl Serialize for EntryKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntryKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
