//! Entry data model for the live feed.
//!
//! An [`Entry`] is one event of the append-only entry log: a new entry, an
//! update replacing an earlier entry's content, or a delete removing one.
//! Entries are built per query from raw storage records
//! (see [`record::RawRecord`]) and are not mutated by callers; the
//! aggregator supersedes content on its own copies only.
//!
//! [`WireEntry`] is the client-facing shape carried in endpoint responses.

pub mod kind;
pub mod record;

pub use kind::{EntryKind, UnknownEntryKind};
pub use record::{MalformedRecord, RawRecord, entries_from_records};

use serde::{Deserialize, Serialize};

/// Record identifier, stable across update/delete references.
pub type EntryId = u64;

/// Identifier of the feed (post) an entry belongs to.
pub type PostId = u64;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// A single event in the entry log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub post_id: PostId,
    pub timestamp: Timestamp,
    pub kind: EntryKind,
    /// Rendering payload. Empty for deletes.
    pub content: String,
    /// Target of an `Update`.
    pub replaces: Option<EntryId>,
    /// Target of a `Delete`.
    pub deletes: Option<EntryId>,
    pub key_event: bool,
    pub author: Option<String>,
}

impl Entry {
    /// A `New` entry.
    #[must_use]
    pub fn new_entry(id: EntryId, timestamp: Timestamp, content: impl Into<String>) -> Self {
        Self {
            id,
            post_id: 0,
            timestamp,
            kind: EntryKind::New,
            content: content.into(),
            replaces: None,
            deletes: None,
            key_event: false,
            author: None,
        }
    }

    /// An `Update` superseding `replaces`.
    #[must_use]
    pub fn update(
        id: EntryId,
        timestamp: Timestamp,
        replaces: EntryId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: EntryKind::Update,
            replaces: Some(replaces),
            ..Self::new_entry(id, timestamp, content)
        }
    }

    /// A `Delete` removing `deletes`.
    #[must_use]
    pub fn delete(id: EntryId, timestamp: Timestamp, deletes: EntryId) -> Self {
        Self {
            kind: EntryKind::Delete,
            deletes: Some(deletes),
            ..Self::new_entry(id, timestamp, String::new())
        }
    }

    #[must_use]
    pub const fn with_key_event(mut self, key_event: bool) -> Self {
        self.key_event = key_event;
        self
    }

    #[must_use]
    pub const fn in_post(mut self, post_id: PostId) -> Self {
        self.post_id = post_id;
        self
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self.kind, EntryKind::New)
    }

    #[must_use]
    pub const fn is_update(&self) -> bool {
        matches!(self.kind, EntryKind::Update)
    }

    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self.kind, EntryKind::Delete)
    }

    /// The entry an `Update` or `Delete` refers to. `None` for `New`.
    #[must_use]
    pub const fn target(&self) -> Option<EntryId> {
        match self.kind {
            EntryKind::New => None,
            EntryKind::Update => self.replaces,
            EntryKind::Delete => self.deletes,
        }
    }

    /// Take over the content and key-event flag of a later update.
    pub(crate) fn supersede_with(&mut self, update: &Self) {
        self.content.clone_from(&update.content);
        self.key_event = update.key_event;
    }

    /// Client-facing representation.
    ///
    /// Updates and deletes carry their target's id so the client can match
    /// them against entries it already holds.
    #[must_use]
    pub fn to_wire(&self) -> WireEntry {
        WireEntry {
            id: self.target().unwrap_or(self.id),
            kind: self.kind,
            html: self.content.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// One entry as carried in endpoint responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub id: EntryId,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub html: String,
    pub timestamp: Timestamp,
}

impl WireEntry {
    #[must_use]
    pub fn new(id: EntryId, kind: EntryKind, html: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id,
            kind,
            html: html.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_follows_kind() {
        assert_eq!(Entry::new_entry(1, 10, "a").target(), None);
        assert_eq!(Entry::update(2, 20, 1, "b").target(), Some(1));
        assert_eq!(Entry::delete(3, 30, 1).target(), Some(1));
    }

    #[test]
    fn wire_entry_uses_target_id_for_mutations() {
        assert_eq!(Entry::new_entry(1, 10, "a").to_wire().id, 1);
        assert_eq!(Entry::update(2, 20, 1, "b").to_wire().id, 1);
        assert_eq!(Entry::delete(3, 30, 1).to_wire().id, 1);
    }

    #[test]
    fn wire_entry_json_shape() {
        let wire = Entry::update(2, 20, 1, "<p>b</p>").to_wire();
        let value = serde_json::to_value(&wire).expect("serialize");
        assert_eq!(
            value,
            json!({"id": 1, "type": "update", "html": "<p>b</p>", "timestamp": 20})
        );
    }

    #[test]
    fn supersede_replaces_flag_instead_of_merging() {
        let mut original = Entry::new_entry(1, 10, "a").with_key_event(true);
        original.supersede_with(&Entry::update(2, 20, 1, "b"));
        assert_eq!(original.content, "b");
        assert!(!original.key_event);
        assert_eq!(original.timestamp, 10, "position in time is kept");
    }
}
