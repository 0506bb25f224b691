//! Raw storage records and their mapping to [`Entry`] values.
//!
//! A raw record is the comment-like row the storage layer hands back. It has
//! no explicit kind: the kind is derived from `replaces` and `content`.
//!
//! | `replaces` | `content`   | kind     |
//! |------------|-------------|----------|
//! | `None`     | non-empty   | `New`    |
//! | `Some(t)`  | non-empty   | `Update` |
//! | `Some(t)`  | empty/absent| `Delete` |
//!
//! Records that cannot be mapped are skipped, never partially converted.

use serde::{Deserialize, Serialize};

use super::{Entry, EntryId, EntryKind, PostId, Timestamp};
use crate::error::ErrorCode;

/// A record as stored by the external record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: EntryId,
    pub post_id: PostId,
    /// Record type tag. Entries of one feed share the feed key here.
    pub record_type: String,
    /// Approval status. Entries of one feed share the feed key here too.
    pub status: String,
    pub timestamp: Option<Timestamp>,
    pub content: Option<String>,
    #[serde(default)]
    pub replaces: Option<EntryId>,
    #[serde(default)]
    pub key_event: bool,
    #[serde(default)]
    pub author: Option<String>,
}

/// Reasons a raw record cannot become an entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecord {
    #[error("record {id} has no timestamp")]
    MissingTimestamp { id: EntryId },
    #[error("record {id} is a new entry without content")]
    MissingContent { id: EntryId },
    #[error("record {id} references itself")]
    SelfReference { id: EntryId },
}

impl MalformedRecord {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::MalformedRecord
    }
}

impl Entry {
    /// Map one raw record to an entry.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecord`] when a required field is missing or the
    /// record points at itself.
    pub fn from_record(record: &RawRecord) -> Result<Self, MalformedRecord> {
        let timestamp = record
            .timestamp
            .ok_or(MalformedRecord::MissingTimestamp { id: record.id })?;
        let content = record.content.clone().unwrap_or_default();

        let (kind, replaces, deletes) = match record.replaces {
            Some(target) if target == record.id => {
                return Err(MalformedRecord::SelfReference { id: record.id });
            }
            Some(target) if content.is_empty() => (EntryKind::Delete, None, Some(target)),
            Some(target) => (EntryKind::Update, Some(target), None),
            None if content.is_empty() => {
                return Err(MalformedRecord::MissingContent { id: record.id });
            }
            None => (EntryKind::New, None, None),
        };

        Ok(Self {
            id: record.id,
            post_id: record.post_id,
            timestamp,
            kind,
            content,
            replaces,
            deletes,
            key_event: record.key_event,
            author: record.author.clone(),
        })
    }
}

/// Map raw records to entries, skipping (and logging) malformed ones.
///
/// Order is preserved.
#[must_use]
pub fn entries_from_records(records: &[RawRecord]) -> Vec<Entry> {
    records
        .iter()
        .filter_map(|record| match Entry::from_record(record) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(
                    record_id = record.id,
                    code = %err.code(),
                    error = %err,
                    "skipping malformed record"
                );
                None
            }
        })
        .collect()
}
