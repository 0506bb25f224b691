//! Record storage interface and backends.
//!
//! The query service reads through [`RecordStore`]; the publisher writes
//! through [`RecordSink`]. Two backends are provided:
//!
//! - [`MemoryStore`] keeps records in a `Vec` (tests, simulations),
//! - [`sqlite::SqliteStore`] persists them in a `records` table.
//!
//! Listing always orders by `timestamp`, with the record id as tie-break so
//! that equal timestamps still list deterministically.

pub mod sqlite;

use anyhow::{Result, anyhow, bail};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use crate::entry::{EntryId, PostId, RawRecord, Timestamp};

pub use sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Listing order by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) const fn sql_clause(self) -> &'static str {
        match self {
            Self::Asc => "ORDER BY timestamp ASC, id ASC",
            Self::Desc => "ORDER BY timestamp DESC, id DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Ok(Self::Asc),
            "desc" | "newest" => Ok(Self::Desc),
            other => bail!("unknown sort order '{other}': expected one of asc, desc"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// Selection criteria for [`RecordStore::list`]. All fields combine with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub post_id: PostId,
    pub record_type: String,
    pub status: String,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Query every record of one feed, where `key` is both type and status.
    #[must_use]
    pub fn for_feed(post_id: PostId, key: &str) -> Self {
        Self {
            post_id,
            record_type: key.to_string(),
            status: key.to_string(),
            order: SortOrder::default(),
            limit: None,
        }
    }

    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, record: &RawRecord) -> bool {
        record.post_id == self.post_id
            && record.record_type == self.record_type
            && record.status == self.status
    }
}

/// Read side of the record storage.
pub trait RecordStore {
    /// List matching records in the requested order.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails.
    fn list(&self, query: &ListQuery) -> Result<Vec<RawRecord>>;

    /// Fetch one record by id, regardless of feed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend itself fails.
    fn get_by_id(&self, id: EntryId) -> Result<Option<RawRecord>>;
}

/// A record to be written; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub post_id: PostId,
    pub record_type: String,
    pub status: String,
    pub timestamp: Timestamp,
    pub content: String,
    pub replaces: Option<EntryId>,
    pub key_event: bool,
    pub author: Option<String>,
}

impl NewRecord {
    pub(crate) fn into_raw(self, id: EntryId) -> RawRecord {
        RawRecord {
            id,
            post_id: self.post_id,
            record_type: self.record_type,
            status: self.status,
            timestamp: Some(self.timestamp),
            content: Some(self.content),
            replaces: self.replaces,
            key_event: self.key_event,
            author: self.author,
        }
    }
}

/// Write side of the record storage.
pub trait RecordSink {
    /// Append a record and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the write.
    fn insert(&self, record: NewRecord) -> Result<EntryId>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<RawRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-built records (ids are kept as given).
    #[must_use]
    pub const fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of stored records across all feeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .len())
    }

    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for MemoryStore {
    fn list(&self, query: &ListQuery) -> Result<Vec<RawRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        let mut selected: Vec<RawRecord> = records
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        selected.sort_by_key(|record| (record.timestamp, record.id));
        if query.order == SortOrder::Desc {
            selected.reverse();
        }
        if let Some(limit) = query.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    fn get_by_id(&self, id: EntryId) -> Result<Option<RawRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }
}

impl RecordSink for MemoryStore {
    fn insert(&self, record: NewRecord) -> Result<EntryId> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.push(record.into_raw(id));
        Ok(id)
    }
}
