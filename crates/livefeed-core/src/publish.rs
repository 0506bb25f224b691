//! Write path: appending new, update and delete records to a feed.
//!
//! [`Publisher`] validates each mutation against the aggregated state of the
//! feed, stamps it, appends it through the store's [`RecordSink`] and then
//! busts the cached ascending listing.
//!
//! Records are never rewritten. An edit is a new record that `replaces` the
//! original; a delete is a replacing record with empty content.

use anyhow::Result;

use crate::cache::EntryCache;
use crate::entry::{Entry, EntryId, Timestamp};
use crate::error::ErrorCode;
use crate::query::EntryQueryService;
use crate::store::{NewRecord, RecordSink, RecordStore};

/// Rejected mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("entry {0} is not a live entry of this feed")]
    TargetNotFound(EntryId),
    #[error("entry content must not be empty")]
    EmptyContent,
    #[error("timestamp {requested} is older than the entry it modifies ({target})")]
    OutOfOrder {
        requested: Timestamp,
        target: Timestamp,
    },
    #[error("timestamp {0} is not after the epoch")]
    InvalidTimestamp(Timestamp),
}

impl PublishError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TargetNotFound(_) => ErrorCode::NotFound,
            Self::EmptyContent | Self::OutOfOrder { .. } | Self::InvalidTimestamp(_) => {
                ErrorCode::MalformedRecord
            }
        }
    }
}

/// Content and metadata of a new or edited entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub key_event: bool,
    pub author: Option<String>,
    /// Explicit timestamp; the wall clock is used when absent.
    pub timestamp: Option<Timestamp>,
}

impl Draft {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn key_event(mut self, key_event: bool) -> Self {
        self.key_event = key_event;
        self
    }

    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub const fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Appends records to the feed served by an [`EntryQueryService`].
#[derive(Debug)]
pub struct Publisher<'svc, S, C> {
    service: &'svc EntryQueryService<S, C>,
}

impl<'svc, S, C> Publisher<'svc, S, C>
where
    S: RecordStore + RecordSink,
    C: EntryCache,
{
    pub const fn new(service: &'svc EntryQueryService<S, C>) -> Self {
        Self { service }
    }

    /// Publish a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::EmptyContent`] for empty content, or a storage
    /// error if the insert fails.
    pub fn publish_new(&self, draft: Draft) -> Result<Entry> {
        if draft.content.trim().is_empty() {
            return Err(PublishError::EmptyContent.into());
        }
        let timestamp = self.stamp(draft.timestamp, None)?;
        self.append(draft, timestamp, None)
    }

    /// Publish an edit of a live entry.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] when the target is not live, the content
    /// is empty or the timestamp predates the target; or a storage error.
    pub fn publish_update(&self, target: EntryId, draft: Draft) -> Result<Entry> {
        if draft.content.trim().is_empty() {
            return Err(PublishError::EmptyContent.into());
        }
        let current = self.live_target(target)?;
        let timestamp = self.stamp(draft.timestamp, Some(current.timestamp))?;
        self.append(draft, timestamp, Some(target))
    }

    /// Publish the deletion of a live entry.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] when the target is not live or the
    /// timestamp predates it; or a storage error.
    pub fn publish_delete(&self, target: EntryId, timestamp: Option<Timestamp>) -> Result<Entry> {
        let current = self.live_target(target)?;
        let timestamp = self.stamp(timestamp, Some(current.timestamp))?;
        let draft = Draft {
            content: String::new(),
            key_event: false,
            author: current.author,
            timestamp: None,
        };
        self.append(draft, timestamp, Some(target))
    }

    /// Flag or unflag a live entry as a key event, keeping its content.
    ///
    /// # Errors
    ///
    /// Same as [`Self::publish_update`].
    pub fn set_key_event(
        &self,
        target: EntryId,
        key_event: bool,
        timestamp: Option<Timestamp>,
    ) -> Result<Entry> {
        let current = self.live_target(target)?;
        let draft = Draft {
            content: current.content,
            key_event,
            author: current.author,
            timestamp,
        };
        self.publish_update(target, draft)
    }

    fn live_target(&self, target: EntryId) -> Result<Entry> {
        self.service
            .get_current_by_id(target)?
            .ok_or_else(|| PublishError::TargetNotFound(target).into())
    }

    /// Pick the record timestamp. Clock-derived stamps never go backwards
    /// relative to the latest record; explicit ones must not predate the
    /// entry they modify. Timestamp 0 is reserved for "unbounded" in
    /// lazyload windows, so explicit stamps must be positive.
    fn stamp(&self, requested: Option<Timestamp>, floor: Option<Timestamp>) -> Result<Timestamp> {
        match requested {
            Some(ts) if ts <= 0 => Err(PublishError::InvalidTimestamp(ts).into()),
            Some(ts) => match floor {
                Some(target) if ts < target => Err(PublishError::OutOfOrder {
                    requested: ts,
                    target,
                }
                .into()),
                _ => Ok(ts),
            },
            None => {
                let now = chrono::Utc::now().timestamp();
                let latest = self.service.get_latest_timestamp()?.unwrap_or(now);
                Ok(now.max(latest).max(floor.unwrap_or(now)))
            }
        }
    }

    fn append(&self, draft: Draft, timestamp: Timestamp, replaces: Option<EntryId>) -> Result<Entry> {
        let record = NewRecord {
            post_id: self.service.post_id(),
            record_type: self.service.key().to_string(),
            status: self.service.key().to_string(),
            timestamp,
            content: draft.content,
            replaces,
            key_event: draft.key_event,
            author: draft.author,
        };
        let id = self.service.store().insert(record.clone())?;
        self.service.invalidate();

        let entry = Entry::from_record(&record.into_raw(id))?;
        tracing::info!(
            entry_id = entry.id,
            post_id = entry.post_id,
            kind = %entry.kind,
            target = ?entry.target(),
            timestamp = entry.timestamp,
            "published entry"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::entry::EntryKind;
    use crate::store::MemoryStore;

    fn service() -> EntryQueryService<MemoryStore, MemoryCache> {
        EntryQueryService::new(MemoryStore::new(), MemoryCache::new(), 1, "liveblog")
    }

    #[test]
    fn publish_new_then_update_then_delete() {
        let svc = service();
        let publisher = Publisher::new(&svc);

        let first = publisher.publish_new(Draft::new("kick-off").at(100)).expect("new");
        assert_eq!(first.kind, EntryKind::New);

        let edit = publisher
            .publish_update(first.id, Draft::new("kick-off!").at(110))
            .expect("update");
        assert_eq!(edit.kind, EntryKind::Update);
        assert_eq!(edit.replaces, Some(first.id));

        let gone = publisher.publish_delete(first.id, Some(120)).expect("delete");
        assert_eq!(gone.kind, EntryKind::Delete);
        assert_eq!(gone.deletes, Some(first.id));

        assert!(svc.get_current_by_id(first.id).expect("get").is_none());
    }

    #[test]
    fn writes_bust_the_ascending_cache() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        publisher.publish_new(Draft::new("a").at(10)).expect("new");
        assert_eq!(svc.get_between_timestamps(0, 100).expect("between").len(), 1);

        publisher.publish_new(Draft::new("b").at(20)).expect("new");
        assert_eq!(svc.get_between_timestamps(0, 100).expect("between").len(), 2);
    }

    #[test]
    fn mutations_require_live_target() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        let err = publisher
            .publish_update(42, Draft::new("x").at(10))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PublishError>(),
            Some(&PublishError::TargetNotFound(42))
        );

        let entry = publisher.publish_new(Draft::new("a").at(10)).expect("new");
        publisher.publish_delete(entry.id, Some(20)).expect("delete");
        assert!(publisher.publish_delete(entry.id, Some(30)).is_err());
    }

    #[test]
    fn empty_content_is_rejected() {
        let svc = service();
        let err = Publisher::new(&svc)
            .publish_new(Draft::new("  "))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PublishError>().map(PublishError::code),
            Some(ErrorCode::MalformedRecord)
        );
    }

    #[test]
    fn explicit_timestamp_cannot_predate_target() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        let entry = publisher.publish_new(Draft::new("a").at(50)).expect("new");
        let err = publisher
            .publish_update(entry.id, Draft::new("b").at(40))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PublishError>(),
            Some(PublishError::OutOfOrder { requested: 40, target: 50 })
        ));
    }

    #[test]
    fn explicit_timestamp_must_be_positive() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        for ts in [0, -60] {
            let err = publisher.publish_new(Draft::new("a").at(ts)).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PublishError>(),
                Some(PublishError::InvalidTimestamp(t)) if *t == ts
            ));
        }
        assert!(svc.get_latest_timestamp().expect("latest").is_none());
    }

    #[test]
    fn clock_stamps_never_go_backwards() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        let far_future = chrono::Utc::now().timestamp() + 10_000;
        publisher
            .publish_new(Draft::new("from the future").at(far_future))
            .expect("new");
        let next = publisher.publish_new(Draft::new("now")).expect("new");
        assert!(next.timestamp >= far_future);
    }

    #[test]
    fn key_event_toggle_keeps_content() {
        let svc = service();
        let publisher = Publisher::new(&svc);
        let entry = publisher.publish_new(Draft::new("half time").at(10)).expect("new");
        publisher.set_key_event(entry.id, true, Some(20)).expect("flag");

        let keys = svc.get_all_key_events().expect("keys");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].content, "half time");

        publisher.set_key_event(entry.id, false, Some(30)).expect("unflag");
        assert!(svc.get_all_key_events().expect("keys").is_empty());
    }
}
