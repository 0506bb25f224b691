//! Entry query service: the server-side read path of one feed.
//!
//! [`EntryQueryService`] wraps a [`RecordStore`] and an [`EntryCache`] and
//! answers every read the endpoints need: plain listings, the key-event
//! summary, time windows and lazy-loading pages.
//!
//! Missing data always resolves to an empty result or `None`. Only storage
//! failures are returned as errors.

use anyhow::Result;

use crate::aggregate::{Aggregate, OrderedEntries};
use crate::cache::{EntryCache, NoCache, entries_asc_key};
use crate::entry::{Entry, EntryId, PostId, Timestamp, entries_from_records};
use crate::error::ErrorCode;
use crate::store::{ListQuery, RecordStore, SortOrder};

/// Order and limit overrides for [`EntryQueryService::get_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl EntryFilter {
    #[must_use]
    pub const fn ascending() -> Self {
        Self {
            order: SortOrder::Asc,
            limit: None,
        }
    }

    #[must_use]
    pub const fn latest(limit: usize) -> Self {
        Self {
            order: SortOrder::Desc,
            limit: Some(limit),
        }
    }
}

/// Read access to the entries of one feed.
#[derive(Debug)]
pub struct EntryQueryService<S, C = NoCache> {
    store: S,
    cache: C,
    post_id: PostId,
    key: String,
}

impl<S: RecordStore> EntryQueryService<S> {
    /// Service without caching.
    pub fn uncached(store: S, post_id: PostId, key: impl Into<String>) -> Self {
        Self::new(store, NoCache, post_id, key)
    }
}

impl<S: RecordStore, C: EntryCache> EntryQueryService<S, C> {
    /// `key` is the record type and status the feed's entries carry.
    pub fn new(store: S, cache: C, post_id: PostId, key: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            post_id,
            key: key.into(),
        }
    }

    #[must_use]
    pub const fn post_id(&self) -> PostId {
        self.post_id
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    /// Drop the cached ascending listing. Call after every write.
    pub fn invalidate(&self) {
        self.cache.delete(&entries_asc_key(&self.key, self.post_id));
    }

    fn get(&self, filter: EntryFilter) -> Result<Vec<Entry>> {
        let query = ListQuery::for_feed(self.post_id, &self.key)
            .order(filter.order)
            .limit(filter.limit);
        let records = self.store.list(&query)?;
        Ok(entries_from_records(&records))
    }

    /// All entries, newest first unless `filter` says otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_all(&self, filter: EntryFilter) -> Result<Vec<Entry>> {
        self.get(filter)
    }

    /// Live key events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_all_key_events(&self) -> Result<Vec<Entry>> {
        let all = self.get_all(EntryFilter::ascending())?;
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let aggregate = Aggregate::from_entries(&all);
        let stats = aggregate.stats();
        tracing::debug!(
            post_id = self.post_id,
            applied = stats.applied,
            dangling = stats.dangling,
            "aggregated key events"
        );
        Ok(aggregate.key_events())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_key_event_by_id(&self, id: EntryId) -> Result<Option<Entry>> {
        Ok(self
            .get_all_key_events()?
            .into_iter()
            .find(|entry| entry.id == id))
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn count(&self, filter: EntryFilter) -> Result<usize> {
        Ok(self.get_all(filter)?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn has_any(&self) -> Result<bool> {
        Ok(!self.get(EntryFilter::latest(1))?.is_empty())
    }

    /// Fetch one record, but only if it belongs to this feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_by_id(&self, id: EntryId) -> Result<Option<Entry>> {
        let Some(record) = self.store.get_by_id(id)? else {
            return Ok(None);
        };
        if record.post_id != self.post_id
            || record.record_type != self.key
            || record.status != self.key
        {
            tracing::debug!(
                record_id = id,
                code = %ErrorCode::NotFound,
                "record belongs to another feed or is not approved"
            );
            return Ok(None);
        }
        Ok(entries_from_records(std::slice::from_ref(&record))
            .into_iter()
            .next())
    }

    /// The most recent record of any kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_latest(&self) -> Result<Option<Entry>> {
        Ok(self.get(EntryFilter::latest(1))?.into_iter().next())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_latest_timestamp(&self) -> Result<Option<Timestamp>> {
        Ok(self.get_latest()?.map(|entry| entry.timestamp))
    }

    /// Entries with `start <= timestamp <= end`, superseded ones removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_between_timestamps(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<OrderedEntries> {
        let between = self
            .get_all_entries_asc()?
            .into_iter()
            .filter(|entry| entry.timestamp >= start && entry.timestamp <= end)
            .collect();
        Ok(remove_replaced_entries(between))
    }

    fn get_all_entries_asc(&self) -> Result<Vec<Entry>> {
        let cache_key = entries_asc_key(&self.key, self.post_id);
        if let Some(entries) = self.cache.get(&cache_key) {
            return Ok(entries);
        }
        let entries = self.get(EntryFilter::ascending())?;
        self.cache.set(&cache_key, entries.clone());
        Ok(entries)
    }

    /// Entries for one lazy-loading page window, newest first.
    ///
    /// A zero bound means "unset". Entries at or above `max` and at or below
    /// `min` are excluded, but only when `max` is set: with `max == 0` the
    /// whole feed is returned and `min` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_for_lazyloading(&self, max: Timestamp, min: Timestamp) -> Result<Vec<Entry>> {
        let mut entries = self.get_all(EntryFilter::default())?;
        if max != 0 {
            entries.retain(|entry| {
                let ts = entry.timestamp;
                !(ts >= max || (min != 0 && ts <= min))
            });
        }
        Ok(entries)
    }

    /// Aggregated current state of one entry, `None` if deleted or unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_current_by_id(&self, id: EntryId) -> Result<Option<Entry>> {
        let all = self.get_all_entries_asc()?;
        Ok(Aggregate::from_entries(&all).get(id).cloned())
    }

    /// Live `New` entries in aggregated state, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_current(&self) -> Result<Vec<Entry>> {
        let all = self.get_all_entries_asc()?;
        Ok(Aggregate::from_entries(&all)
            .into_entries()
            .into_vec()
            .into_iter()
            .rev()
            .collect())
    }
}

/// Drop entries that replace another entry present in the same set.
///
/// Entries are keyed by id first (a repeated id overwrites in place). The
/// original entry is kept, the newer replacing one goes. Deletes are not
/// applied here.
///
/// Removal is progressive: each entry is checked in order against the set as
/// already reduced, so in a chain `1 <- 2 <- 3` the entry `2` goes first and
/// `3` then survives because its target is no longer present.
#[must_use]
pub fn remove_replaced_entries(entries: Vec<Entry>) -> OrderedEntries {
    let mut by_id: OrderedEntries = entries.into_iter().collect();
    let links: Vec<(EntryId, Option<EntryId>)> =
        by_id.iter().map(|entry| (entry.id, entry.replaces)).collect();
    for (id, replaces) in links {
        if replaces.is_some_and(|target| by_id.contains(target)) {
            by_id.remove(id);
        }
    }
    by_id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::entry::RawRecord;
    use crate::store::MemoryStore;

    const KEY: &str = "liveblog";

    fn raw(id: EntryId, ts: Timestamp, content: &str) -> RawRecord {
        RawRecord {
            id,
            post_id: 1,
            record_type: KEY.into(),
            status: KEY.into(),
            timestamp: Some(ts),
            content: Some(content.into()),
            replaces: None,
            key_event: false,
            author: None,
        }
    }

    fn replacing(id: EntryId, ts: Timestamp, target: EntryId, content: &str) -> RawRecord {
        RawRecord {
            replaces: Some(target),
            ..raw(id, ts, content)
        }
    }

    fn keyed(record: RawRecord) -> RawRecord {
        RawRecord {
            key_event: true,
            ..record
        }
    }

    fn service(records: Vec<RawRecord>) -> EntryQueryService<MemoryStore, MemoryCache> {
        EntryQueryService::new(MemoryStore::with_records(records), MemoryCache::new(), 1, KEY)
    }

    fn ids(entries: &[Entry]) -> Vec<EntryId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn get_all_defaults_to_newest_first() {
        let svc = service(vec![raw(1, 10, "a"), raw(2, 20, "b"), raw(3, 30, "c")]);
        assert_eq!(ids(&svc.get_all(EntryFilter::default()).expect("get")), vec![3, 2, 1]);
        assert_eq!(ids(&svc.get_all(EntryFilter::ascending()).expect("get")), vec![1, 2, 3]);
        assert_eq!(svc.count(EntryFilter::default()).expect("count"), 3);
    }

    #[test]
    fn empty_feed_resolves_to_absence() {
        let svc = service(vec![]);
        assert!(svc.get_all_key_events().expect("keys").is_empty());
        assert!(svc.get_latest().expect("latest").is_none());
        assert!(svc.get_latest_timestamp().expect("latest ts").is_none());
        assert!(!svc.has_any().expect("has_any"));
        assert!(svc.get_between_timestamps(0, 100).expect("between").is_empty());
    }

    #[test]
    fn key_events_follow_updates_and_deletes() {
        let svc = service(vec![
            keyed(raw(1, 10, "kick-off")),
            raw(2, 20, "goal"),
            keyed(replacing(3, 30, 2, "GOAL!")),
            keyed(raw(4, 40, "red card")),
            replacing(5, 50, 4, ""),
        ]);
        let keys = svc.get_all_key_events().expect("keys");
        assert_eq!(ids(&keys), vec![2, 1]);
        assert_eq!(keys[0].content, "GOAL!");

        assert_eq!(svc.get_key_event_by_id(1).expect("get").map(|e| e.id), Some(1));
        assert!(svc.get_key_event_by_id(4).expect("get").is_none());
    }

    #[test]
    fn key_events_are_strictly_descending() {
        let svc = service(vec![
            keyed(raw(1, 10, "a")),
            keyed(raw(2, 20, "b")),
            keyed(raw(3, 30, "c")),
        ]);
        let keys = svc.get_all_key_events().expect("keys");
        assert!(keys.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }

    #[test]
    fn get_by_id_validates_feed_membership() {
        let mut foreign = raw(2, 20, "other post");
        foreign.post_id = 9;
        let mut unapproved = raw(3, 30, "pending");
        unapproved.status = "hold".into();
        let svc = service(vec![raw(1, 10, "mine"), foreign, unapproved]);

        assert_eq!(svc.get_by_id(1).expect("get").map(|e| e.id), Some(1));
        assert!(svc.get_by_id(2).expect("get").is_none());
        assert!(svc.get_by_id(3).expect("get").is_none());
        assert!(svc.get_by_id(404).expect("get").is_none());
    }

    #[test]
    fn latest_is_most_recent_record_of_any_kind() {
        let svc = service(vec![raw(1, 10, "a"), replacing(2, 25, 1, "a2")]);
        assert_eq!(svc.get_latest().expect("latest").map(|e| e.id), Some(2));
        assert_eq!(svc.get_latest_timestamp().expect("ts"), Some(25));
        assert!(svc.has_any().expect("has_any"));
    }

    #[test]
    fn between_is_inclusive_and_drops_replacements() {
        let svc = service(vec![
            raw(1, 10, "a"),
            raw(2, 20, "b"),
            replacing(3, 30, 2, "b2"),
            replacing(4, 40, 1, "a2"),
        ]);
        let window = svc.get_between_timestamps(20, 40).expect("between");
        // 3 replaces 2 (present) -> dropped; 4 replaces 1 (outside window) -> kept.
        assert_eq!(window.ids().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn between_uses_cache_until_invalidated() {
        let svc = service(vec![raw(1, 10, "a")]);
        svc.get_between_timestamps(0, 100).expect("first");
        svc.get_between_timestamps(0, 100).expect("second");
        assert_eq!(svc.cache().misses(), 1);
        assert_eq!(svc.cache().hits(), 1);

        svc.invalidate();
        svc.get_between_timestamps(0, 100).expect("third");
        assert_eq!(svc.cache().misses(), 2);
    }

    #[test]
    fn lazyloading_window_excludes_both_bounds() {
        let svc = service(vec![
            raw(1, 30, "a"),
            raw(2, 60, "b"),
            raw(3, 90, "c"),
            raw(4, 120, "d"),
        ]);
        let page = svc.get_for_lazyloading(100, 50).expect("page");
        assert_eq!(page.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![90, 60]);

        let edge = svc.get_for_lazyloading(90, 60).expect("page");
        assert!(edge.is_empty(), "bounds are exclusive");
    }

    #[test]
    fn lazyloading_ignores_min_when_max_unset() {
        let svc = service(vec![
            raw(1, 30, "a"),
            raw(2, 60, "b"),
            raw(3, 90, "c"),
            raw(4, 120, "d"),
        ]);
        assert_eq!(svc.get_for_lazyloading(0, 50).expect("page").len(), 4);
        assert_eq!(svc.get_for_lazyloading(0, 0).expect("page").len(), 4);
        assert_eq!(ids(&svc.get_for_lazyloading(100, 0).expect("page")), vec![3, 2, 1]);
    }

    #[test]
    fn remove_replaced_keeps_original() {
        let kept = remove_replaced_entries(vec![
            Entry::new_entry(1, 10, "a"),
            Entry::update(2, 20, 1, "a2"),
        ]);
        assert_eq!(kept.ids().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn remove_replaced_walks_chains_in_order() {
        let kept = remove_replaced_entries(vec![
            Entry::new_entry(1, 10, "a"),
            Entry::update(2, 20, 1, "a2"),
            Entry::update(3, 30, 2, "a3"),
        ]);
        assert_eq!(kept.ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn remove_replaced_ignores_deletes() {
        let kept = remove_replaced_entries(vec![
            Entry::new_entry(1, 10, "a"),
            Entry::delete(2, 20, 1),
        ]);
        assert_eq!(kept.ids().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn current_state_reflects_full_log() {
        let svc = service(vec![
            raw(1, 10, "a"),
            raw(2, 20, "b"),
            replacing(3, 30, 1, "a2"),
            replacing(4, 40, 2, ""),
        ]);
        assert_eq!(
            svc.get_current_by_id(1).expect("get").map(|e| e.content),
            Some("a2".to_string())
        );
        assert!(svc.get_current_by_id(2).expect("get").is_none());
        assert_eq!(ids(&svc.get_current().expect("current")), vec![1]);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let mut broken = raw(2, 20, "b");
        broken.timestamp = None;
        let svc = service(vec![raw(1, 10, "a"), broken]);
        assert_eq!(ids(&svc.get_all(EntryFilter::default()).expect("get")), vec![1]);
        assert!(svc.get_by_id(2).expect("get").is_none());
    }
}
