//! Client-side windowed loader.
//!
//! [`WindowedLoader`] pages backwards through a feed in fixed-size windows,
//! keeps one page of read-ahead per entry set, and reconciles update/delete
//! events against entries it has fetched but not yet rendered.
//!
//! The loader does no I/O. Every operation that needs data returns a
//! [`Route`] to fetch; the caller performs the request and hands the
//! response back (see [`driver::drive`]). Rendering goes through a
//! [`view::FeedView`].
//!
//! # Entry sets
//!
//! The render buffer is partitioned into entry sets, each with its own
//! "load more" affordance and its own fetch window `(floor, cursor)`:
//!
//! - set 0 starts at the top of the feed with an open floor,
//! - a key-event click on a buffered entry splits its set in two,
//! - a key-event click on an unfetched entry creates an island set carved
//!   out of the window that contains it.
//!
//! # States
//!
//! ```text
//! Idle --fetch--> Fetching --response--> Idle
//! ```
//!
//! Clicks are dropped while fetching. Prefetches issued by the loader itself
//! bypass the gate. A request that never completes leaves the loader busy.

pub mod driver;
mod reconcile;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::endpoint::{EntryResponse, LazyloadResponse, Route};
use crate::entry::{EntryId, EntryKind, Timestamp, WireEntry};

pub use driver::{Fetcher, ServiceFetcher, TransportError, drive};
pub use view::{FeedItem, FeedView, MemoryView, Placement};

/// Loader settings, the `[loader]` section of the project config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Entries rendered per "load more" click.
    pub page_size: usize,
    /// Label of the load-more affordance.
    pub load_more_text: String,
    /// Base URL the fetch routes are resolved against.
    pub endpoint_url: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            load_more_text: "Load more entries".to_string(),
            endpoint_url: "/liveblog/".to_string(),
        }
    }
}

/// Request gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderState {
    #[default]
    Idle,
    Fetching,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching => f.write_str("fetching"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Queued {
    entry: WireEntry,
    /// Timestamp of the update whose content is held; `None` until updated.
    revision: Option<Timestamp>,
}

impl Queued {
    const fn new(entry: WireEntry) -> Self {
        Self {
            entry,
            revision: None,
        }
    }
}

/// One partition of the render buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySet {
    queue: Vec<Queued>,
    consumed: usize,
    cursor: Timestamp,
    floor: Timestamp,
    exhausted: bool,
    has_affordance: bool,
}

impl EntrySet {
    const fn window(cursor: Timestamp, floor: Timestamp) -> Self {
        Self {
            queue: Vec::new(),
            consumed: 0,
            cursor,
            floor,
            exhausted: false,
            has_affordance: true,
        }
    }

    /// Entries fetched into this set, rendered or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fetched entries not yet rendered.
    #[must_use]
    pub fn available(&self) -> usize {
        self.queue.len() - self.consumed
    }

    /// Unrendered entries, newest first.
    pub fn buffered(&self) -> impl Iterator<Item = &WireEntry> {
        self.queue[self.consumed..].iter().map(|q| &q.entry)
    }

    /// Oldest timestamp seen; the exclusive upper bound of the next fetch.
    #[must_use]
    pub const fn cursor(&self) -> Timestamp {
        self.cursor
    }

    /// Exclusive lower bound of the next fetch; 0 when open.
    #[must_use]
    pub const fn floor(&self) -> Timestamp {
        self.floor
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub const fn has_affordance(&self) -> bool {
        self.has_affordance
    }

    fn contains_ts(&self, ts: Timestamp) -> bool {
        (self.cursor == 0 || ts < self.cursor) && (self.floor == 0 || ts > self.floor)
    }

    fn position_buffered(&self, id: EntryId) -> Option<usize> {
        self.queue[self.consumed..]
            .iter()
            .position(|q| q.entry.id == id)
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Windowed, reconciling feed loader.
#[derive(Debug, Clone, Default)]
pub struct WindowedLoader {
    config: LoaderConfig,
    state: LoaderState,
    sets: Vec<EntrySet>,
    pending_updates: Vec<WireEntry>,
    pending_deletes: Vec<WireEntry>,
    rendered: HashSet<EntryId>,
    first_display_done: bool,
    /// Exclusive upper bound of the first fetch.
    newest: Timestamp,
}

impl WindowedLoader {
    /// A page size of 0 is raised to 1.
    #[must_use]
    pub fn new(mut config: LoaderConfig) -> Self {
        if config.page_size == 0 {
            tracing::warn!("loader page_size 0 raised to 1");
            config.page_size = 1;
        }
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> LoaderState {
        self.state
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state == LoaderState::Fetching
    }

    #[must_use]
    pub fn sets(&self) -> &[EntrySet] {
        &self.sets
    }

    #[must_use]
    pub fn set(&self, index: usize) -> Option<&EntrySet> {
        self.sets.get(index)
    }

    /// Unrendered entries across all sets.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.sets.iter().map(EntrySet::available).sum()
    }

    #[must_use]
    pub fn is_rendered(&self, id: EntryId) -> bool {
        self.rendered.contains(&id)
    }

    #[must_use]
    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    /// Update and delete events waiting for their target.
    #[must_use]
    pub fn pending_events(&self) -> (usize, usize) {
        (self.pending_updates.len(), self.pending_deletes.len())
    }

    fn set_busy(&mut self, busy: bool, view: &mut impl FeedView) {
        let next = if busy {
            LoaderState::Fetching
        } else {
            LoaderState::Idle
        };
        if self.state != next {
            self.state = next;
            view.set_affordances_enabled(!busy);
        }
    }

    /// Install set 0 and its affordance and request the first page.
    ///
    /// `latest` is the newest record timestamp known to the page, if any.
    pub fn init(&mut self, latest: Option<Timestamp>, view: &mut impl FeedView) -> Option<Route> {
        self.newest = latest.map_or(0, |ts| ts.saturating_add(1));
        self.sets = vec![EntrySet::window(self.newest, 0)];
        view.insert_affordance(0, Placement::Bottom, &self.config.load_more_text);
        tracing::debug!(cursor = self.newest, "loader initialised");
        self.fetch_entries(0, view)
    }

    /// Request the next page of `set`, or go idle if the set has nothing
    /// more to fetch.
    pub fn fetch_entries(&mut self, set: usize, view: &mut impl FeedView) -> Option<Route> {
        let Some(entry_set) = self.sets.get(set) else {
            self.set_busy(false, view);
            return None;
        };
        if !entry_set.has_affordance || entry_set.exhausted {
            self.set_busy(false, view);
            return None;
        }
        let route = Route::Lazyload {
            max: entry_set.cursor,
            min: entry_set.floor,
            index: set,
        };
        self.set_busy(true, view);
        tracing::trace!(set, url = %route.url(&self.config.endpoint_url), "fetching page");
        Some(route)
    }

    /// Fold one lazy-loading page into its set.
    pub fn on_lazyload_response(
        &mut self,
        response: LazyloadResponse,
        view: &mut impl FeedView,
    ) -> Option<Route> {
        let set = response.index;
        if set >= self.sets.len() {
            tracing::warn!(set, "lazyload response for unknown entry set");
            self.set_busy(false, view);
            return None;
        }

        let Some(last) = response.entries.last().map(|e| e.timestamp) else {
            let entry_set = &mut self.sets[set];
            entry_set.exhausted = true;
            tracing::debug!(set, buffered = entry_set.available(), "entry set exhausted");
            if entry_set.available() == 0 {
                self.remove_affordance(set, view);
            }
            self.set_busy(false, view);
            return self.first_display(view);
        };
        self.sets[set].cursor = last;
        // A cursor of 0 reads as "no upper bound": nothing older can follow.
        if last <= 0 {
            self.sets[set].exhausted = true;
            tracing::debug!(set, "entry set reached the start of the feed");
        }

        for entry in response.entries {
            match entry.kind {
                EntryKind::New => {
                    if self.is_known(entry.id) {
                        tracing::trace!(entry_id = entry.id, "skipping known entry");
                    } else {
                        self.sets[set].queue.push(Queued::new(entry));
                    }
                }
                EntryKind::Update => self.pending_updates.push(entry),
                EntryKind::Delete => self.pending_deletes.push(entry),
            }
        }
        self.reconcile();

        let entry_set = &self.sets[set];
        if entry_set.exhausted {
            if entry_set.available() == 0 {
                self.remove_affordance(set, view);
            }
        } else if entry_set.available() < self.config.page_size {
            return self.fetch_entries(set, view);
        }
        self.set_busy(false, view);
        self.first_display(view)
    }

    fn first_display(&mut self, view: &mut impl FeedView) -> Option<Route> {
        if self.first_display_done {
            return None;
        }
        let has_entries = self.sets.first().is_some_and(|s| s.available() > 0);
        if !has_entries {
            return None;
        }
        self.first_display_done = true;
        self.render_entries(0, view)
    }

    /// Emit every buffered entry of `set`, then prefetch its next page. An
    /// exhausted set loses its affordance instead.
    pub fn render_entries(&mut self, set: usize, view: &mut impl FeedView) -> Option<Route> {
        let entry_set = self.sets.get_mut(set)?;
        for queued in &entry_set.queue[entry_set.consumed..] {
            view.insert_entry(set, &queued.entry);
            self.rendered.insert(queued.entry.id);
        }
        let count = entry_set.available();
        entry_set.consumed = entry_set.queue.len();
        let exhausted = entry_set.exhausted;
        tracing::debug!(set, count, "rendered entries");

        self.drop_rendered_events();
        if exhausted {
            self.remove_affordance(set, view);
            self.set_busy(false, view);
            return None;
        }
        self.fetch_entries(set, view)
    }

    fn remove_affordance(&mut self, set: usize, view: &mut impl FeedView) {
        if let Some(entry_set) = self.sets.get_mut(set) {
            if entry_set.has_affordance {
                entry_set.has_affordance = false;
                view.remove_affordance(set);
            }
        }
    }

    fn is_known(&self, id: EntryId) -> bool {
        self.rendered.contains(&id)
            || self
                .sets
                .iter()
                .any(|s| s.queue.iter().any(|q| q.entry.id == id))
    }

    /// Apply an update or delete pushed from the live side channel.
    pub fn handle_fresh_event(&mut self, event: WireEntry) {
        match event.kind {
            EntryKind::New => {
                tracing::debug!(entry_id = event.id, "fresh new entries are not windowed");
            }
            EntryKind::Update => {
                self.pending_updates.push(event);
                self.reconcile();
            }
            EntryKind::Delete => {
                self.pending_deletes.push(event);
                self.reconcile();
            }
        }
    }

    // -----------------------------------------------------------------------
    // User triggers
    // -----------------------------------------------------------------------

    /// Render the next page of `set`. Dropped while a fetch is in flight.
    pub fn click_load_more(&mut self, set: usize, view: &mut impl FeedView) -> Option<Route> {
        if self.is_busy() {
            tracing::debug!(set, "load more ignored while fetching");
            return None;
        }
        if !self.sets.get(set).is_some_and(EntrySet::has_affordance) {
            return None;
        }
        self.render_entries(set, view)
    }

    /// Bring a key event into view: render the set that buffers it, or
    /// fetch it on its own. Dropped while busy or when already rendered.
    pub fn click_key_event(&mut self, id: EntryId, view: &mut impl FeedView) -> Option<Route> {
        if self.is_busy() {
            tracing::debug!(entry_id = id, "key event click ignored while fetching");
            return None;
        }
        if self.rendered.contains(&id) {
            return None;
        }
        if let Some(set) = self.find_entry_set(id, view) {
            return self.render_entries(set, view);
        }
        self.set_busy(true, view);
        Some(Route::Entry {
            id,
            index: self.sets.len(),
        })
    }

    /// The set whose unrendered entries start with `id`, splitting the
    /// holding set when `id` sits further down its buffer.
    pub fn find_entry_set(&mut self, id: EntryId, view: &mut impl FeedView) -> Option<usize> {
        let (set, offset) = self
            .sets
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.position_buffered(id).map(|p| (i, p)))?;
        if offset == 0 {
            return Some(set);
        }
        self.split_entry_set(set, offset, view)
    }

    /// Move the buffered entries of `set` from `offset` on into a new set
    /// placed right after it. Returns the new set index, or `None` when
    /// `set` or `offset` is out of range.
    ///
    /// The new set inherits the original's fetch window; the original keeps
    /// only its fully fetched prefix and is exhausted.
    fn split_entry_set(
        &mut self,
        set: usize,
        offset: usize,
        view: &mut impl FeedView,
    ) -> Option<usize> {
        let original = self.sets.get_mut(set)?;
        if offset > original.available() {
            return None;
        }
        let at = original.consumed + offset;
        let tail = original.queue.split_off(at);
        let split_ts = tail.first().map_or(original.floor, |q| q.entry.timestamp);

        let carved = EntrySet {
            queue: tail,
            consumed: 0,
            cursor: original.cursor,
            floor: original.floor,
            exhausted: original.exhausted,
            has_affordance: true,
        };
        original.floor = split_ts;
        original.cursor = original.queue.last().map_or(split_ts, |q| q.entry.timestamp);
        original.exhausted = true;

        let index = self.sets.len();
        tracing::debug!(set, offset, new_set = index, "split entry set");
        self.sets.push(carved);
        view.insert_affordance(index, Placement::After(set), &self.config.load_more_text);
        Some(index)
    }

    /// Turn a single-entry response into an island set.
    pub fn on_entry_response(
        &mut self,
        response: EntryResponse,
        view: &mut impl FeedView,
    ) -> Option<Route> {
        let Some(entry) = response.entries.into_iter().next() else {
            tracing::debug!(set = response.index, "key event is no longer live");
            self.set_busy(false, view);
            return None;
        };
        if self.is_known(entry.id) {
            self.set_busy(false, view);
            return None;
        }

        let ts = entry.timestamp;
        let anchor = self
            .sets
            .iter()
            .position(|s| s.has_affordance && !s.exhausted && s.contains_ts(ts));

        let index = self.sets.len();
        let (island, placement) = match anchor {
            Some(a) => {
                let floor = self.sets[a].floor;
                self.sets[a].floor = ts;
                let previous = response.previous_timestamp;
                let exhausted = previous == 0 || (floor != 0 && previous <= floor);
                let island = EntrySet {
                    exhausted,
                    ..EntrySet::window(ts, floor)
                };
                (island, Placement::After(a))
            }
            None => {
                let placement = if ts >= self.newest {
                    Placement::Top
                } else {
                    Placement::Bottom
                };
                let island = EntrySet {
                    exhausted: true,
                    ..EntrySet::window(ts, 0)
                };
                (island, placement)
            }
        };
        tracing::debug!(
            entry_id = entry.id,
            new_set = index,
            anchor = ?anchor,
            previous = response.previous_timestamp,
            next = response.next_timestamp,
            "created island set"
        );

        self.pending_updates.retain(|e| e.id != entry.id);
        self.pending_deletes.retain(|e| e.id != entry.id);
        self.sets.push(EntrySet {
            queue: vec![Queued::new(entry)],
            ..island
        });
        view.insert_affordance(index, placement, &self.config.load_more_text);
        self.render_entries(index, view)
    }
}
