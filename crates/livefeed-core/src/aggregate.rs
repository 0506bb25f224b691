//! Key-event aggregation: folding the entry log into current state.
//!
//! [`Aggregate`] replays entries in ascending timestamp order:
//!
//! - `New` inserts (or, on replay of an id, overwrites in place),
//! - `Update` supersedes the target's content and key-event flag,
//! - `Delete` removes the target.
//!
//! Updates and deletes whose target is not live are dropped. Callers only
//! ever see a time-bounded slice of the log, so a dangling reference is the
//! normal shape of a partial window rather than an error.
//!
//! State is kept in [`OrderedEntries`], an insertion-ordered map. Fold order
//! is ascending time, so reversing it yields the descending presentation
//! order without re-sorting.

use std::collections::{BTreeMap, HashMap};

use crate::entry::{Entry, EntryId, EntryKind};
use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// OrderedEntries
// ---------------------------------------------------------------------------

/// Map from entry id to entry that iterates in insertion order.
///
/// Overwriting an existing id keeps its original position; removing and
/// re-inserting an id moves it to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedEntries {
    slots: BTreeMap<u64, Entry>,
    positions: HashMap<EntryId, u64>,
    next_slot: u64,
}

impl OrderedEntries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `entry.id`, returning the previous value for that id.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        if let Some(slot) = self.positions.get(&entry.id) {
            return self.slots.insert(*slot, entry);
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.positions.insert(entry.id, slot);
        self.slots.insert(slot, entry);
        None
    }

    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let slot = self.positions.remove(&id)?;
        self.slots.remove(&slot)
    }

    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.positions.get(&id).and_then(|slot| self.slots.get(slot))
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        let slot = self.positions.get(&id)?;
        self.slots.get_mut(slot)
    }

    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.positions.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Entry> + '_ {
        self.slots.values()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = EntryId> + '_ {
        self.slots.values().map(|entry| entry.id)
    }

    /// Keep only entries matching `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        let positions = &mut self.positions;
        self.slots.retain(|_, entry| {
            let kept = keep(entry);
            if !kept {
                positions.remove(&entry.id);
            }
            kept
        });
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Entry> {
        self.slots.into_values().collect()
    }
}

impl FromIterator<Entry> for OrderedEntries {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut map = Self::new();
        for entry in iter {
            map.insert(entry);
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Outcome of applying one entry to an [`Aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    /// A `New` for an id that was already live; stored state overwritten.
    Replayed,
    Updated,
    Deleted,
    /// Update or delete whose target is not live. Nothing changed.
    Dangling,
}

/// Counters collected while folding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub applied: usize,
    pub dangling: usize,
}

/// Current-state view of the entry log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    entries: OrderedEntries,
    stats: FoldStats,
}

impl Aggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `entries`, which must be in ascending timestamp order.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut aggregate = Self::new();
        for entry in entries {
            aggregate.apply(entry);
        }
        aggregate
    }

    /// Apply one entry.
    pub fn apply(&mut self, entry: &Entry) -> Applied {
        let outcome = match entry.kind {
            EntryKind::New => match self.entries.insert(entry.clone()) {
                Some(_) => Applied::Replayed,
                None => Applied::Inserted,
            },
            EntryKind::Delete => match entry.deletes.and_then(|id| self.entries.remove(id)) {
                Some(_) => Applied::Deleted,
                None => Applied::Dangling,
            },
            EntryKind::Update => match entry.replaces.and_then(|id| self.entries.get_mut(id)) {
                Some(target) => {
                    target.supersede_with(entry);
                    Applied::Updated
                }
                None => Applied::Dangling,
            },
        };

        if outcome == Applied::Dangling {
            self.stats.dangling += 1;
            tracing::debug!(
                entry_id = entry.id,
                target = ?entry.target(),
                kind = %entry.kind,
                code = %ErrorCode::DanglingReference,
                "dropping mutation without a live target"
            );
        } else {
            self.stats.applied += 1;
        }
        outcome
    }

    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    #[must_use]
    pub const fn entries(&self) -> &OrderedEntries {
        &self.entries
    }

    #[must_use]
    pub const fn stats(&self) -> FoldStats {
        self.stats
    }

    /// Live key events, newest first.
    #[must_use]
    pub fn key_events(&self) -> Vec<Entry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.key_event)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn into_entries(self) -> OrderedEntries {
        self.entries
    }
}

/// Fold ascending `entries` into the current-state map.
#[must_use]
pub fn aggregate(entries: &[Entry]) -> OrderedEntries {
    Aggregate::from_entries(entries).into_entries()
}

/// Fold ascending `entries` and return the live key events, newest first.
#[must_use]
pub fn key_events(entries: &[Entry]) -> Vec<Entry> {
    Aggregate::from_entries(entries).key_events()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
