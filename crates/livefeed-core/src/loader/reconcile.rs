//! Matching pending update/delete events against buffered entries.

use super::WindowedLoader;
use crate::entry::{EntryId, WireEntry};

impl WindowedLoader {
    /// Apply every pending event that has a buffered target and compact the
    /// pending buffers. Deletes run first so their purge also covers updates
    /// fetched in the same page.
    pub(super) fn reconcile(&mut self) {
        let mut deletes = std::mem::take(&mut self.pending_deletes);
        deletes.retain(|event| !self.apply_delete(event));
        self.pending_deletes = deletes;

        let mut updates = std::mem::take(&mut self.pending_updates);
        updates.retain(|event| !self.apply_update(event));
        self.pending_updates = updates;
    }

    /// Position of an unrendered entry: (set, index into the set's queue).
    fn locate(&self, id: EntryId) -> Option<(usize, usize)> {
        self.sets.iter().enumerate().find_map(|(set, entry_set)| {
            entry_set
                .position_buffered(id)
                .map(|offset| (set, entry_set.consumed + offset))
        })
    }

    /// Returns `true` when the event is spent.
    fn apply_delete(&mut self, event: &WireEntry) -> bool {
        if self.rendered.contains(&event.id) {
            tracing::debug!(entry_id = event.id, "dropping delete for rendered entry");
            return true;
        }
        let Some((set, index)) = self.locate(event.id) else {
            return false;
        };
        self.sets[set].queue.remove(index);
        self.pending_updates.retain(|update| update.id != event.id);
        tracing::debug!(entry_id = event.id, set, "removed buffered entry");
        true
    }

    /// Returns `true` when the event is spent. The newest update wins
    /// regardless of arrival order.
    fn apply_update(&mut self, event: &WireEntry) -> bool {
        if self.rendered.contains(&event.id) {
            tracing::debug!(entry_id = event.id, "dropping update for rendered entry");
            return true;
        }
        let Some((set, index)) = self.locate(event.id) else {
            return false;
        };
        let queued = &mut self.sets[set].queue[index];
        if queued.revision.is_none_or(|revision| event.timestamp > revision) {
            queued.entry.html.clone_from(&event.html);
            queued.revision = Some(event.timestamp);
        }
        true
    }

    /// Forget events whose target has been rendered since they arrived.
    pub(super) fn drop_rendered_events(&mut self) {
        let before = self.pending_updates.len() + self.pending_deletes.len();
        let rendered = &self.rendered;
        self.pending_updates.retain(|e| !rendered.contains(&e.id));
        self.pending_deletes.retain(|e| !rendered.contains(&e.id));
        let dropped = before - self.pending_updates.len() - self.pending_deletes.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped events for rendered entries");
        }
    }
}
