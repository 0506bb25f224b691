//! Presentation seam of the loader.

use serde::Serialize;
use std::fmt;

use crate::entry::WireEntry;

/// Where a new load-more affordance goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Top,
    Bottom,
    /// Directly below the affordance of the given set.
    After(usize),
}

/// What the loader drives. Entries of a set are inserted directly above
/// that set's affordance, so they stack in arrival order.
pub trait FeedView {
    fn insert_entry(&mut self, set: usize, entry: &WireEntry);
    fn insert_affordance(&mut self, set: usize, placement: Placement, label: &str);
    fn remove_affordance(&mut self, set: usize);
    fn set_affordances_enabled(&mut self, enabled: bool);
}

/// One row of a [`MemoryView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum FeedItem {
    Entry { set: usize, entry: WireEntry },
    LoadMore { set: usize, label: String },
}

/// Feed kept as an ordered list of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryView {
    items: Vec<FeedItem>,
    enabled: bool,
}

impl Default for MemoryView {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            enabled: true,
        }
    }
}

impl MemoryView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    /// Visible entries, top to bottom.
    pub fn entries(&self) -> impl Iterator<Item = &WireEntry> {
        self.items.iter().filter_map(|item| match item {
            FeedItem::Entry { entry, .. } => Some(entry),
            FeedItem::LoadMore { .. } => None,
        })
    }

    /// Sets that still show an affordance, top to bottom.
    #[must_use]
    pub fn affordances(&self) -> Vec<usize> {
        self.items
            .iter()
            .filter_map(|item| match item {
                FeedItem::LoadMore { set, .. } => Some(*set),
                FeedItem::Entry { .. } => None,
            })
            .collect()
    }

    #[must_use]
    pub const fn affordances_enabled(&self) -> bool {
        self.enabled
    }

    fn affordance_position(&self, set: usize) -> Option<usize> {
        self.items
            .iter()
            .position(|item| matches!(item, FeedItem::LoadMore { set: s, .. } if *s == set))
    }
}

impl FeedView for MemoryView {
    fn insert_entry(&mut self, set: usize, entry: &WireEntry) {
        let item = FeedItem::Entry {
            set,
            entry: entry.clone(),
        };
        match self.affordance_position(set) {
            Some(pos) => self.items.insert(pos, item),
            None => self.items.push(item),
        }
    }

    fn insert_affordance(&mut self, set: usize, placement: Placement, label: &str) {
        let item = FeedItem::LoadMore {
            set,
            label: label.to_string(),
        };
        let pos = match placement {
            Placement::Top => 0,
            Placement::Bottom => self.items.len(),
            Placement::After(anchor) => self
                .affordance_position(anchor)
                .map_or(self.items.len(), |p| p + 1),
        };
        self.items.insert(pos, item);
    }

    fn remove_affordance(&mut self, set: usize) {
        if let Some(pos) = self.affordance_position(set) {
            self.items.remove(pos);
        }
    }

    fn set_affordances_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl fmt::Display for MemoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item {
                FeedItem::Entry { entry, .. } => {
                    writeln!(f, "{:>12}  #{:<6} {}", entry.timestamp, entry.id, entry.html)?;
                }
                FeedItem::LoadMore { set, label } => {
                    let state = if self.enabled { "" } else { " (disabled)" };
                    writeln!(f, "  [{label}] set {set}{state}")?;
                }
            }
        }
        Ok(())
    }
}
