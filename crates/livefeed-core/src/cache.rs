//! String-keyed entry cache used by the query service.
//!
//! Only the ascending full listing of a feed is cached, under
//! [`entries_asc_key`]. Every write to that feed must delete the key; the
//! [`crate::publish::Publisher`] does so after each insert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::entry::{Entry, PostId};

/// Cache key for the ascending full listing of one feed.
#[must_use]
pub fn entries_asc_key(key: &str, post_id: PostId) -> String {
    format!("{key}_entries_asc_{post_id}")
}

/// Minimal get/set/delete cache contract.
pub trait EntryCache {
    fn get(&self, key: &str) -> Option<Vec<Entry>>;
    fn set(&self, key: &str, entries: Vec<Entry>);
    fn delete(&self, key: &str);
}

/// Process-local cache. A poisoned lock degrades to a miss.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<String, Vec<Entry>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl EntryCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<Entry>> {
        let found = self
            .inner
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned());
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn set(&self, key: &str, entries: Vec<Entry>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key.to_string(), entries);
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(key);
        }
    }
}

/// Cache that never stores anything. Every read goes to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl EntryCache for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<Entry>> {
        None
    }

    fn set(&self, _key: &str, _entries: Vec<Entry>) {}

    fn delete(&self, _key: &str) {}
}
