//! Module → resolved context cache.
//!
//! Entries are published as `Arc<CacheEntry>` and replaced wholesale, never
//! patched, so a reader either sees the old entry or the new one.
//!
//! Every eviction bumps a generation counter before removing anything. A
//! rebuild records the generation before it reads files and only publishes
//! its result if no eviction happened in between, so a change notification
//! that races a rebuild is never overwritten by content read before it.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::context::EnvironmentContext;
use crate::module::Module;

/// Snapshot of a module's configuration files used to detect staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Watermark {
    /// Newest modification time among the files, `None` if there are none.
    pub newest: Option<SystemTime>,
    pub files: usize,
}

impl Watermark {
    pub fn from_times(times: impl IntoIterator<Item = SystemTime>) -> Self {
        times.into_iter().fold(Self::default(), |acc, time| Self {
            newest: acc.newest.max(Some(time)),
            files: acc.files + 1,
        })
    }

    /// True if `current` shows a change since `self` was taken: a newer
    /// timestamp, or files appearing or disappearing.
    pub fn is_older_than(&self, current: &Watermark) -> bool {
        current.newest > self.newest || current.files != self.files
    }
}

/// A resolved context and the watermark it was built at.
#[derive(Debug)]
pub struct CacheEntry {
    pub context: Arc<EnvironmentContext>,
    pub watermark: Watermark,
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<Module, Arc<CacheEntry>>,
    generation: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &Module) -> Option<Arc<CacheEntry>> {
        self.entries.get(module).map(|entry| Arc::clone(entry.value()))
    }

    /// Current eviction generation; capture it before reading a module's files.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Publishes `entry` unless an eviction happened since `seen` was read.
    /// Returns whether the entry was stored.
    pub fn store(&self, module: Module, entry: CacheEntry, seen: u64) -> bool {
        // The shard lock held by `slot` orders this check against `evict*`.
        let slot = self.entries.entry(module);
        if self.generation() != seen {
            return false;
        }
        match slot {
            Entry::Occupied(mut occupied) => {
                occupied.insert(Arc::new(entry));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(entry));
            }
        }
        true
    }

    pub fn evict(&self, module: &Module) -> bool {
        self.bump();
        self.entries.remove(module).is_some()
    }

    pub fn evict_all(&self) {
        self.bump();
        self.entries.clear();
    }

    /// Evicts every module whose resource root contains `path`.
    pub fn evict_owners(&self, path: &Path) -> usize {
        self.bump();
        let mut evicted = 0;
        self.entries.retain(|module, _| {
            if module.owns(path) {
                debug!(module = %module, path = %path.display(), "evicting cached configuration");
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, module: &Module) -> bool {
        self.entries.contains_key(module)
    }
}
