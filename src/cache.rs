//! Bounded, path-keyed handle cache.
//!
//! [`ReaderCache`] keeps at most a fixed number of open handles (demuxer
//! contexts, decoder state, and so on), keyed by file path. When full, the
//! least-frequently-used entry is evicted, with least-recently-used as the
//! tie break; eviction drops the handle, releasing its resources.
//!
//! The lookup contract mirrors how the cache is driven by
//! [`SampleReader`](crate::SampleReader): the caller checks
//! [`not_full`](ReaderCache::not_full) and [`contains`](ReaderCache::contains)
//! first, constructs a fresh handle only when one will actually be
//! inserted, and passes it to [`find`](ReaderCache::find).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::FrameSeekError;

struct CacheEntry<V> {
    value: V,
    access_count: u64,
    last_accessed: u64,
}

/// A bounded cache of per-file handles with frequency/recency eviction.
pub struct ReaderCache<V> {
    capacity: usize,
    entries: HashMap<PathBuf, CacheEntry<V>>,
    clock: u64,
}

impl<V> std::fmt::Debug for ReaderCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<V> ReaderCache<V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another entry can be inserted without eviction.
    pub fn not_full(&self) -> bool {
        self.entries.len() < self.capacity
    }

    /// Whether a handle is cached for `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Look up the handle for `path`, inserting `fresh` on a miss.
    ///
    /// A hit bumps the entry's access frequency and recency. A miss
    /// inserts `fresh`, evicting the least-frequently-used entry first if
    /// the cache is full.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::Configuration`] on a miss with no `fresh` handle;
    /// the caller's check-then-construct sequence was violated.
    pub fn find(&mut self, path: &Path, fresh: Option<V>) -> Result<&mut V, FrameSeekError> {
        self.clock += 1;

        if !self.entries.contains_key(path) {
            let value = match fresh {
                Some(value) => value,
                None => {
                    return Err(FrameSeekError::Configuration(format!(
                        "reader cache miss for {} with no replacement handle",
                        path.display(),
                    )));
                }
            };

            if self.entries.len() >= self.capacity {
                self.evict_one();
            }

            self.entries.insert(
                path.to_path_buf(),
                CacheEntry {
                    value,
                    access_count: 0,
                    last_accessed: self.clock,
                },
            );
        }

        let entry = self.entries.get_mut(path).ok_or_else(|| {
            FrameSeekError::Configuration("reader cache entry vanished during lookup".to_string())
        })?;
        entry.access_count += 1;
        entry.last_accessed = self.clock;
        Ok(&mut entry.value)
    }

    /// Drop every cached handle.
    pub fn clear_all(&mut self) {
        log::debug!("Clearing reader cache ({} entries)", self.entries.len());
        self.entries.clear();
    }

    /// Evict the least-frequently-used entry, oldest access breaking ties.
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.last_accessed))
            .map(|(path, _)| path.clone());

        if let Some(path) = victim {
            log::debug!("Evicting cached reader: {}", path.display());
            self.entries.remove(&path);
        }
    }
}
