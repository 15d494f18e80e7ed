//! Byte-bounded LRU cache of decoded TIFF chunks (strips or tiles).
//!
//! Each open [`TiffDataset`](crate::tiff_source::TiffDataset) owns its cache,
//! so two operations never share mutable state.

use lru::LruCache;
use std::sync::Arc;

/// Default upper bound for one dataset's decoded chunks
pub const DEFAULT_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

struct CacheEntry {
    data: Arc<Vec<f32>>,
    size_bytes: usize,
}

pub struct ChunkCache {
    current_bytes: usize,
    capacity_bytes: usize,
    entries: LruCache<u32, CacheEntry>,
}

impl ChunkCache {
    #[must_use]
    pub fn new(capacity_bytes: usize) -> Self {
        ChunkCache {
            current_bytes: 0,
            capacity_bytes,
            entries: LruCache::unbounded(),
        }
    }

    pub fn get(&mut self, chunk_index: u32) -> Option<Arc<Vec<f32>>> {
        self.entries.get(&chunk_index).map(|entry| Arc::clone(&entry.data))
    }

    pub fn contains(&self, chunk_index: u32) -> bool {
        self.entries.contains(&chunk_index)
    }

    /// Insert a decoded chunk, evicting least recently used chunks to fit.
    /// Chunks larger than the whole capacity are not cached.
    pub fn insert(&mut self, chunk_index: u32, data: Arc<Vec<f32>>) {
        let size_bytes = data.len() * std::mem::size_of::<f32>();
        if size_bytes > self.capacity_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&chunk_index) {
            self.current_bytes = self.current_bytes.saturating_sub(old.size_bytes);
        }

        while self.current_bytes + size_bytes > self.capacity_bytes {
            if let Some((_key, entry)) = self.entries.pop_lru() {
                self.current_bytes = self.current_bytes.saturating_sub(entry.size_bytes);
            } else {
                break;
            }
        }

        self.current_bytes = self.current_bytes.saturating_add(size_bytes);
        self.entries.put(chunk_index, CacheEntry { data, size_bytes });
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(len: usize, value: f32) -> Arc<Vec<f32>> {
        Arc::new(vec![value; len])
    }

    #[test]
    fn test_get_after_insert() {
        let mut cache = ChunkCache::new(1024);
        cache.insert(3, chunk(8, 1.5));
        assert!(cache.contains(3));
        assert_eq!(cache.get(3).unwrap()[0], 1.5);
        assert!(cache.get(4).is_none());
        assert_eq!(cache.size_bytes(), 32);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        // Room for exactly two 16-sample chunks
        let mut cache = ChunkCache::new(128);
        cache.insert(0, chunk(16, 0.0));
        cache.insert(1, chunk(16, 1.0));
        // Touch 0 so 1 becomes the eviction candidate
        assert!(cache.get(0).is_some());
        cache.insert(2, chunk(16, 2.0));

        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.size_bytes(), 128);
    }

    #[test]
    fn test_oversized_chunk_is_skipped() {
        let mut cache = ChunkCache::new(16);
        cache.insert(0, chunk(100, 0.0));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_reinsert_replaces_size() {
        let mut cache = ChunkCache::new(1024);
        cache.insert(0, chunk(10, 0.0));
        cache.insert(0, chunk(20, 0.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 80);
    }
}
