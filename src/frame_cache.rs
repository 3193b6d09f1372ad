//! Bounded memo of combined per-frame visualization vectors.
//!
//! Eviction is insertion-order, deliberately not LRU: a frame result is
//! cheap to recompute, so this cache only needs to absorb the render
//! loop's near-term revisits (playback loops, scrubbing). The expensive
//! decoded features live in the access-ordered store cache instead.

use indexmap::IndexMap;

#[derive(Debug)]
pub struct FrameCache {
    entries: IndexMap<u32, Vec<f32>>,
    capacity: usize,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, frame: u32) -> Option<&[f32]> {
        self.entries.get(&frame).map(|v| v.as_slice())
    }

    /// Insert, evicting the oldest-inserted entry at capacity.
    pub fn insert(&mut self, frame: u32, values: Vec<f32>) {
        if !self.entries.contains_key(&frame) && self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(frame, values);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_eviction_ignores_access() {
        let mut cache = FrameCache::new(3);
        cache.insert(0, vec![0.0]);
        cache.insert(1, vec![0.1]);
        cache.insert(2, vec![0.2]);

        // Reads must not promote: frame 0 is still first out
        assert!(cache.get(0).is_some());
        cache.insert(3, vec![0.3]);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(0).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_reinsert_existing_frame_keeps_size() {
        let mut cache = FrameCache::new(2);
        cache.insert(5, vec![0.5]);
        cache.insert(6, vec![0.6]);
        cache.insert(5, vec![0.55]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(5), Some(&[0.55f32][..]));
        assert!(cache.get(6).is_some());
    }

    #[test]
    fn test_clear() {
        let mut cache = FrameCache::new(2);
        cache.insert(1, vec![0.1]);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(1).is_none());
    }
}
