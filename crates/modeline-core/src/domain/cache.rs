//! Bounded cache of modes synthesized at runtime.
//!
//! Every synthesized resolution becomes a mode object on the display server.
//! Left alone, a client that keeps resizing its window would accumulate an
//! unbounded number of them, so the host remembers what it created here and
//! reclaims the oldest entry once the cache grows past its capacity.
//!
//! # Insertion order, not recency
//!
//! Re-requesting a size that is already cached does NOT move it to the back
//! of the queue: eviction priority is decided by when a mode was first
//! created.  [`ModeCache::put`] on an existing key replaces the value in place.
//!
//! The cache only does bookkeeping.  Releasing the server-side object for an
//! evicted or removed entry is the caller's job; the value is handed back so
//! the caller can do that.

use std::collections::VecDeque;
use std::mem;

use thiserror::Error;
use tracing::debug;

use super::mode::ModeKey;

/// Default number of synthesized modes kept alive at once.
pub const DEFAULT_MAX_NEW_MODES: usize = 32;

/// Smallest accepted capacity.
///
/// With a capacity of one, adding a second size would evict the mode that is
/// about to be switched away from.
pub const MIN_MAX_NEW_MODES: usize = 2;

/// Error type for cache construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("mode cache capacity must be at least 2, got {0}")]
    CapacityTooSmall(usize),
}

/// Insertion-ordered map from [`ModeKey`] to an owned value, oldest first.
///
/// Capacities are small (tens of entries), so lookups are linear scans over a
/// `VecDeque` that also records insertion order.
#[derive(Debug)]
pub struct ModeCache<V> {
    entries: VecDeque<(ModeKey, V)>,
    capacity: usize,
}

impl<V> ModeCache<V> {
    /// Creates an empty cache holding at most `capacity` entries after eviction.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CapacityTooSmall`] if `capacity < MIN_MAX_NEW_MODES`.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity < MIN_MAX_NEW_MODES {
            return Err(CacheError::CapacityTooSmall(capacity));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value cached for `key`, if any.
    pub fn get(&self, key: &ModeKey) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable access to the value cached for `key`.
    pub fn get_mut(&mut self, key: &ModeKey) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &ModeKey) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `value` under `key`.
    ///
    /// A new key goes to the back of the eviction queue.  An existing key
    /// keeps its position and its previous value is returned.
    pub fn put(&mut self, key: ModeKey, value: V) -> Option<V> {
        if let Some(existing) = self.get_mut(&key) {
            return Some(mem::replace(existing, value));
        }
        self.entries.push_back((key, value));
        None
    }

    /// Pops the single oldest entry if the cache holds more than
    /// [`capacity`](Self::capacity) entries.
    ///
    /// Called after every [`put`](Self::put).  The entry leaves the cache
    /// whether or not the caller manages to release it.
    pub fn evict_if_needed(&mut self) -> Option<(ModeKey, V)> {
        if self.entries.len() <= self.capacity {
            return None;
        }
        let evicted = self.entries.pop_front();
        if let Some((key, _)) = &evicted {
            debug!(%key, len = self.entries.len(), "evicting oldest synthesized mode");
        }
        evicted
    }

    /// Removes `key`, returning its value.  Absent keys are a no-op.
    pub fn remove(&mut self, key: &ModeKey) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        self.entries.remove(index).map(|(_, v)| v)
    }

    /// Keys in eviction order (oldest first).
    pub fn keys(&self) -> impl Iterator<Item = ModeKey> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// Empties the cache, yielding entries oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = (ModeKey, V)> + '_ {
        self.entries.drain(..)
    }
}

impl<V> Default for ModeCache<V> {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_MAX_NEW_MODES + 1),
            capacity: DEFAULT_MAX_NEW_MODES,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(w: u32, h: u32) -> ModeKey {
        ModeKey::new(w, h)
    }

    #[test]
    fn test_new_rejects_capacity_below_two() {
        assert_eq!(
            ModeCache::<u64>::new(1).unwrap_err(),
            CacheError::CapacityTooSmall(1)
        );
        assert!(ModeCache::<u64>::new(0).is_err());
        assert!(ModeCache::<u64>::new(2).is_ok());
    }

    #[test]
    fn test_default_capacity_is_32() {
        let cache = ModeCache::<u64>::default();
        assert_eq!(cache.capacity(), DEFAULT_MAX_NEW_MODES);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_then_get_returns_value() {
        // Arrange
        let mut cache = ModeCache::new(4).expect("capacity");

        // Act
        let replaced = cache.put(key(800, 600), 7u64);

        // Assert
        assert_eq!(replaced, None);
        assert_eq!(cache.get(&key(800, 600)), Some(&7));
        assert_eq!(cache.get(&key(1024, 768)), None);
    }

    #[test]
    fn test_put_existing_key_replaces_value_without_reordering() {
        // Arrange
        let mut cache = ModeCache::new(4).expect("capacity");
        cache.put(key(800, 600), 1u64);
        cache.put(key(1024, 768), 2);

        // Act
        let replaced = cache.put(key(800, 600), 3);

        // Assert: old value handed back, position unchanged
        assert_eq!(replaced, Some(1));
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.keys().collect::<Vec<_>>(),
            vec![key(800, 600), key(1024, 768)]
        );
        assert_eq!(cache.get(&key(800, 600)), Some(&3));
    }

    #[test]
    fn test_evict_if_needed_is_noop_at_capacity() {
        let mut cache = ModeCache::new(2).expect("capacity");
        cache.put(key(800, 600), 1u64);
        cache.put(key(1024, 768), 2);

        assert_eq!(cache.evict_if_needed(), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evict_if_needed_pops_oldest_single_entry() {
        // Arrange
        let mut cache = ModeCache::new(2).expect("capacity");
        cache.put(key(800, 600), 1u64);
        cache.put(key(1024, 768), 2);
        cache.put(key(1280, 1024), 3);

        // Act
        let evicted = cache.evict_if_needed();

        // Assert
        assert_eq!(evicted, Some((key(800, 600), 1)));
        assert_eq!(
            cache.keys().collect::<Vec<_>>(),
            vec![key(1024, 768), key(1280, 1024)]
        );
        assert_eq!(cache.evict_if_needed(), None);
    }

    #[test]
    fn test_repeated_put_does_not_refresh_eviction_priority() {
        let mut cache = ModeCache::new(2).expect("capacity");
        cache.put(key(800, 600), 1u64);
        cache.put(key(1024, 768), 2);
        // Re-requesting 800x600 keeps it the oldest entry.
        cache.put(key(800, 600), 1);
        cache.put(key(1280, 1024), 3);

        let evicted = cache.evict_if_needed().map(|(k, _)| k);

        assert_eq!(evicted, Some(key(800, 600)));
    }

    #[test]
    fn test_remove_returns_value_and_absent_key_is_none() {
        let mut cache = ModeCache::new(2).expect("capacity");
        cache.put(key(800, 600), 1u64);

        assert_eq!(cache.remove(&key(640, 480)), None);
        assert_eq!(cache.remove(&key(800, 600)), Some(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_drain_yields_oldest_first_and_empties_cache() {
        let mut cache = ModeCache::new(3).expect("capacity");
        cache.put(key(800, 600), 1u64);
        cache.put(key(1024, 768), 2);

        let drained: Vec<_> = cache.drain().collect();

        assert_eq!(drained, vec![(key(800, 600), 1), (key(1024, 768), 2)]);
        assert!(cache.is_empty());
    }
}
