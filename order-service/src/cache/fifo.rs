//! Fixed-capacity FIFO cache
//!
//! Entries are evicted in insertion order. Reads never touch the eviction
//! order and replacing the value of a resident key keeps its position.
//!
//! The eviction queue is a ring buffer (`VecDeque`) holding every resident
//! key exactly once: there is no removal other than eviction from the front,
//! and a replaced key is not re-queued, so push-back and pop-front are O(1).

use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::RwLock;

struct Inner<K, V> {
    entries: HashMap<K, V>,
    /// Resident keys, oldest insertion at the front
    order: VecDeque<K>,
}

/// Bounded key-value cache with first-in-first-out eviction
pub struct FifoCache<K, V> {
    capacity: usize,
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero yields a cache that never retains anything.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// Insert or replace `key`.
    ///
    /// Returns the evicted key, if inserting a new key pushed one out.
    pub fn set(&self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }

        let mut inner = self.inner.write();
        if let Some(slot) = inner.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        let mut evicted = None;
        if inner.entries.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.entries.remove(&oldest);
            evicted = Some(oldest);
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, value);
        evicted
    }

    /// Clone of the value stored under `key`
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.read().entries.get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.read().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resident keys from oldest to newest insertion
    pub fn keys_in_eviction_order(&self) -> Vec<K> {
        self.inner.read().order.iter().cloned().collect()
    }
}

impl<K, V> std::fmt::Debug for FifoCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.inner.read().entries.len();
        f.debug_struct("FifoCache")
            .field("capacity", &self.capacity)
            .field("len", &len)
            .finish()
    }
}
