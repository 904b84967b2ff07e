use super::value::SharedValue;
use std::collections::{BTreeMap, BTreeSet};

/// Thread-safe ordered set
pub type SharedSet<T> = SharedValue<BTreeSet<T>>;

/// Thread-safe ordered map
pub type SharedMap<K, V> = SharedValue<BTreeMap<K, V>>;

impl<T: Ord> SharedValue<BTreeSet<T>> {
    /// Insert a value; returns false if it was already present
    pub fn insert(&self, value: T) -> bool {
        let mut w = self.write_ticket();
        let inserted = w.insert(value);
        if !inserted {
            w.suppress_unlock_condition();
        }
        inserted
    }

    /// Erase a value; erasing an absent value does not fire the change condition
    pub fn erase(&self, value: &T) -> bool {
        let mut w = self.write_ticket();
        let removed = w.remove(value);
        if !removed {
            w.suppress_unlock_condition();
        }
        removed
    }

    pub fn count(&self, value: &T) -> usize {
        usize::from(self.read_ticket().contains(value))
    }

    pub fn size(&self) -> usize {
        self.read_ticket().len()
    }

    pub fn clear(&self) {
        let mut w = self.write_ticket();
        if w.is_empty() {
            w.suppress_unlock_condition();
        }
        w.clear();
    }
}

impl<K: Ord, V> SharedValue<BTreeMap<K, V>> {
    /// Insert or replace an entry, returning the previous value
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.write_ticket().insert(key, value)
    }

    /// Erase an entry; erasing an absent key does not fire the change condition
    pub fn erase(&self, key: &K) -> Option<V> {
        let mut w = self.write_ticket();
        let removed = w.remove(key);
        if removed.is_none() {
            w.suppress_unlock_condition();
        }
        removed
    }

    pub fn count(&self, key: &K) -> usize {
        usize::from(self.read_ticket().contains_key(key))
    }

    pub fn size(&self) -> usize {
        self.read_ticket().len()
    }

    pub fn clear(&self) {
        let mut w = self.write_ticket();
        if w.is_empty() {
            w.suppress_unlock_condition();
        }
        w.clear();
    }

    /// Clone the values out in key order
    pub fn values_snapshot(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.read_ticket().values().cloned().collect()
    }
}
