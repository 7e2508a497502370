use std::hash::Hash;
use std::time::Duration;

use corral_core::{HashStore, SafetyMode};

use crate::safe_collection::{ObjectPtr, SafeCollection};
use crate::safe_handle::SafeHandle;
use crate::safe_iter::SafeIter;

/// A thread-safe dictionary of objects.
///
/// Thin typed view over a [`SafeCollection`] backed by a
/// [`HashStore`]. Key operations are O(1) expected; enumeration (by index
/// or iteration) visits entries in insertion order.
///
/// Replacing the object under a key tombstones the displaced object into
/// the pending queue: a holder that found it earlier keeps a valid lock
/// until it releases, while new lookups see the replacement.
pub struct SafeDictionary<K: Hash + Eq + Clone, T> {
    collection: SafeCollection<T, HashStore<K, ObjectPtr<T>>>,
}

impl<K: Hash + Eq + Clone, T> SafeDictionary<K, T> {
    pub fn new() -> Self {
        SafeDictionary {
            collection: SafeCollection::new(HashStore::new()),
        }
    }

    /// Insert or replace the object stored under `key`. A displaced
    /// object is tombstoned and reclaimed once its holders release.
    pub fn set_at(&self, key: K, value: T) {
        self.collection.set_entry(key, value);
    }

    /// Remove the object stored under `key`, tombstoning it. Returns
    /// whether the key was present.
    pub fn remove_at(&self, key: &K) -> bool {
        self.collection.remove_key_entry(key)
    }

    /// Tombstone every entry.
    pub fn remove_all(&self) {
        self.collection.remove_all();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.collection.contains_key_entry(key)
    }

    /// A handle on the object stored under `key`, locked in `mode`. Empty
    /// when the key is absent. The lookup happens under the collection
    /// mutex; the per-object lock is acquired after it is released.
    pub fn find_with_lock(&self, key: &K, mode: SafetyMode) -> SafeHandle<'_, T> {
        match self.collection.capture_key(key) {
            Some(captured) => SafeHandle::from_captured(&self.collection, captured, mode),
            None => SafeHandle::empty_in(&self.collection),
        }
    }

    /// A handle on the entry at `index` in insertion order. Empty when out
    /// of range.
    pub fn get_with_lock(&self, index: usize, mode: SafetyMode) -> SafeHandle<'_, T> {
        SafeHandle::from_index(&self.collection, index, mode)
    }

    /// Iterate the dictionary's objects in insertion order, one handle per
    /// entry.
    pub fn iter_with_lock(&self, mode: SafetyMode) -> SafeIter<'_, T> {
        SafeIter::new(&self.collection, mode)
    }

    /// Instantaneous snapshot of the number of live entries. Advisory.
    pub fn len(&self) -> usize {
        self.collection.size()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Number of tombstoned objects awaiting reclamation. Advisory.
    pub fn pending_len(&self) -> usize {
        self.collection.pending_len()
    }

    /// Reclaim pending objects whose holders have all released.
    pub fn collect_garbage(&self) {
        self.collection.collect_garbage();
    }

    /// Run garbage collection automatically every `period`.
    pub fn set_auto_delete(&self, period: Duration)
    where
        K: Send + 'static,
        T: Send + Sync + 'static,
    {
        self.collection.set_auto_delete(period);
    }

    /// Run garbage collection automatically at the default period.
    pub fn enable_auto_delete(&self)
    where
        K: Send + 'static,
        T: Send + Sync + 'static,
    {
        self.collection.enable_auto_delete();
    }

    /// Stop the automatic garbage collection, if running.
    pub fn cancel_auto_delete(&self) {
        self.collection.cancel_auto_delete();
    }
}

impl<K: Hash + Eq + Clone, T> Default for SafeDictionary<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
