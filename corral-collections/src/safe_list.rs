use std::time::Duration;

use corral_core::{SafetyMode, VecStore};

use crate::safe_collection::{ObjectPtr, SafeCollection};
use crate::safe_handle::SafeHandle;
use crate::safe_iter::SafeIter;

/// A thread-safe list of objects.
///
/// Thin typed view over a [`SafeCollection`] backed by a
/// [`VecStore`]: append and remove take the collection mutex for one
/// structural edit; element access goes through [`SafeHandle`]s that lock
/// each object individually after the mutex is released.
///
/// # Example
///
/// ```rust,ignore
/// use corral_collections::{SafeList, SafetyMode};
///
/// let list = SafeList::new();
/// list.append(10);
/// list.append(20);
///
/// let mut handle = list.get_with_lock(0, SafetyMode::ReadWrite);
/// if let Some(value) = handle.value_mut() {
///     *value += 1;
/// }
/// drop(handle);
///
/// assert!(list.remove(&11));
/// list.collect_garbage();
/// ```
pub struct SafeList<T> {
    collection: SafeCollection<T, VecStore<ObjectPtr<T>>>,
}

impl<T> SafeList<T> {
    pub fn new() -> Self {
        SafeList {
            collection: SafeCollection::new(VecStore::new()),
        }
    }

    /// Append a value, returning the insertion index observable at that
    /// moment.
    pub fn append(&self, value: T) -> usize {
        self.collection.append(value)
    }

    /// Remove the entry at `index`, tombstoning its object into the
    /// pending queue. Returns false when out of range. Holders of the
    /// object keep it alive until they release; reclamation happens at the
    /// next garbage-collection pass after that.
    pub fn remove_at(&self, index: usize) -> bool {
        self.collection.remove_at(index)
    }

    /// Tombstone every entry.
    pub fn remove_all(&self) {
        self.collection.remove_all();
    }

    /// Remove exactly the object `handle` is bound to, by identity rather
    /// than value equality. Returns false when the handle is empty or its
    /// object has already left the live set. The handle itself stays
    /// valid; its locks and reference are untouched.
    pub fn remove_target(&self, handle: &SafeHandle<'_, T>) -> bool {
        match handle.target_ptr() {
            Some(target) => self.collection.remove_object(target),
            None => false,
        }
    }

    /// A handle on the entry at `index`, locked in `mode`. Empty when out
    /// of range. Blocks while an incompatible holder is inside the
    /// object's lock - never while holding the collection mutex.
    pub fn get_with_lock(&self, index: usize, mode: SafetyMode) -> SafeHandle<'_, T> {
        SafeHandle::from_index(&self.collection, index, mode)
    }

    /// Iterate the list, yielding one handle per element in `mode`.
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
        T: Send + Sync + 'static,
    {
        self.collection.set_auto_delete(period);
    }

    /// Run garbage collection automatically at the default period.
    pub fn enable_auto_delete(&self)
    where
        T: Send + Sync + 'static,
    {
        self.collection.enable_auto_delete();
    }

    /// Stop the automatic garbage collection, if running.
    pub fn cancel_auto_delete(&self) {
        self.collection.cancel_auto_delete();
    }
}

impl<T: PartialEq> SafeList<T> {
    /// Remove the first entry equal to `value`. Returns whether one was
    /// found.
    ///
    /// The scan compares values under the collection mutex using fail-fast
    /// read probes; an entry whose writer is currently inside its lock is
    /// skipped. Expected cost is O(n) over the backing `Vec`.
    pub fn remove(&self, value: &T) -> bool {
        self.collection.remove_where(|candidate| candidate == value)
    }

    /// A handle on the first entry equal to `value`, locked in `mode`.
    /// Empty when no entry matches. Same scan discipline as
    /// [`remove`](Self::remove); the per-object lock is acquired after the
    /// collection mutex is released.
    pub fn find_with_lock(&self, value: &T, mode: SafetyMode) -> SafeHandle<'_, T> {
        match self
            .collection
            .capture_where(|candidate| candidate == value)
        {
            Some(captured) => SafeHandle::from_captured(&self.collection, captured, mode),
            None => SafeHandle::empty_in(&self.collection),
        }
    }
}

impl<T> Default for SafeList<T> {
    fn default() -> Self {
        Self::new()
    }
}
