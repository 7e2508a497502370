use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use corral_core::{KeyedStore, SafeObject, SequenceStore, Store};

use crate::safe_handle::{Captured, Direction, SafeEnumerable};

/// Shared pointer to a heap-allocated [`SafeObject`] - the entry type every
/// backing store holds. Compared by identity.
///
/// The pointee is kept alive by the protocol's reference count; every
/// dereference happens inside a holder of such a reference (the
/// collection's own, or a handle's).
pub struct ObjectPtr<T>(NonNull<SafeObject<T>>);

impl<T> ObjectPtr<T> {
    /// Move `value` to the heap inside a fresh [`SafeObject`].
    fn alloc(value: T) -> Self {
        ObjectPtr(NonNull::from(Box::leak(Box::new(SafeObject::new(value)))))
    }

    /// Borrow the pointee. The lifetime is the caller's choice, as with
    /// [`NonNull::as_ref`].
    ///
    /// # Safety
    ///
    /// The object must not be reclaimed for the whole chosen lifetime.
    /// Callers ensure this by holding a reference on it, directly or
    /// through the collection.
    pub(crate) unsafe fn as_ref<'a>(&self) -> &'a SafeObject<T> {
        unsafe { self.0.as_ref() }
    }

    fn as_raw(&self) -> *mut SafeObject<T> {
        self.0.as_ptr()
    }
}

impl<T> Clone for ObjectPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectPtr<T> {}

impl<T> PartialEq for ObjectPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for ObjectPtr<T> {}

impl<T> std::fmt::Debug for ObjectPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectPtr").field(&self.0).finish()
    }
}

// Safety: the pointee is only reached through the safety protocol. Handing
// the pointer to another thread can expose &SafeObject<T> there, which
// requires T: Send + Sync (values are dropped on the collecting thread and
// read concurrently through shared locks).
unsafe impl<T: Send + Sync> Send for ObjectPtr<T> {}
unsafe impl<T: Send + Sync> Sync for ObjectPtr<T> {}

/// Period used by facades that enable garbage collection without an
/// explicit choice.
pub const DEFAULT_AUTO_DELETE_PERIOD: Duration = Duration::from_secs(5);

/// How often the destructor re-polls the pending queue while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Membership state: the live store plus the pending-deletion queue, under
/// one mutex. An object is in exactly one of the two (or in neither, after
/// reclamation).
struct CollectionState<T, C> {
    store: C,
    pending: VecDeque<ObjectPtr<T>>,
    // The raw entries own their SafeObject allocations.
    _owns: PhantomData<SafeObject<T>>,
}

impl<T, C: Store<ObjectPtr<T>>> CollectionState<T, C> {
    /// Move an entry that has left the live store onto the pending queue.
    ///
    /// The collection's own reference ends here; reclamation still waits on
    /// the tombstone, the remaining holders and the lock probe.
    fn retire(&mut self, entry: ObjectPtr<T>) {
        let object = unsafe { entry.as_ref() };
        object.mark_removed();
        // Safety: pairs with the reference taken when the entry was
        // inserted into the store.
        unsafe { object.dereference() };
        self.pending.push_back(entry);
    }
}

/// Shared part of a collection: what the owner and the garbage-collection
/// timer thread both reach.
struct CollectionCore<T, C> {
    state: Mutex<CollectionState<T, C>>,
}

impl<T, C: Store<ObjectPtr<T>>> CollectionCore<T, C> {
    /// Reclaim every pending object that has become deletable.
    ///
    /// Deletable entries are unlinked from the queue under the mutex; their
    /// destructors run after it is released.
    fn collect_garbage(&self) {
        let mut reclaimable = Vec::new();
        {
            let mut state = self.state.lock();
            let mut keep = VecDeque::with_capacity(state.pending.len());
            while let Some(entry) = state.pending.pop_front() {
                if unsafe { entry.as_ref() }.is_deletable() {
                    reclaimable.push(entry);
                } else {
                    keep.push_back(entry);
                }
            }
            state.pending = keep;
        }

        for entry in reclaimable {
            // Safety: the entry was allocated by this collection, is
            // tombstoned, unreferenced and unlocked, and was just unlinked
            // from the pending queue under the mutex.
            unsafe { drop(Box::from_raw(entry.as_raw())) };
        }
    }

    fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

/// A container owning [`SafeObject`]s plus a pending-deletion queue.
///
/// Structural edits (append, remove, key replacement) happen under one
/// mutex and are O(1) or a single store operation; per-object locking
/// always happens after that mutex is released. Removal never destroys an
/// object directly: it tombstones the object and parks it on the pending
/// queue, where [`collect_garbage`](SafeCollection::collect_garbage)
/// reclaims it once no holder remains. An index read therefore stays valid
/// under concurrent removal - the removed object continues to exist until
/// its referrers release.
///
/// The backing store is injected at construction. The typed facades
/// [`SafeList`](crate::SafeList) and
/// [`SafeDictionary`](crate::SafeDictionary) are the intended public
/// surface; the collection exposes only lifecycle and bookkeeping verbs.
pub struct SafeCollection<T, C: Store<ObjectPtr<T>>> {
    core: Arc<CollectionCore<T, C>>,
    auto_delete: Mutex<Option<AutoDelete>>,
}

impl<T, C: Store<ObjectPtr<T>>> SafeCollection<T, C> {
    /// Create a collection around an injected backing store.
    pub fn new(store: C) -> Self {
        SafeCollection {
            core: Arc::new(CollectionCore {
                state: Mutex::new(CollectionState {
                    store,
                    pending: VecDeque::new(),
                    _owns: PhantomData,
                }),
            }),
            auto_delete: Mutex::new(None),
        }
    }

    /// Instantaneous snapshot of the live membership size. Advisory: the
    /// value may be stale by the time the caller inspects it.
    pub fn size(&self) -> usize {
        self.core.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of tombstoned objects awaiting reclamation. Advisory.
    pub fn pending_len(&self) -> usize {
        self.core.pending_len()
    }

    /// Reclaim every pending object whose holders have all released.
    /// Objects still referenced or locked stay queued for a later pass.
    pub fn collect_garbage(&self) {
        self.core.collect_garbage();
    }

    /// Tombstone every live object and move it to the pending queue.
    pub fn remove_all(&self) {
        let mut state = self.core.state.lock();
        loop {
            let len = state.store.len();
            if len == 0 {
                break;
            }
            let Some(entry) = state.store.remove_entry_at(len - 1) else {
                break;
            };
            state.retire(entry);
        }
    }

    /// Allocate a new object for `value`, take the collection's reference
    /// and append it to the store. Returns the insertion index observable
    /// at that moment.
    pub(crate) fn append(&self, value: T) -> usize
    where
        C: SequenceStore<ObjectPtr<T>>,
    {
        let target = new_entry(value);
        let mut state = self.core.state.lock();
        state.store.append(target)
    }

    /// Remove `target` from the live store by identity and retire it.
    /// Returns false when the object is not a live member.
    pub(crate) fn remove_object(&self, target: ObjectPtr<T>) -> bool {
        let mut state = self.core.state.lock();
        match state.store.position_of(&target) {
            Some(index) => {
                let Some(entry) = state.store.remove_entry_at(index) else {
                    unreachable!("store returned an out-of-range position");
                };
                state.retire(entry);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index` and retire it. Returns false when out
    /// of range.
    pub(crate) fn remove_at(&self, index: usize) -> bool {
        let mut state = self.core.state.lock();
        match state.store.remove_entry_at(index) {
            Some(entry) => {
                state.retire(entry);
                true
            }
            None => false,
        }
    }

    /// Locate the first live entry whose value matches `predicate` and
    /// capture it (membership confirmed plus a reference taken, both under
    /// the mutex). The per-object lock is acquired by the handle afterwards.
    ///
    /// Each candidate is probed with a fail-fast read lock so the scan
    /// never blocks the collection behind a writer; a candidate currently
    /// write-locked is skipped.
    pub(crate) fn capture_where(
        &self,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> Option<Captured<T>> {
        let state = self.core.state.lock();
        for index in 0..state.store.len() {
            let target = *state.store.entry_at(index)?;
            let object = unsafe { target.as_ref() };
            if object.try_acquire_read() != Ok(true) {
                continue;
            }
            let matched = predicate(unsafe { object.value() });
            // Safety: the probe above took the shared lock.
            unsafe { object.release_read() };
            if matched {
                object.reference().ok()?;
                return Some(Captured { target, index });
            }
        }
        None
    }

    /// Remove the first live entry whose value matches `predicate`. Same
    /// probing discipline as [`capture_where`](Self::capture_where).
    pub(crate) fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        let mut state = self.core.state.lock();
        let mut found = None;
        for index in 0..state.store.len() {
            let Some(&target) = state.store.entry_at(index) else {
                break;
            };
            let object = unsafe { target.as_ref() };
            if object.try_acquire_read() != Ok(true) {
                continue;
            }
            let matched = predicate(unsafe { object.value() });
            // Safety: the probe above took the shared lock.
            unsafe { object.release_read() };
            if matched {
                found = Some(index);
                break;
            }
        }
        match found {
            Some(index) => {
                let Some(entry) = state.store.remove_entry_at(index) else {
                    return false;
                };
                state.retire(entry);
                true
            }
            None => false,
        }
    }

    /// Insert or replace the entry for `key`. A displaced object is
    /// tombstoned and parked on the pending queue; holders of it keep
    /// their locks until they release.
    pub(crate) fn set_entry<K>(&self, key: K, value: T)
    where
        C: KeyedStore<K, ObjectPtr<T>>,
    {
        let target = new_entry(value);
        let mut state = self.core.state.lock();
        if let Some(displaced) = state.store.set(key, target) {
            state.retire(displaced);
        }
    }

    /// Remove and retire the entry stored under `key`.
    pub(crate) fn remove_key_entry<K>(&self, key: &K) -> bool
    where
        C: KeyedStore<K, ObjectPtr<T>>,
    {
        let mut state = self.core.state.lock();
        match state.store.remove_key(key) {
            Some(entry) => {
                state.retire(entry);
                true
            }
            None => false,
        }
    }

    /// Capture the entry stored under `key`, if any.
    pub(crate) fn capture_key<K>(&self, key: &K) -> Option<Captured<T>>
    where
        C: KeyedStore<K, ObjectPtr<T>>,
    {
        let state = self.core.state.lock();
        let target = *state.store.entry_for(key)?;
        let index = state.store.position_of(&target)?;
        unsafe { target.as_ref() }.reference().ok()?;
        Some(Captured { target, index })
    }

    pub(crate) fn contains_key_entry<K>(&self, key: &K) -> bool
    where
        C: KeyedStore<K, ObjectPtr<T>>,
    {
        self.core.state.lock().store.entry_for(key).is_some()
    }

    /// Start (or re-arm) a repeating timer that runs
    /// [`collect_garbage`](Self::collect_garbage) every `period`.
    pub fn set_auto_delete(&self, period: Duration)
    where
        T: Send + Sync + 'static,
        C: Send + 'static,
    {
        self.cancel_auto_delete();
        let signal = Arc::new(StopSignal::default());
        let core = Arc::clone(&self.core);
        let thread = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || auto_delete_loop(core, signal, period))
        };
        *self.auto_delete.lock() = Some(AutoDelete { signal, thread });
    }

    /// [`set_auto_delete`](Self::set_auto_delete) with
    /// [`DEFAULT_AUTO_DELETE_PERIOD`].
    pub fn enable_auto_delete(&self)
    where
        T: Send + Sync + 'static,
        C: Send + 'static,
    {
        self.set_auto_delete(DEFAULT_AUTO_DELETE_PERIOD);
    }

    /// Stop the auto-delete timer, joining its thread. No-op when none is
    /// running.
    pub fn cancel_auto_delete(&self) {
        let timer = self.auto_delete.lock().take();
        if let Some(timer) = timer {
            timer.stop();
        }
    }
}

impl<T, C: Store<ObjectPtr<T>> + Default> Default for SafeCollection<T, C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

/// Allocate a [`SafeObject`] for `value` and take the collection's own
/// reference before the pointer is shared.
fn new_entry<T>(value: T) -> ObjectPtr<T> {
    let target = ObjectPtr::alloc(value);
    if unsafe { target.as_ref() }.reference().is_err() {
        unreachable!("freshly constructed object cannot be tombstoned");
    }
    target
}

impl<T, C: Store<ObjectPtr<T>>> SafeEnumerable<T> for SafeCollection<T, C> {
    fn capture_at(&self, index: usize) -> Option<Captured<T>> {
        let state = self.core.state.lock();
        let target = *state.store.entry_at(index)?;
        unsafe { target.as_ref() }.reference().ok()?;
        Some(Captured { target, index })
    }

    fn capture_neighbor(
        &self,
        current: ObjectPtr<T>,
        hint: usize,
        direction: Direction,
    ) -> Option<Captured<T>> {
        let state = self.core.state.lock();
        let index = match state.store.position_of(&current) {
            Some(index) => match direction {
                Direction::Forward => index + 1,
                Direction::Backward => index.checked_sub(1)?,
            },
            // The current object left the live store; removal shifted its
            // successor into the slot it occupied at capture time.
            None => match direction {
                Direction::Forward => hint,
                Direction::Backward => hint.checked_sub(1)?,
            },
        };
        let target = *state.store.entry_at(index)?;
        unsafe { target.as_ref() }.reference().ok()?;
        Some(Captured { target, index })
    }
}

impl<T, C: Store<ObjectPtr<T>>> Drop for SafeCollection<T, C> {
    /// Tombstone everything, then block until the pending queue drains.
    ///
    /// Handles borrow the collection, so none can still exist when this
    /// runs; the wait covers locks being released on other threads during
    /// the final garbage-collection passes. A handle leaked with
    /// `mem::forget` never releases its reference and leaks its object.
    fn drop(&mut self) {
        self.cancel_auto_delete();
        self.remove_all();
        loop {
            self.core.collect_garbage();
            if self.core.pending_len() == 0 {
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

struct AutoDelete {
    signal: Arc<StopSignal>,
    thread: thread::JoinHandle<()>,
}

impl AutoDelete {
    fn stop(self) {
        *self.signal.stopped.lock() = true;
        self.signal.wakeup.notify_all();
        let _ = self.thread.join();
    }
}

fn auto_delete_loop<T, C: Store<ObjectPtr<T>>>(
    core: Arc<CollectionCore<T, C>>,
    signal: Arc<StopSignal>,
    period: Duration,
) {
    loop {
        {
            let mut stopped = signal.stopped.lock();
            if *stopped {
                return;
            }
            signal.wakeup.wait_for(&mut stopped, period);
            if *stopped {
                return;
            }
        }
        core.collect_garbage();
    }
}
