use std::cell::UnsafeCell;

use parking_lot::lock_api::RawRwLock as _;
use parking_lot::{Mutex, RawRwLock};

use super::AcquireError;

/// Scalars protected jointly by the guard mutex.
///
/// Keeping the count and the flag under one mutex makes their combined
/// reading atomic with respect to [`SafeObject::mark_removed`].
#[derive(Debug)]
struct SafetyState {
    ref_count: usize,
    removed: bool,
}

/// A value participating in the reference-count + reader/writer + tombstone
/// protocol.
///
/// A `SafeObject` has four externally visible states: unused, referenced,
/// reading and writing, with the additional one-way rider of "being
/// removed". The removal flag prevents new references and locks from being
/// granted while existing holders remain valid until they release; the
/// object can be reclaimed only once it is tombstoned, unreferenced and
/// unlocked (see [`is_deletable`](SafeObject::is_deletable)).
///
/// # Protocol
///
/// ```text
/// unused ──reference()──► referenced ──acquire_read()──►  reading
///                              │       ◄─release_read()
///                              │
///                              └───────acquire_write()──► writing
///                                      ◄─release_write()
///
/// mark_removed(): any state, one-way; blocks new reference/acquire
/// ```
///
/// Lock ordering: the guard mutex is always taken before the reader/writer
/// lock. Releases may happen in either order.
///
/// # Usage
///
/// Collections wrap their elements in `SafeObject` and hand out access
/// through `SafeHandle` (in `corral-collections`), which packages the
/// reference/lock pairing across arbitrary control flow. Direct use of the
/// unsafe release and value methods is reserved for such wrappers.
pub struct SafeObject<T> {
    state: Mutex<SafetyState>,
    rw: RawRwLock,
    value: UnsafeCell<T>,
}

// Safety: the value is only handed out under the reader/writer lock, so
// shared access across threads requires T: Sync and handing a writer's
// exclusive access to another thread requires T: Send.
unsafe impl<T: Send> Send for SafeObject<T> {}
unsafe impl<T: Send + Sync> Sync for SafeObject<T> {}

impl<T> SafeObject<T> {
    /// Create a new object in the unused state: unreferenced, unlocked and
    /// not flagged for removal.
    pub fn new(value: T) -> Self {
        SafeObject {
            state: Mutex::new(SafetyState {
                ref_count: 0,
                removed: false,
            }),
            rw: RawRwLock::INIT,
            value: UnsafeCell::new(value),
        }
    }

    /// Increment the reference count.
    ///
    /// A holder of a reference is guaranteed the object will not be
    /// reclaimed, but gets no access to its data. Fails with
    /// [`AcquireError::ObjectRemoved`] once the object is tombstoned, in
    /// which case the calling thread must cease using the object.
    pub fn reference(&self) -> Result<(), AcquireError> {
        let mut state = self.state.lock();
        if state.removed {
            return Err(AcquireError::ObjectRemoved);
        }
        state.ref_count += 1;
        Ok(())
    }

    /// Decrement the reference count. Never fails.
    ///
    /// # Safety
    ///
    /// Must pair with a successful [`reference`](SafeObject::reference) (or
    /// with a lock acquisition's implicit reference) by the same holder. An
    /// unpaired call can drive the count to zero while other holders exist,
    /// which would let the object be reclaimed under them.
    pub unsafe fn dereference(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.ref_count > 0, "dereference without a reference");
        state.ref_count = state.ref_count.saturating_sub(1);
    }

    /// Lock the object for read-only access, blocking while a writer is
    /// present. Multiple concurrent readers are permitted.
    ///
    /// Fails with [`AcquireError::ObjectRemoved`] if the object is
    /// tombstoned, including when the tombstone is set while this call is
    /// blocked waiting for the lock. On failure no lock is held.
    ///
    /// The caller is expected to already hold a reference; the reference is
    /// what keeps the object alive across the blocking wait.
    pub fn acquire_read(&self) -> Result<(), AcquireError> {
        let state = self.state.lock();
        if state.removed {
            return Err(AcquireError::ObjectRemoved);
        }

        // Fast path: take the lock while still holding the guard, so a
        // concurrent mark_removed cannot slip in between.
        if self.rw.try_lock_shared() {
            return Ok(());
        }

        // Slow path: wait without the guard held, then recheck the flag.
        drop(state);
        self.rw.lock_shared();

        let state = self.state.lock();
        if state.removed {
            // Safety: the shared lock was acquired just above.
            unsafe { self.rw.unlock_shared() };
            return Err(AcquireError::ObjectRemoved);
        }
        Ok(())
    }

    /// Release the read-only lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a shared lock obtained through a successful
    /// [`acquire_read`](SafeObject::acquire_read) or
    /// [`try_acquire_read`](SafeObject::try_acquire_read).
    pub unsafe fn release_read(&self) {
        unsafe { self.rw.unlock_shared() }
    }

    /// Lock the object for read/write access, blocking while any reader or
    /// another writer is present. At most one writer may hold the lock.
    ///
    /// Failure semantics are identical to
    /// [`acquire_read`](SafeObject::acquire_read).
    pub fn acquire_write(&self) -> Result<(), AcquireError> {
        let state = self.state.lock();
        if state.removed {
            return Err(AcquireError::ObjectRemoved);
        }

        if self.rw.try_lock_exclusive() {
            return Ok(());
        }

        drop(state);
        self.rw.lock_exclusive();

        let state = self.state.lock();
        if state.removed {
            // Safety: the exclusive lock was acquired just above.
            unsafe { self.rw.unlock_exclusive() };
            return Err(AcquireError::ObjectRemoved);
        }
        Ok(())
    }

    /// Release the read/write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the exclusive lock obtained through a successful
    /// [`acquire_write`](SafeObject::acquire_write) or
    /// [`try_acquire_write`](SafeObject::try_acquire_write).
    pub unsafe fn release_write(&self) {
        unsafe { self.rw.unlock_exclusive() }
    }

    /// Fail-fast variant of [`acquire_read`](SafeObject::acquire_read).
    ///
    /// Returns `Ok(true)` when the shared lock was taken, `Ok(false)` when
    /// it is currently unavailable, and `Err(ObjectRemoved)` when the
    /// object is tombstoned. Never blocks and never leaves partial state.
    pub fn try_acquire_read(&self) -> Result<bool, AcquireError> {
        let state = self.state.lock();
        if state.removed {
            return Err(AcquireError::ObjectRemoved);
        }
        Ok(self.rw.try_lock_shared())
    }

    /// Fail-fast variant of [`acquire_write`](SafeObject::acquire_write).
    pub fn try_acquire_write(&self) -> Result<bool, AcquireError> {
        let state = self.state.lock();
        if state.removed {
            return Err(AcquireError::ObjectRemoved);
        }
        Ok(self.rw.try_lock_exclusive())
    }

    /// Set the removal flag. One-way and idempotent; does not wait for
    /// holders to leave.
    ///
    /// After this returns, no new reference or lock succeeds on the object.
    /// Existing references and locks remain valid until released.
    pub fn mark_removed(&self) {
        self.state.lock().removed = true;
    }

    /// Whether the object has been flagged for removal.
    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    /// Current reference count. Advisory; the value may be stale by the
    /// time the caller inspects it.
    pub fn reference_count(&self) -> usize {
        self.state.lock().ref_count
    }

    /// Whether the object can be reclaimed: tombstoned, unreferenced and
    /// with no reader or writer inside the lock.
    ///
    /// The lock is probed with a momentary exclusive acquisition that fails
    /// fast. Releases of the lock and the reference may happen in either
    /// order, so a zero count can momentarily coexist with a still-held
    /// lock; the probe rejects that window.
    pub fn is_deletable(&self) -> bool {
        let state = self.state.lock();
        if !state.removed || state.ref_count != 0 {
            return false;
        }
        if self.rw.try_lock_exclusive() {
            // Safety: the exclusive lock was acquired just above.
            unsafe { self.rw.unlock_exclusive() };
            true
        } else {
            false
        }
    }

    /// Shared access to the value.
    ///
    /// # Safety
    ///
    /// The caller must hold a read or write lock on this object for the
    /// whole lifetime of the returned borrow.
    pub unsafe fn value(&self) -> &T {
        unsafe { &*self.value.get() }
    }

    /// Exclusive access to the value.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock on this object for the whole
    /// lifetime of the returned borrow, and must not create any other
    /// borrow of the value while it lives.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn value_mut(&self) -> &mut T {
        unsafe { &mut *self.value.get() }
    }

}

impl<T: std::fmt::Debug> std::fmt::Debug for SafeObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SafeObject")
            .field("ref_count", &state.ref_count)
            .field("removed", &state.removed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::super::AcquireError;
    use super::*;

    #[test]
    fn test_reference_dereference_balances() {
        let obj = SafeObject::new(5);
        assert_eq!(obj.reference_count(), 0);

        obj.reference().unwrap();
        obj.reference().unwrap();
        assert_eq!(obj.reference_count(), 2);

        unsafe { obj.dereference() };
        unsafe { obj.dereference() };
        assert_eq!(obj.reference_count(), 0);
    }

    #[test]
    fn test_read_acquire_release_leaves_state_unchanged() {
        let obj = SafeObject::new(5);
        obj.reference().unwrap();

        obj.acquire_read().unwrap();
        assert_eq!(obj.reference_count(), 1);
        assert!(!obj.is_removed());
        unsafe { obj.release_read() };

        // The lock is free again
        assert!(obj.try_acquire_write().unwrap());
        unsafe { obj.release_write() };

        unsafe { obj.dereference() };
    }

    #[test]
    fn test_mark_removed_is_idempotent() {
        let obj = SafeObject::new(5);
        obj.mark_removed();
        assert!(obj.is_removed());
        obj.mark_removed();
        assert!(obj.is_removed());
    }

    #[test]
    fn test_tombstone_blocks_new_acquires() {
        let obj = SafeObject::new(5);
        obj.reference().unwrap();
        obj.mark_removed();

        assert_eq!(obj.reference(), Err(AcquireError::ObjectRemoved));
        assert_eq!(obj.acquire_read(), Err(AcquireError::ObjectRemoved));
        assert_eq!(obj.acquire_write(), Err(AcquireError::ObjectRemoved));
        assert_eq!(obj.try_acquire_read(), Err(AcquireError::ObjectRemoved));

        unsafe { obj.dereference() };
    }

    #[test]
    fn test_existing_lock_survives_tombstone() {
        let obj = SafeObject::new(5);
        obj.reference().unwrap();
        obj.acquire_read().unwrap();

        obj.mark_removed();

        // The reader is still inside the lock, so the object must not be
        // reclaimable yet.
        assert!(!obj.is_deletable());
        assert_eq!(unsafe { *obj.value() }, 5);

        unsafe { obj.release_read() };
        unsafe { obj.dereference() };
        assert!(obj.is_deletable());
    }

    #[test]
    fn test_is_deletable_requires_all_three_conditions() {
        let obj = SafeObject::new(5);

        // Live and unreferenced: not deletable
        assert!(!obj.is_deletable());

        // Tombstoned but referenced: not deletable
        obj.reference().unwrap();
        obj.mark_removed();
        assert!(!obj.is_deletable());

        unsafe { obj.dereference() };
        assert!(obj.is_deletable());
    }

    #[test]
    fn test_multiple_readers_allowed() {
        let obj = SafeObject::new(5);
        obj.acquire_read().unwrap();
        obj.acquire_read().unwrap();

        // A writer cannot enter while readers are present
        assert!(!obj.try_acquire_write().unwrap());

        unsafe { obj.release_read() };
        unsafe { obj.release_read() };
        assert!(obj.try_acquire_write().unwrap());
        unsafe { obj.release_write() };
    }

    #[test]
    fn test_writer_excludes_readers() {
        let obj = SafeObject::new(5);
        obj.acquire_write().unwrap();
        assert!(!obj.try_acquire_read().unwrap());
        unsafe { obj.release_write() };
        assert!(obj.try_acquire_read().unwrap());
        unsafe { obj.release_read() };
    }

    #[test]
    fn test_blocked_reader_observes_tombstone_set_during_wait() {
        let obj = Arc::new(SafeObject::new(5));
        let referenced = Arc::new(std::sync::Barrier::new(2));
        obj.reference().unwrap();
        obj.acquire_write().unwrap();

        let reader = {
            let obj = Arc::clone(&obj);
            let referenced = Arc::clone(&referenced);
            thread::spawn(move || {
                obj.reference().unwrap();
                referenced.wait();
                let outcome = obj.acquire_read();
                unsafe { obj.dereference() };
                outcome
            })
        };

        // Let the reader reach the blocking wait, then tombstone the object
        // before releasing the writer.
        referenced.wait();
        thread::sleep(Duration::from_millis(50));
        obj.mark_removed();
        unsafe { obj.release_write() };

        assert_eq!(reader.join().unwrap(), Err(AcquireError::ObjectRemoved));

        unsafe { obj.dereference() };
        assert!(obj.is_deletable());
    }

    #[test]
    fn test_concurrent_reference_storm_balances() {
        let obj = Arc::new(SafeObject::new(0u64));
        let threads = 8;
        let per_thread = 10_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let obj = Arc::clone(&obj);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        obj.reference().unwrap();
                        unsafe { obj.dereference() };
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(obj.reference_count(), 0);
    }
}
