use corral_core::{AcquireError, SafetyMode};

use crate::safe_collection::ObjectPtr;

/// Traversal direction of a handle within its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// An entry captured from a collection under its mutex: the object pointer
/// plus the index it occupied at capture time.
///
/// A captured entry always carries one reference taken on behalf of the
/// receiver; whoever adopts it must eventually dereference.
pub struct Captured<T> {
    pub target: ObjectPtr<T>,
    pub index: usize,
}

/// The traversal capability a collection grants its handles.
///
/// Every method confirms membership and takes a reference under the
/// collection mutex, then releases the mutex before the caller attempts
/// any per-object locking. `capture_neighbor` accepts the index the
/// current object occupied at its own capture time; when the object has
/// concurrently left the live store, the entry that shifted into that slot
/// is its successor, which keeps traversal progressing past removals.
pub trait SafeEnumerable<T> {
    /// Capture the entry at `index`, if in range.
    fn capture_at(&self, index: usize) -> Option<Captured<T>>;

    /// Capture the neighbor of `current` in `direction`.
    fn capture_neighbor(
        &self,
        current: ObjectPtr<T>,
        hint: usize,
        direction: Direction,
    ) -> Option<Captured<T>>;
}

/// Scoped holder of a reference - and optionally a read or write lock - on
/// one object, cursoring within one collection.
///
/// Construction referenced the target and entered the requested
/// [`SafetyMode`]; dropping the handle releases both, whatever control flow
/// leads there. An empty handle (no target) is the absence signal used for
/// out-of-range indexes, missing keys and exhausted traversal.
///
/// # Thread affinity
///
/// Handles are `!Send` and `!Sync`: a lock must be released on the thread
/// that acquired it. To hand an object to another thread, reach it again
/// through the (shareable) collection.
///
/// # Reentrancy
///
/// The protocol is non-reentrant: a thread must not acquire a second lock
/// on an object it already holds a write lock on. Mode transitions on a
/// single handle release before they re-acquire, so the handle API cannot
/// trip over itself; holding two lock-mode handles on the same object from
/// one thread is the caller's deadlock to avoid.
pub struct SafeHandle<'c, T> {
    collection: Option<&'c dyn SafeEnumerable<T>>,
    target: Option<ObjectPtr<T>>,
    cursor: usize,
    mode: SafetyMode,
}

impl<'c, T> SafeHandle<'c, T> {
    /// A handle bound to nothing.
    pub fn empty() -> Self {
        SafeHandle {
            collection: None,
            target: None,
            cursor: 0,
            mode: SafetyMode::Reference,
        }
    }

    /// An empty handle that keeps the collection association.
    pub(crate) fn empty_in(collection: &'c dyn SafeEnumerable<T>) -> Self {
        SafeHandle {
            collection: Some(collection),
            target: None,
            cursor: 0,
            mode: SafetyMode::Reference,
        }
    }

    /// Bind to the entry at `index` of `collection` in `mode`. Out of
    /// range, or a lock refused because of a concurrent removal, yields an
    /// empty handle.
    pub(crate) fn from_index(
        collection: &'c dyn SafeEnumerable<T>,
        index: usize,
        mode: SafetyMode,
    ) -> Self {
        match collection.capture_at(index) {
            Some(captured) => Self::from_captured(collection, captured, mode),
            None => Self::empty_in(collection),
        }
    }

    /// Adopt an already-captured entry and enter `mode`. On lock failure
    /// the capture's reference is rolled back and the handle is empty.
    pub(crate) fn from_captured(
        collection: &'c dyn SafeEnumerable<T>,
        captured: Captured<T>,
        mode: SafetyMode,
    ) -> Self {
        let mut handle = SafeHandle {
            collection: Some(collection),
            target: Some(captured.target),
            cursor: captured.index,
            mode: SafetyMode::Reference,
        };
        let _ = handle.enter_mode(mode);
        handle
    }

    /// Whether the handle is bound to an object.
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// The bound object's identity, for collection-side membership edits.
    pub(crate) fn target_ptr(&self) -> Option<ObjectPtr<T>> {
        self.target
    }

    /// The lock strength currently held.
    pub fn mode(&self) -> SafetyMode {
        self.mode
    }

    /// Whether the bound object has been tombstoned. A handle taken before
    /// removal stays valid; this is how it observes that the object is on
    /// its way out.
    pub fn is_target_removed(&self) -> bool {
        match self.target {
            Some(target) => unsafe { target.as_ref() }.is_removed(),
            None => false,
        }
    }

    /// Shared access to the value. `None` unless the handle holds a read
    /// or write lock - a bare reference grants liveness, not data access.
    pub fn value(&self) -> Option<&T> {
        let target = self.target?;
        match self.mode {
            SafetyMode::ReadOnly | SafetyMode::ReadWrite => {
                // Safety: the lock is held for as long as the handle stays
                // in this mode, and set_mode takes &mut self, so the borrow
                // cannot outlive the lock.
                Some(unsafe { target.as_ref().value() })
            }
            SafetyMode::Reference => None,
        }
    }

    /// Exclusive access to the value. `None` unless the handle holds the
    /// write lock.
    pub fn value_mut(&mut self) -> Option<&mut T> {
        let target = self.target?;
        match self.mode {
            SafetyMode::ReadWrite => {
                // Safety: the write lock is held, and the borrow is tied to
                // &mut self so no second borrow can be formed through this
                // handle.
                Some(unsafe { target.as_ref().value_mut() })
            }
            _ => None,
        }
    }

    /// Change the lock strength in place.
    ///
    /// Degrading to `Reference` releases the lock and keeps the reference.
    /// Upgrading from `Reference` acquires the lock; switching between read
    /// and write goes through `Reference` (release, then acquire). A failed
    /// upgrade means the object was tombstoned: the handle drops its
    /// reference, becomes empty and reports
    /// [`AcquireError::ObjectRemoved`].
    pub fn set_mode(&mut self, mode: SafetyMode) -> Result<(), AcquireError> {
        if self.target.is_none() {
            return Err(AcquireError::ObjectRemoved);
        }
        if self.mode == mode {
            return Ok(());
        }
        self.exit_lock();
        if mode == SafetyMode::Reference {
            return Ok(());
        }
        self.enter_mode(mode)
    }

    /// Release everything and unbind, keeping the collection association.
    pub fn clear(&mut self) {
        self.release_target();
    }

    /// A new handle on the same target holding only a reference. Always
    /// safe regardless of the lock this handle holds; the copy may then be
    /// upgraded independently.
    pub fn clone_reference(&self) -> SafeHandle<'c, T> {
        self.clone_with_mode(SafetyMode::Reference)
    }

    /// A new handle on the same target entering `mode` from scratch.
    ///
    /// Returns an empty handle when the target has been tombstoned. Asking
    /// for a lock mode while this handle itself holds a lock would deadlock
    /// the thread against itself and is a caller error.
    pub fn clone_with_mode(&self, mode: SafetyMode) -> SafeHandle<'c, T> {
        debug_assert!(
            self.mode == SafetyMode::Reference || mode == SafetyMode::Reference,
            "cloning into a lock mode from a lock-holding handle"
        );
        let mut handle = SafeHandle {
            collection: self.collection,
            target: None,
            cursor: self.cursor,
            mode: SafetyMode::Reference,
        };
        if let Some(target) = self.target {
            if unsafe { target.as_ref() }.reference().is_ok() {
                handle.target = Some(target);
                let _ = handle.enter_mode(mode);
            }
        }
        handle
    }

    /// Step to the next entry of the collection, keeping the current mode.
    ///
    /// Entries removed concurrently are skipped; the handle becomes empty
    /// once the end is passed. Returns whether the handle is still bound.
    pub fn next(&mut self) -> bool {
        self.step(Direction::Forward)
    }

    /// Step to the previous entry of the collection. Counterpart of
    /// [`next`](Self::next).
    pub fn previous(&mut self) -> bool {
        self.step(Direction::Backward)
    }

    fn step(&mut self, direction: Direction) -> bool {
        let Some(collection) = self.collection else {
            debug_assert!(false, "traversal requires a collection-bound handle");
            return false;
        };
        let mode = self.mode;

        // Keep the reference on the current target while relocating it, so
        // its address stays valid for the identity lookup.
        self.exit_lock();

        loop {
            let Some(current) = self.target else {
                return false;
            };
            let captured = collection.capture_neighbor(current, self.cursor, direction);
            // Safety: pairs with the reference held on the spot we are
            // stepping away from.
            unsafe { current.as_ref().dereference() };
            self.target = None;

            let Some(captured) = captured else {
                return false;
            };
            self.target = Some(captured.target);
            self.cursor = captured.index;

            let object = unsafe { captured.target.as_ref() };
            let locked = match mode {
                SafetyMode::Reference => Ok(()),
                SafetyMode::ReadOnly => object.acquire_read(),
                SafetyMode::ReadWrite => object.acquire_write(),
            };
            match locked {
                Ok(()) => {
                    self.mode = mode;
                    return true;
                }
                // Tombstoned between the capture and the lock: keep its
                // reference for the identity lookup and skip past it.
                Err(_) => continue,
            }
        }
    }

    /// Acquire the lock for `mode` on the already-referenced target. On
    /// failure the reference is rolled back and the handle becomes empty.
    fn enter_mode(&mut self, mode: SafetyMode) -> Result<(), AcquireError> {
        let Some(target) = self.target else {
            return Err(AcquireError::ObjectRemoved);
        };
        let object = unsafe { target.as_ref() };
        let outcome = match mode {
            SafetyMode::Reference => Ok(()),
            SafetyMode::ReadOnly => object.acquire_read(),
            SafetyMode::ReadWrite => object.acquire_write(),
        };
        match outcome {
            Ok(()) => {
                self.mode = mode;
                Ok(())
            }
            Err(error) => {
                // Safety: pairs with the reference taken at capture time.
                unsafe { object.dereference() };
                self.target = None;
                self.mode = SafetyMode::Reference;
                Err(error)
            }
        }
    }

    /// Release the lock, if any, keeping the reference and the target.
    fn exit_lock(&mut self) {
        if let Some(target) = self.target {
            let object = unsafe { target.as_ref() };
            match self.mode {
                SafetyMode::Reference => {}
                // Safety: the handle's mode records exactly which lock it
                // holds.
                SafetyMode::ReadOnly => unsafe { object.release_read() },
                SafetyMode::ReadWrite => unsafe { object.release_write() },
            }
            self.mode = SafetyMode::Reference;
        }
    }

    /// Release the lock and the reference, unbinding the target.
    fn release_target(&mut self) {
        self.exit_lock();
        if let Some(target) = self.target.take() {
            // Safety: pairs with the reference taken at capture time.
            unsafe { target.as_ref().dereference() };
        }
    }
}

impl<T> Default for SafeHandle<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for SafeHandle<'_, T> {
    fn drop(&mut self) {
        self.release_target();
    }
}

/// Identity comparison: two handles are equal when they are bound to the
/// same object instance (or both empty).
impl<T> PartialEq for SafeHandle<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T> std::fmt::Debug for SafeHandle<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeHandle")
            .field("bound", &self.target.is_some())
            .field("mode", &self.mode)
            .field("cursor", &self.cursor)
            .finish()
    }
}
