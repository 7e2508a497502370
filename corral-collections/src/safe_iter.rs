use corral_core::SafetyMode;

use crate::safe_handle::{SafeEnumerable, SafeHandle};

/// Iterator yielding a fresh [`SafeHandle`] per collection entry.
///
/// An internal Reference-mode cursor walks the collection, so entries
/// removed concurrently are skipped without ever touching a freed address.
/// Each yielded handle enters the requested mode independently; an entry
/// tombstoned between the cursor step and the lock is silently skipped.
///
/// A `ReadWrite` iteration locks each element exclusively while the caller
/// holds its handle, one element at a time - dropping the yielded handle
/// before pulling the next keeps at most one lock outstanding.
pub struct SafeIter<'c, T> {
    cursor: SafeHandle<'c, T>,
    mode: SafetyMode,
    started: bool,
}

impl<'c, T> SafeIter<'c, T> {
    pub(crate) fn new(collection: &'c dyn SafeEnumerable<T>, mode: SafetyMode) -> Self {
        SafeIter {
            cursor: SafeHandle::from_index(collection, 0, SafetyMode::Reference),
            mode,
            started: false,
        }
    }
}

impl<'c, T> Iterator for SafeIter<'c, T> {
    type Item = SafeHandle<'c, T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.started {
                if !self.cursor.next() {
                    return None;
                }
            } else {
                self.started = true;
            }
            if self.cursor.is_empty() {
                return None;
            }
            let yielded = self.cursor.clone_with_mode(self.mode);
            if !yielded.is_empty() {
                return Some(yielded);
            }
            // Tombstoned under our feet: move on.
        }
    }
}
