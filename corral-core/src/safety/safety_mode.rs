use thiserror::Error;

/// Lock strength a holder has on a [`SafeObject`](crate::SafeObject).
///
/// - **Reference**: the holder keeps the object alive but has no access to
///   its data. Any number of holders may be in this mode.
/// - **ReadOnly**: shared access to the data. Multiple concurrent readers
///   are permitted; no writer can be present.
/// - **ReadWrite**: exclusive access to the data. At most one writer, and
///   only while no reader is present.
///
/// Every lock mode carries an implicit reference: a reader or writer always
/// keeps the object alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyMode {
    #[default]
    Reference,
    ReadOnly,
    ReadWrite,
}

/// Failure of an acquire-class operation on a [`SafeObject`](crate::SafeObject).
///
/// These are first-class outcomes, not exceptional conditions. A caller
/// that receives [`ObjectRemoved`](AcquireError::ObjectRemoved) must abandon
/// the object; the flag is one-way and the failure is permanent for that
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The object is tombstoned; no new reference or lock can be granted.
    #[error("object is flagged for removal")]
    ObjectRemoved,

    /// Reserved for a future reentrant acquisition policy. The current
    /// policy is non-reentrant and never reports this.
    #[error("acquisition would deadlock the calling thread")]
    WouldDeadlock,
}
