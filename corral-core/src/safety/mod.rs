//! The per-object safety protocol.
//!
//! Every value held in a corral collection is wrapped in a [`SafeObject`],
//! which combines three pieces of state:
//!
//! ```text
//! SafeObject<T>
//!    ├── guard mutex ── { ref_count, removed }   ← joint liveness decision
//!    ├── reader/writer lock                      ← protects the user value
//!    └── value                                   ← the domain object itself
//! ```
//!
//! The guard mutex makes the combined check of the reference count and the
//! removal flag atomic with respect to removal. The reader/writer lock
//! protects the user data. The two are coupled by re-checking the removal
//! flag after the lock is granted, so a removal that slips in between the
//! guard release and the lock acquisition cannot leave a zombie lock holder.
//!
//! An object can be destroyed only once it is tombstoned, its reference
//! count has reached zero and no reader or writer remains inside the lock.

mod safe_object;
mod safety_mode;

pub use safe_object::SafeObject;
pub use safety_mode::{AcquireError, SafetyMode};
