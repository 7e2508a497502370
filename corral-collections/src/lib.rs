//! Thread-safe object collections.
//!
//! This crate solves the general problem of a collection of long-lived
//! objects that many threads concurrently add to, locate in, read, mutate,
//! enumerate and remove from - without data races, use-after-free, or
//! holding a collection-wide lock during per-object work.
//!
//! # Design
//!
//! ```text
//! User Code
//!    ↓ uses
//! SafeList / SafeDictionary        ← Typed facades
//!    ↓ thin wrappers over
//! SafeCollection                   ← Membership, pending queue, GC
//!    ↓ hands out
//! SafeHandle                       ← Scoped reference + lock + traversal
//!    ↓ drives
//! SafeObject (corral-core)         ← Per-object safety protocol
//!    ↓ stored in
//! VecStore / HashStore             ← Injected backing containers
//! ```
//!
//! Adding an object locks only the collection, briefly. Locating an object
//! takes the collection mutex for the lookup, then releases it before the
//! per-object lock is acquired, so a long-held object lock never stalls the
//! collection. Removal tombstones the object and parks it on a pending
//! queue; the memory is reclaimed by garbage collection once the last
//! holder lets go.
//!
//! # Example
//!
//! ```rust,ignore
//! use corral_collections::{SafeList, SafetyMode};
//!
//! let list = SafeList::new();
//! list.append("alpha".to_string());
//!
//! if let Some(value) = list.get_with_lock(0, SafetyMode::ReadOnly).value() {
//!     println!("{value}");
//! }
//!
//! list.remove(&"alpha".to_string());
//! list.collect_garbage();
//! ```

pub mod common_tests;
pub mod safe_collection;
pub mod safe_dictionary;
pub mod safe_handle;
pub mod safe_iter;
pub mod safe_list;

pub use corral_core::{
    AcquireError, HashStore, KeyedStore, SafeObject, SafetyMode, SequenceStore, Store, VecStore,
};
pub use safe_collection::{DEFAULT_AUTO_DELETE_PERIOD, ObjectPtr, SafeCollection};
pub use safe_dictionary::SafeDictionary;
pub use safe_handle::{Captured, Direction, SafeEnumerable, SafeHandle};
pub use safe_iter::SafeIter;
pub use safe_list::SafeList;
