use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Factory for [`DropProbe`] values sharing one destruction counter.
///
/// Verifies reclamation closure: after a collection is gone, the tally must
/// equal the number of probes that entered it - nothing leaked, nothing
/// dropped twice.
#[derive(Clone, Default)]
pub struct DropTally {
    drops: Arc<AtomicUsize>,
}

impl DropTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counted probe carrying `id`.
    pub fn probe(&self, id: usize) -> DropProbe {
        DropProbe {
            id,
            drops: Some(Arc::clone(&self.drops)),
        }
    }

    /// Number of counted probes destroyed so far.
    pub fn count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// A value whose destruction is counted by its [`DropTally`].
///
/// Compared by `id`, so a detached [`marker`](DropProbe::marker) can be
/// used as a lookup key without perturbing the tally.
#[derive(Debug)]
pub struct DropProbe {
    id: usize,
    drops: Option<Arc<AtomicUsize>>,
}

impl DropProbe {
    /// An uncounted value equal to the probe with the same `id`.
    pub fn marker(id: usize) -> Self {
        DropProbe { id, drops: None }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl PartialEq for DropProbe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
