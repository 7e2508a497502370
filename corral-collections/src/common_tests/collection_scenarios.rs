//! End-to-end scenarios binding the protocol, the collection and the
//! handles together under concrete interleavings.

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use corral_core::{AcquireError, SafetyMode};

use super::probe::{DropProbe, DropTally};
use crate::safe_dictionary::SafeDictionary;
use crate::safe_list::SafeList;

/// A reader holds an element while another thread removes it: removal
/// returns immediately, the element leaves the live set, and reclamation
/// waits for the reader to release.
pub fn scenario_concurrent_reader_and_remover() {
    let tally = DropTally::new();
    let list = SafeList::new();
    list.append(tally.probe(0));

    let acquired = Barrier::new(2);

    thread::scope(|s| {
        let reader = s.spawn(|| {
            let handle = list.get_with_lock(0, SafetyMode::ReadOnly);
            assert!(!handle.is_empty());
            acquired.wait();
            thread::sleep(Duration::from_millis(200));
            drop(handle);
        });

        acquired.wait();
        assert!(list.remove(&DropProbe::marker(0)));
        assert_eq!(list.len(), 0);
        assert_eq!(list.pending_len(), 1);

        // The reader is still inside its lock: the object must survive a
        // collection pass.
        list.collect_garbage();
        assert_eq!(tally.count(), 0);
        assert_eq!(list.pending_len(), 1);

        reader.join().unwrap();
    });

    list.collect_garbage();
    assert_eq!(tally.count(), 1);
    assert_eq!(list.pending_len(), 0);
}

/// A writer holds the element; a reader arriving later blocks until the
/// writer releases, then sees the written value.
pub fn scenario_writer_blocks_reader() {
    let list = SafeList::new();
    list.append(7u32);

    let writing = Barrier::new(2);

    thread::scope(|s| {
        let writer = s.spawn(|| {
            let mut handle = list.get_with_lock(0, SafetyMode::ReadWrite);
            *handle.value_mut().unwrap() = 8;
            writing.wait();
            thread::sleep(Duration::from_millis(100));
            drop(handle);
        });

        writing.wait();
        let started = Instant::now();
        let handle = list.get_with_lock(0, SafetyMode::ReadOnly);
        let waited = started.elapsed();

        assert!(!handle.is_empty());
        assert_eq!(handle.value(), Some(&8));
        assert!(
            waited >= Duration::from_millis(80),
            "reader entered after {waited:?} while the writer held the lock"
        );

        drop(handle);
        writer.join().unwrap();
    });

    assert_eq!(list.len(), 1);
}

/// Traversal steps over an element removed while the handle sat on its
/// predecessor, lands on the successor in the same mode, and terminates
/// empty past the end.
pub fn scenario_traversal_across_removal() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert_eq!(handle.value(), Some(&10));

    assert!(list.remove(&20));

    // The pending entry is not visited.
    assert!(handle.next());
    assert_eq!(handle.value(), Some(&30));
    assert_eq!(handle.mode(), SafetyMode::ReadOnly);

    assert!(!handle.next());
    assert!(handle.is_empty());

    drop(handle);
    list.collect_garbage();
    assert_eq!(list.len(), 2);
    assert_eq!(list.pending_len(), 0);
}

/// If every successor is removed mid-traversal the handle comes up empty.
pub fn scenario_traversal_into_fully_removed_tail() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert!(list.remove(&20));
    assert!(list.remove(&30));

    assert!(!handle.next());
    assert!(handle.is_empty());
}

/// Replacing a key tombstones the displaced object without invalidating a
/// lock already held on it; the key immediately serves the replacement.
pub fn scenario_dictionary_replacement() {
    let tally = DropTally::new();
    let dict = SafeDictionary::new();
    dict.set_at("k", tally.probe(1));

    let held = dict.find_with_lock(&"k", SafetyMode::ReadOnly);
    assert_eq!(held.value().map(DropProbe::id), Some(1));

    dict.set_at("k", tally.probe(2));
    assert_eq!(dict.len(), 1);
    assert_eq!(dict.pending_len(), 1);

    // The displaced object is tombstoned but the held lock stays valid.
    assert!(held.is_target_removed());
    assert_eq!(held.value().map(DropProbe::id), Some(1));
    dict.collect_garbage();
    assert_eq!(tally.count(), 0);

    let replacement = dict.find_with_lock(&"k", SafetyMode::ReadOnly);
    assert_eq!(replacement.value().map(DropProbe::id), Some(2));
    drop(replacement);

    drop(held);
    dict.collect_garbage();
    assert_eq!(tally.count(), 1);
    assert_eq!(dict.pending_len(), 0);
}

/// A reference taken before tombstoning stays valid; upgrading it fails
/// cleanly and empties the handle, letting the object reclaim.
pub fn scenario_reference_survives_tombstone() {
    let list = SafeList::new();
    list.append(5u32);

    let mut handle = list.get_with_lock(0, SafetyMode::Reference);
    assert!(!handle.is_empty());
    assert_eq!(handle.value(), None);

    assert!(list.remove_at(0));
    assert!(handle.is_target_removed());

    assert_eq!(
        handle.set_mode(SafetyMode::ReadWrite),
        Err(AcquireError::ObjectRemoved)
    );
    assert!(handle.is_empty());

    list.collect_garbage();
    assert_eq!(list.pending_len(), 0);
}

/// Collection teardown with holders still releasing on other threads:
/// everything is tombstoned, reclamation waits for the stragglers, and
/// every object is destroyed exactly once.
pub fn scenario_destructor_drains_pending() {
    let tally = DropTally::new();
    let list = SafeList::new();
    for id in 0..100 {
        list.append(tally.probe(id));
    }

    let holders = 50;
    let acquired = Barrier::new(holders + 1);

    thread::scope(|s| {
        for holder in 0..holders {
            let acquired = &acquired;
            let list = &list;
            s.spawn(move || {
                let handle = list.get_with_lock(holder * 2, SafetyMode::ReadOnly);
                assert!(!handle.is_empty());
                acquired.wait();
                thread::sleep(Duration::from_millis(20 + (holder as u64 % 10) * 10));
                drop(handle);
            });
        }

        acquired.wait();
        list.remove_all();
        assert_eq!(list.len(), 0);

        // Only the unheld half can reclaim while the holders sleep.
        list.collect_garbage();
        assert_eq!(tally.count(), holders);
    });

    drop(list);
    assert_eq!(tally.count(), 100);
}
