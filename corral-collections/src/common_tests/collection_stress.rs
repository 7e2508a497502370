//! High-contention workloads with deterministic per-thread operation mixes.
//!
//! The strongest check is closure: with every element a counted probe, the
//! tally after teardown must equal the number of appends - no leak, no
//! double free, whatever the interleaving.

use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use corral_core::SafetyMode;

use super::probe::DropTally;
use crate::safe_dictionary::SafeDictionary;
use crate::safe_list::SafeList;

/// Mix of append, remove, locked reads, locked writes, traversal and
/// explicit collection passes against one list.
pub fn stress_list_mixed_operations(threads: usize, ops_per_thread: usize) {
    let tally = DropTally::new();
    let appended = AtomicUsize::new(0);
    let list = SafeList::new();
    let start = Barrier::new(threads);

    thread::scope(|s| {
        for worker in 0..threads {
            let tally = tally.clone();
            let appended = &appended;
            let list = &list;
            let start = &start;
            s.spawn(move || {
                start.wait();
                for op in 0..ops_per_thread {
                    let index = (worker * 7 + op * 13) % 64;
                    match (op + worker) % 10 {
                        0 | 1 | 2 | 3 => {
                            list.append(tally.probe(worker * ops_per_thread + op));
                            appended.fetch_add(1, Ordering::Relaxed);
                        }
                        4 | 5 => {
                            list.remove_at(index);
                        }
                        6 | 7 => {
                            let handle = list.get_with_lock(index, SafetyMode::ReadOnly);
                            if let Some(probe) = handle.value() {
                                let _ = probe.id();
                            }
                        }
                        8 => {
                            let mut handle = list.get_with_lock(index, SafetyMode::ReadWrite);
                            if let Some(probe) = handle.value_mut() {
                                let _ = probe.id();
                            }
                        }
                        _ => {
                            if op % 3 == 0 {
                                list.collect_garbage();
                            } else {
                                let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
                                let mut steps = 0;
                                while handle.next() && steps < 8 {
                                    steps += 1;
                                }
                            }
                        }
                    }
                }
            });
        }
    });

    drop(list);
    assert_eq!(tally.count(), appended.load(Ordering::Relaxed));
}

/// Writers keep the two halves of a pair equal; readers assert they never
/// observe a torn update. Verifies writer exclusivity.
pub fn stress_writer_exclusivity(writers: usize, readers: usize, ops: usize) {
    let list = SafeList::new();
    list.append((0u64, 0u64));

    thread::scope(|s| {
        for _ in 0..writers {
            let list = &list;
            s.spawn(move || {
                for _ in 0..ops {
                    let mut handle = list.get_with_lock(0, SafetyMode::ReadWrite);
                    let pair = handle.value_mut().unwrap();
                    pair.0 += 1;
                    // A reader between these two writes would see the
                    // halves disagree; the lock forbids it.
                    pair.1 += 1;
                }
            });
        }
        for _ in 0..readers {
            let list = &list;
            s.spawn(move || {
                for _ in 0..ops {
                    let handle = list.get_with_lock(0, SafetyMode::ReadOnly);
                    let pair = handle.value().unwrap();
                    assert_eq!(pair.0, pair.1);
                }
            });
        }
    });

    let handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    let total = (writers * ops) as u64;
    assert_eq!(handle.value(), Some(&(total, total)));
}

/// Keyed churn: replacements and removals under a small key space while
/// readers hold locks on whatever they find. Closure checked at teardown.
pub fn stress_dictionary_replacement_churn(threads: usize, ops_per_thread: usize) {
    let tally = DropTally::new();
    let stored = AtomicUsize::new(0);
    let dict = SafeDictionary::new();

    thread::scope(|s| {
        for worker in 0..threads {
            let tally = tally.clone();
            let stored = &stored;
            let dict = &dict;
            s.spawn(move || {
                for op in 0..ops_per_thread {
                    let key = (worker + op * 3) % 8;
                    match (op + worker) % 10 {
                        0 | 1 | 2 | 3 | 4 => {
                            dict.set_at(key, tally.probe(worker * ops_per_thread + op));
                            stored.fetch_add(1, Ordering::Relaxed);
                        }
                        5 => {
                            dict.remove_at(&key);
                        }
                        6 | 7 | 8 => {
                            let handle = dict.find_with_lock(&key, SafetyMode::ReadOnly);
                            if let Some(probe) = handle.value() {
                                let _ = probe.id();
                            }
                        }
                        _ => dict.collect_garbage(),
                    }
                }
            });
        }
    });

    drop(dict);
    assert_eq!(tally.count(), stored.load(Ordering::Relaxed));
}

/// Forward traversal racing removals and re-appends of the elements being
/// traversed.
pub fn stress_traversal_during_removal(rounds: usize) {
    let list = SafeList::new();
    for value in 0..64u64 {
        list.append(value);
    }

    thread::scope(|s| {
        let walker = s.spawn(|| {
            for _ in 0..rounds {
                let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
                while handle.next() {}
                assert!(handle.is_empty());
            }
        });

        let remover = s.spawn(|| {
            for round in 0..rounds {
                list.remove_at((round * 11) % 64);
                list.append(100 + round as u64);
                list.collect_garbage();
            }
        });

        walker.join().unwrap();
        remover.join().unwrap();
    });
}
