use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::Rng;
use rstest::rstest;
use serial_test::serial;

use corral_collections::common_tests::collection_stress::*;
use corral_collections::common_tests::probe::DropTally;
use corral_collections::{SafeList, SafetyMode};

#[rstest]
#[case::two_threads(2, 4000)]
#[case::four_threads(4, 2000)]
#[case::eight_threads(8, 1000)]
#[serial]
fn stress_list_mixed(#[case] threads: usize, #[case] ops_per_thread: usize) {
    stress_list_mixed_operations(threads, ops_per_thread);
}

#[rstest]
#[case::balanced(4, 4, 5000)]
#[case::read_heavy(1, 8, 5000)]
#[serial]
fn stress_exclusivity(#[case] writers: usize, #[case] readers: usize, #[case] ops: usize) {
    stress_writer_exclusivity(writers, readers, ops);
}

#[rstest]
#[case::two_threads(2, 4000)]
#[case::eight_threads(8, 1000)]
#[serial]
fn stress_dictionary_churn(#[case] threads: usize, #[case] ops_per_thread: usize) {
    stress_dictionary_replacement_churn(threads, ops_per_thread);
}

#[test]
#[serial]
fn stress_traversal_vs_removal() {
    stress_traversal_during_removal(300);
}

/// Randomized lifecycle churn; closure verified at teardown whatever the
/// schedule the generator picks.
#[test]
#[serial]
fn stress_randomized_lifecycle() {
    let tally = DropTally::new();
    let appended = AtomicUsize::new(0);
    let list = SafeList::new();

    thread::scope(|s| {
        for worker in 0..4usize {
            let tally = tally.clone();
            let appended = &appended;
            let list = &list;
            s.spawn(move || {
                let mut rng = rand::rng();
                for op in 0..3000usize {
                    let index = rng.random_range(0..48);
                    if rng.random_bool(0.4) {
                        list.append(tally.probe(worker * 10_000 + op));
                        appended.fetch_add(1, Ordering::Relaxed);
                    } else if rng.random_bool(0.4) {
                        list.remove_at(index);
                    } else if rng.random_bool(0.8) {
                        let handle = list.get_with_lock(index, SafetyMode::ReadOnly);
                        if let Some(probe) = handle.value() {
                            let _ = probe.id();
                        }
                    } else {
                        list.collect_garbage();
                    }
                }
            });
        }
    });

    drop(list);
    assert_eq!(tally.count(), appended.load(Ordering::Relaxed));
}
