//! Benchmark of handle acquisition, traversal and churn on SafeList.
//!
//! Run with: cargo bench --package corral-collections --bench handle_benchmark

use std::thread;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use mimalloc::MiMalloc;

use corral_collections::{SafeList, SafetyMode};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const LIST_SIZE: usize = 1024;
const OPS_PER_THREAD: usize = 1_000;

fn populated_list() -> SafeList<u64> {
    let list = SafeList::new();
    for value in 0..LIST_SIZE as u64 {
        list.append(value);
    }
    list
}

fn bench_read_handle(c: &mut Criterion) {
    let list = populated_list();
    let mut index = 0;

    c.bench_function("handle/get_with_lock_read", |b| {
        b.iter(|| {
            let handle = list.get_with_lock(index % LIST_SIZE, SafetyMode::ReadOnly);
            black_box(handle.value());
            index += 1;
        })
    });
}

fn bench_write_handle(c: &mut Criterion) {
    let list = populated_list();
    let mut index = 0;

    c.bench_function("handle/get_with_lock_write", |b| {
        b.iter(|| {
            let mut handle = list.get_with_lock(index % LIST_SIZE, SafetyMode::ReadWrite);
            if let Some(value) = handle.value_mut() {
                *value = value.wrapping_add(1);
            }
            index += 1;
        })
    });
}

fn bench_append_remove_churn(c: &mut Criterion) {
    let list = SafeList::new();

    c.bench_function("collection/append_remove_collect", |b| {
        b.iter(|| {
            let index = list.append(black_box(1u64));
            list.remove_at(index);
            list.collect_garbage();
        })
    });
}

fn bench_traversal(c: &mut Criterion) {
    let list = populated_list();

    c.bench_function("handle/traverse_full_list", |b| {
        b.iter(|| {
            let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
            let mut sum = 0u64;
            loop {
                if let Some(value) = handle.value() {
                    sum += *value;
                }
                if !handle.next() {
                    break;
                }
            }
            black_box(sum)
        })
    });
}

fn bench_concurrent_readers(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle/concurrent_read");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let list = populated_list();
                b.iter(|| {
                    thread::scope(|s| {
                        for t in 0..threads {
                            let list = &list;
                            s.spawn(move || {
                                for i in 0..OPS_PER_THREAD {
                                    let handle = list
                                        .get_with_lock((t * 31 + i) % LIST_SIZE, SafetyMode::ReadOnly);
                                    black_box(handle.value());
                                }
                            });
                        }
                    });
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_read_handle,
    bench_write_handle,
    bench_append_remove_churn,
    bench_traversal,
    bench_concurrent_readers
);
criterion_main!(benches);
