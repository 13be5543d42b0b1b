//! # Free List Benchmark
//!
//! Measures first-fit allocation and merge-on-free under the slot counts a
//! shared geometry buffer actually sees (hundreds to a few thousand ranges).

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geoslab_core::FreeList;

/// Fill the list with `slots` equal ranges, then free every other one.
fn fragmented(slots: u32, slot_size: u32) -> FreeList {
    let mut list = FreeList::new(slots * slot_size).unwrap();
    let handles: Vec<_> = (0..slots).map(|_| list.alloc(slot_size).unwrap()).collect();
    for handle in handles.into_iter().step_by(2) {
        list.free(handle).unwrap();
    }
    list
}

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_list_alloc_free");

    for slots in [64u32, 512, 4096] {
        group.bench_with_input(BenchmarkId::new("fragmented", slots), &slots, |b, &slots| {
            let mut list = fragmented(slots, 16);
            b.iter(|| {
                let slot = list.alloc(black_box(8)).unwrap();
                list.free(slot).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_fill_and_drain(c: &mut Criterion) {
    c.bench_function("free_list_fill_drain_1024", |b| {
        b.iter(|| {
            let mut list = FreeList::new(1024 * 32).unwrap();
            let slots: Vec<_> = (0..1024).map(|_| list.alloc(32).unwrap()).collect();
            for slot in slots.into_iter().rev() {
                list.free(slot).unwrap();
            }
            black_box(list.len())
        });
    });
}

criterion_group!(benches, bench_alloc_free_cycle, bench_fill_and_drain);
criterion_main!(benches);
