//! Pack benchmarks for knit.
//!
//! Benchmarks the decode path of a fetch:
//! - Parsing packs of many small objects
//! - Applying copy-heavy and insert-heavy deltas

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use knit_git::{apply_delta, parse_pack, DeltaBuilder, PackBuilder};
use knit_storage::GitObject;

const OBJECT_COUNTS: [usize; 3] = [10, 100, 1_000];
const DELTA_SIZES: [usize; 3] = [1_024, 65_536, 1_048_576];

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn build_pack(objects: usize) -> Vec<u8> {
    let mut builder = PackBuilder::new();
    for i in 0..objects {
        let content = format!("object {i}\n").repeat(32);
        builder.add(GitObject::blob(content.into_bytes()));
    }
    builder.build().unwrap()
}

fn bench_parse_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_pack");

    for count in OBJECT_COUNTS {
        let pack = build_pack(count);
        group.throughput(Throughput::Bytes(pack.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &pack, |b, pack| {
            b.iter(|| black_box(parse_pack(pack).unwrap()));
        });
    }

    group.finish();
}

fn bench_apply_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_delta");

    for size in DELTA_SIZES {
        let base = generate_data(size);
        group.throughput(Throughput::Bytes(size as u64));

        // one copy per 4 KiB block of the base
        let mut copy_heavy = DeltaBuilder::new(size, size);
        for start in (0..size).step_by(4096) {
            copy_heavy = copy_heavy.copy(start as u32, (size - start).min(4096));
        }
        let copy_heavy = copy_heavy.build();
        group.bench_with_input(BenchmarkId::new("copy", size), &copy_heavy, |b, delta| {
            b.iter(|| black_box(apply_delta(&base, delta).unwrap()));
        });

        let insert_heavy = DeltaBuilder::new(size, size).insert(&base).build();
        group.bench_with_input(BenchmarkId::new("insert", size), &insert_heavy, |b, delta| {
            b.iter(|| black_box(apply_delta(&base, delta).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_pack, bench_apply_delta);
criterion_main!(benches);
