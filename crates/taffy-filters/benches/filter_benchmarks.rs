//! # Filter Benchmarks
//!
//! Insert and lookup throughput per structure.
//!
//! | Structure | Insert | Lookup |
//! |-----------|--------|--------|
//! | BlockFilter | one bucket write | one bucket read |
//! | TaffyBlockFilter | newest level | every level |
//! | TaffyCuckooFilter | amortized growth | two buckets + stash |
//! | FrozenTaffyCuckooFilter | - | two packed buckets + stash |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use taffy_filters::{BlockFilter, TaffyBlockFilter, TaffyCuckooFilter};

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn random_hashes(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.measurement_time(Duration::from_secs(5));

    for size in SIZES {
        let hashes = random_hashes(1, size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("block", size), &hashes, |b, hashes| {
            b.iter(|| {
                let mut filter = BlockFilter::with_ndv_fpp(hashes.len() as u64, 0.01).unwrap();
                for &h in hashes {
                    filter.add_hash(black_box(h));
                }
                filter
            })
        });

        group.bench_with_input(BenchmarkId::new("taffy_block", size), &hashes, |b, hashes| {
            b.iter(|| {
                let mut filter = TaffyBlockFilter::new(64, 0.01).unwrap();
                for &h in hashes {
                    filter.add_hash(black_box(h));
                }
                filter
            })
        });

        group.bench_with_input(BenchmarkId::new("taffy_cuckoo", size), &hashes, |b, hashes| {
            b.iter(|| {
                let mut filter = TaffyCuckooFilter::with_bytes(64).unwrap();
                for &h in hashes {
                    filter.add_hash(black_box(h));
                }
                filter
            })
        });
    }
    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");
    group.measurement_time(Duration::from_secs(5));

    for size in SIZES {
        let hashes = random_hashes(2, size);
        let probes = random_hashes(3, 10_000);

        let mut block = BlockFilter::with_ndv_fpp(size as u64, 0.01).unwrap();
        let mut taffy_block = TaffyBlockFilter::new(64, 0.01).unwrap();
        let mut cuckoo = TaffyCuckooFilter::with_bytes(64).unwrap();
        for &h in &hashes {
            block.add_hash(h);
            taffy_block.add_hash(h);
            cuckoo.add_hash(h);
        }
        let frozen = cuckoo.freeze();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::new("block", size), &probes, |b, probes| {
            b.iter(|| probes.iter().filter(|&&h| block.find_hash(black_box(h))).count())
        });
        group.bench_with_input(BenchmarkId::new("taffy_block", size), &probes, |b, probes| {
            b.iter(|| probes.iter().filter(|&&h| taffy_block.find_hash(black_box(h))).count())
        });
        group.bench_with_input(BenchmarkId::new("taffy_cuckoo", size), &probes, |b, probes| {
            b.iter(|| probes.iter().filter(|&&h| cuckoo.find_hash(black_box(h))).count())
        });
        group.bench_with_input(BenchmarkId::new("frozen_cuckoo", size), &probes, |b, probes| {
            b.iter(|| probes.iter().filter(|&&h| frozen.find_hash(black_box(h))).count())
        });
    }
    group.finish();
}

fn bench_freeze(c: &mut Criterion) {
    let mut cuckoo = TaffyCuckooFilter::with_bytes(64).unwrap();
    for h in random_hashes(4, 100_000) {
        cuckoo.add_hash(h);
    }
    c.bench_function("freeze_100k", |b| b.iter(|| black_box(&cuckoo).freeze()));
}

criterion_group!(benches, bench_insert, bench_find, bench_freeze);
criterion_main!(benches);
