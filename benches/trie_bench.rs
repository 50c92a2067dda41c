//! Criterion benchmarks for trie build, point lookup, and range scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use trieste::{Config, Trie};

/// Sorted big-endian u64 keys with a fixed stride.
fn generate_keys(count: usize, stride: u64) -> Vec<[u8; 8]> {
    (0..count as u64).map(|i| (i * stride).to_be_bytes()).collect()
}

fn generate_values(count: usize, seed: u64) -> Vec<u64> {
    let mut values: Vec<u64> = (0..count as u64).collect();
    values.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    values
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [10_000, 100_000] {
        let keys = generate_keys(size, 7);
        let values = generate_values(size, 42);
        for (name, config) in [
            ("dense", Config::default()),
            (
                "sparse",
                Config {
                    include_dense: false,
                    ..Config::default()
                },
            ),
        ] {
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &(&keys, &values),
                |b, (keys, values)| b.iter(|| Trie::build_with_config(keys, values, &config)),
            );
        }
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for size in [10_000, 100_000] {
        let keys = generate_keys(size, 7);
        let values = generate_values(size, 42);
        let trie = Trie::build(&keys, &values).unwrap();

        let mut probes = keys.clone();
        probes.shuffle(&mut ChaCha8Rng::seed_from_u64(123));
        let probes: Vec<[u8; 8]> = probes.into_iter().take(1000).collect();

        group.bench_with_input(BenchmarkId::new("hit", size), &trie, |b, trie| {
            b.iter(|| {
                let mut found = 0usize;
                for probe in &probes {
                    if trie.lookup(black_box(probe)).is_some() {
                        found += 1;
                    }
                }
                found
            })
        });

        group.bench_with_input(BenchmarkId::new("miss", size), &trie, |b, trie| {
            b.iter(|| {
                let mut found = 0usize;
                for probe in &probes {
                    // Off-stride neighbors are absent.
                    let miss = (u64::from_be_bytes(*probe) + 1).to_be_bytes();
                    if trie.lookup(black_box(&miss)).is_some() {
                        found += 1;
                    }
                }
                found
            })
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for size in [100_000] {
        let keys = generate_keys(size, 7);
        let values = generate_values(size, 42);
        let trie = Trie::build(&keys, &values).unwrap();
        let start = keys[size / 2];

        group.bench_with_input(BenchmarkId::new("next_1000", size), &trie, |b, trie| {
            b.iter(|| {
                let mut iter = trie.seek(black_box(&start), true);
                let mut sum = 0u64;
                for _ in 0..1000 {
                    sum = sum.wrapping_add(iter.value());
                    iter.next();
                }
                sum
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_lookup, bench_scan);
criterion_main!(benches);
