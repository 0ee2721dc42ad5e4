//! Criterion micro-benchmarks for canonical encoding and hashing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use stepwise_bench::wide_state_value;
use stepwise_core::{canonical_encode, canonical_hash, ContentDigest};

fn bench_canonical_encode_1k(c: &mut Criterion) {
    let value = wide_state_value(1_000);
    c.bench_function("canonical_encode_1k", |b| {
        b.iter(|| {
            let text = canonical_encode(black_box(&value)).unwrap();
            black_box(text);
        });
    });
}

fn bench_canonical_hash_1k(c: &mut Criterion) {
    let value = wide_state_value(1_000);
    c.bench_function("canonical_hash_1k", |b| {
        b.iter(|| {
            let hash = canonical_hash(black_box(&value)).unwrap();
            black_box(hash);
        });
    });
}

fn bench_canonical_hash_10k(c: &mut Criterion) {
    let value = wide_state_value(10_000);
    c.bench_function("canonical_hash_10k", |b| {
        b.iter(|| {
            let hash = canonical_hash(black_box(&value)).unwrap();
            black_box(hash);
        });
    });
}

fn bench_content_digest_1k(c: &mut Criterion) {
    let value = wide_state_value(1_000);
    c.bench_function("content_digest_1k", |b| {
        b.iter(|| {
            let digest = ContentDigest::compute(1, black_box(&value));
            black_box(digest);
        });
    });
}

criterion_group!(
    benches,
    bench_canonical_encode_1k,
    bench_canonical_hash_1k,
    bench_canonical_hash_10k,
    bench_content_digest_1k,
);
criterion_main!(benches);
