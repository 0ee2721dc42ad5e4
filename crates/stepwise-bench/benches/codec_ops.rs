//! Criterion micro-benchmarks for the save and replay codecs.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use stepwise_bench::recorded_replay;
use stepwise_core::Step;
use stepwise_replay::{
    decode_sim_replay_json_lines, encode_sim_replay_json_lines, DecodeLimits, EncodeOptions,
};
use stepwise_save::{decode_save, encode_save, serialize_save, CompressionMethod};
use stepwise_test_utils::{collect, default_runtime};

fn bench_save_gzip_roundtrip(c: &mut Criterion) {
    let mut runtime = default_runtime();
    for step in 0..2_000u64 {
        runtime.enqueue(collect(1.0, step + 100)).unwrap();
    }
    runtime.run_until(Step(50)).unwrap();
    let document = serialize_save(&runtime, 0.0).unwrap();

    c.bench_function("save_encode_gzip_2k_pending", |b| {
        b.iter(|| {
            let bytes = encode_save(black_box(&document), CompressionMethod::Gzip).unwrap();
            black_box(bytes);
        });
    });

    let bytes = encode_save(&document, CompressionMethod::Gzip).unwrap();
    c.bench_function("save_decode_gzip_2k_pending", |b| {
        b.iter(|| {
            let value = decode_save(black_box(&bytes)).unwrap();
            black_box(value);
        });
    });
}

fn bench_replay_encode_2k(c: &mut Criterion) {
    let replay = recorded_replay(2_000, 600).unwrap();
    let options = EncodeOptions::default();
    c.bench_function("replay_encode_2k_commands", |b| {
        b.iter(|| {
            let text = encode_sim_replay_json_lines(black_box(&replay), &options).unwrap();
            black_box(text);
        });
    });
}

fn bench_replay_decode_2k(c: &mut Criterion) {
    let replay = recorded_replay(2_000, 600).unwrap();
    let text = encode_sim_replay_json_lines(&replay, &EncodeOptions::default()).unwrap();
    let limits = DecodeLimits::default();
    c.bench_function("replay_decode_2k_commands", |b| {
        b.iter(|| {
            let decoded = decode_sim_replay_json_lines(black_box(&text), &limits).unwrap();
            black_box(decoded);
        });
    });
}

criterion_group!(
    benches,
    bench_save_gzip_roundtrip,
    bench_replay_encode_2k,
    bench_replay_decode_2k,
);
criterion_main!(benches);
