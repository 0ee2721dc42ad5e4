//! Criterion micro-benchmarks for the command queue and step execution.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use stepwise_bench::command_script;
use stepwise_core::Step;
use stepwise_engine::CommandQueue;
use stepwise_test_utils::default_runtime;

fn bench_enqueue_1k(c: &mut Criterion) {
    let script = command_script(1_000);
    c.bench_function("enqueue_1k", |b| {
        b.iter_batched(
            || script.clone(),
            |commands| {
                let mut queue = CommandQueue::default();
                for command in commands {
                    queue.enqueue(command).unwrap();
                }
                black_box(queue);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_dequeue_due_1k(c: &mut Criterion) {
    let script = command_script(1_000);
    c.bench_function("dequeue_due_1k", |b| {
        b.iter_batched(
            || {
                let mut queue = CommandQueue::default();
                for command in script.clone() {
                    queue.enqueue(command).unwrap();
                }
                queue
            },
            |mut queue| {
                let mut step = 0;
                while !queue.is_empty() {
                    black_box(queue.dequeue_due(Step(step)));
                    step += 1;
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_snapshot_restore_1k(c: &mut Criterion) {
    let mut queue = CommandQueue::default();
    for command in command_script(1_000) {
        queue.enqueue(command).unwrap();
    }
    let snapshot = queue.snapshot();
    c.bench_function("queue_snapshot_restore_1k", |b| {
        b.iter(|| {
            let mut restored = CommandQueue::default();
            restored.restore(black_box(snapshot.clone())).unwrap();
            black_box(restored);
        });
    });
}

fn bench_run_250_steps(c: &mut Criterion) {
    let script = command_script(1_000);
    c.bench_function("run_250_steps_1k_commands", |b| {
        b.iter_batched(
            || {
                let mut runtime = default_runtime();
                for command in script.clone() {
                    runtime.enqueue(command).unwrap();
                }
                runtime
            },
            |mut runtime| {
                runtime.run_until(Step(250)).unwrap();
                black_box(runtime.state().gold());
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_enqueue_1k,
    bench_dequeue_due_1k,
    bench_snapshot_restore_1k,
    bench_run_250_steps,
);
criterion_main!(benches);
