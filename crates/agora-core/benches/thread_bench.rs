//! # Comment Thread Benchmarks
//!
//! Lookup, like and traversal cost on deep and wide comment threads.
//!
//! Run with: `cargo bench -p agora-core`

use agora_core::{CommentId, CommentThread};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A single chain of replies, each one under the previous.
fn create_deep_thread(depth: u64) -> CommentThread {
    let mut thread = CommentThread::new();
    thread.add_comment(CommentId(0), "alice", "root").expect("root");
    for i in 1..depth {
        thread
            .add_reply(CommentId(i - 1), CommentId(i), "bob", "reply")
            .expect("reply");
    }
    thread
}

/// N top-level comments with one reply each.
fn create_wide_thread(width: u64) -> CommentThread {
    let mut thread = CommentThread::new();
    for i in 0..width {
        thread
            .add_comment(CommentId(i * 2), "alice", "comment")
            .expect("comment");
        thread
            .add_reply(CommentId(i * 2), CommentId(i * 2 + 1), "bob", "reply")
            .expect("reply");
    }
    thread
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_deep_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_lookup");

    for depth in [100u64, 1000, 10000].iter() {
        let thread = create_deep_thread(*depth);
        let deepest = CommentId(depth - 1);
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| black_box(thread.find(deepest).is_ok()));
        });
    }

    group.finish();
}

fn bench_deep_like(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_like");

    for depth in [100u64, 1000, 10000].iter() {
        let base = create_deep_thread(*depth);
        let deepest = CommentId(depth - 1);
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter_batched(
                || base.clone(),
                |mut thread| black_box(thread.like(deepest, "carol").is_ok()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_tree_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_view");

    for width in [100u64, 1000].iter() {
        let thread = create_wide_thread(*width);
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| black_box(thread.nested_json().as_str().len()));
        });
    }

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_thread");

    for depth in [1000u64, 10000].iter() {
        let thread = create_deep_thread(*depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| black_box(serde_json::to_vec(&thread).map(|v| v.len())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deep_lookup,
    bench_deep_like,
    bench_tree_view,
    bench_serialize
);
criterion_main!(benches);
