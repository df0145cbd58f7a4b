//! Benchmarks for AgentDB write, search and reload paths.
//!
//! Run with: `cargo bench`
//!
//! Performance targets:
//! - `store_action()` < 1ms at 384 dimensions
//! - `find_similar()` < 5ms for k=10 over 10K patterns
//! - `open()` of a saved 10K-pattern store < 2s (index rebuilt from catalog)

use std::time::{Duration, Instant};

use agentdb::{ActionPattern, AgentDB, Config, SearchOptions};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::tempdir;

const ACTIONS: [&str; 5] = ["click", "fill_form", "navigate", "solve_captcha", "extract"];

fn synthetic_pattern(i: usize) -> ActionPattern {
    ActionPattern::new(ACTIONS[i % ACTIONS.len()])
        .with_selector(format!("#field-{}", i % 97))
        .with_url(format!("https://site-{}.test/page/{}", i % 31, i % 13))
        .with_success(i % 3 != 0)
}

fn populated(n: usize) -> (AgentDB, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let mut db = AgentDB::open(dir.path(), Config::default()).unwrap();
    db.store_actions((0..n).map(synthetic_pattern)).unwrap();
    (db, dir)
}

/// Benchmark recording a single action into a warm store.
fn bench_store_action(c: &mut Criterion) {
    let (mut db, _dir) = populated(1_000);
    let mut i = 1_000;

    c.bench_function("store_action", |b| {
        b.iter(|| {
            db.store_action(synthetic_pattern(i)).unwrap();
            i += 1;
        });
    });
}

/// Benchmark similarity search at several store sizes.
fn bench_find_similar(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_similar");
    let query = ActionPattern::new("fill_form")
        .with_selector("#field-7")
        .with_url("https://site-3.test/page/1");

    for size in [1_000usize, 10_000] {
        let (db, _dir) = populated(size);

        group.bench_with_input(BenchmarkId::new("unfiltered", size), &size, |b, _| {
            b.iter(|| db.find_similar(&query, 10, &SearchOptions::default()).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("success_only", size), &size, |b, _| {
            b.iter(|| db.find_similar(&query, 10, &SearchOptions::successful()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark reopening a saved store, including the index rebuild.
fn bench_reopen(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    {
        let mut db = AgentDB::open(dir.path(), Config::default()).unwrap();
        db.store_actions((0..10_000).map(synthetic_pattern)).unwrap();
        db.save().unwrap();
        db.close().unwrap();
    }

    let mut group = c.benchmark_group("reopen");
    group.sample_size(10);
    group.bench_function("open_saved_10k", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;

            for _ in 0..iters {
                let start = Instant::now();
                let db = AgentDB::open(dir.path(), Config::default()).unwrap();
                total += start.elapsed();

                db.close().unwrap();
            }

            total
        });
    });
    group.finish();
}

criterion_group!(benches, bench_store_action, bench_find_similar, bench_reopen);
criterion_main!(benches);
