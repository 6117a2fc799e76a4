//! Criterion benchmarks for the timing synthesizer and the mode cache.
//!
//! Run with:
//! ```bash
//! cargo bench --package modeline-core --bench timing_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modeline_core::{synthesize, ModeCache, ModeKey};

/// Benchmarks [`synthesize`] for a spread of common resolutions.
fn bench_synthesize(c: &mut Criterion) {
    let sizes = [(640u32, 480u32), (1920, 1080), (3840, 2160), (8000, 8000)];
    let mut group = c.benchmark_group("synthesize");

    for &(w, h) in &sizes {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{w}x{h}")),
            &(w, h),
            |b, &(w, h)| b.iter(|| synthesize(black_box(w), black_box(h))),
        );
    }

    group.finish();
}

/// Benchmarks put + evict on a full cache (the steady state of a client that
/// keeps resizing).
fn bench_cache_put_evict(c: &mut Criterion) {
    let capacities = [2usize, 32, 128];
    let mut group = c.benchmark_group("cache_put_evict");

    for &capacity in &capacities {
        group.bench_with_input(BenchmarkId::new("capacity", capacity), &capacity, |b, &cap| {
            let mut cache = ModeCache::new(cap).expect("capacity >= 2");
            let mut next = 0u32;
            b.iter(|| {
                next = next.wrapping_add(1);
                cache.put(ModeKey::new(640 + next % 4096, 480), next);
                black_box(cache.evict_if_needed())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_synthesize, bench_cache_put_evict);
criterion_main!(benches);
