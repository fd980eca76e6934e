// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_lifetime::LifetimeEntryManager;
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// `count` short windows spread over `span` time units, like the notes of a long track.
fn gen_windows(count: usize, span: f64, length: f64) -> Vec<(f64, f64)> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let start = rng.next_f64() * span;
            (start, start + length)
        })
        .collect()
}

fn filled(windows: &[(f64, f64)]) -> LifetimeEntryManager<u32> {
    let mut m = LifetimeEntryManager::new();
    for (i, &(start, end)) in windows.iter().enumerate() {
        m.add(i as u32, start, end);
    }
    m
}

fn bench_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifetime_playback");
    for &n in &[1_000usize, 10_000, 100_000] {
        let windows = gen_windows(n, 600_000.0, 1_000.0);
        group.throughput(Throughput::Elements(600));
        group.bench_function(format!("frames_n{}", n), |b| {
            b.iter_batched(
                || filled(&windows),
                |mut m| {
                    let mut alive = 0;
                    for frame in 0..600 {
                        m.update(f64::from(frame) * 1_000.0);
                        alive += m.alive().count();
                        m.drain_events().for_each(drop);
                    }
                    black_box(alive);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifetime_seek");
    let windows = gen_windows(50_000, 600_000.0, 1_000.0);
    group.bench_function("forward_and_rewind", |b| {
        b.iter_batched(
            || filled(&windows),
            |mut m| {
                m.update(550_000.0);
                m.update(50_000.0);
                black_box(m.last_update_checks());
            },
            BatchSize::LargeInput,
        );
    });
    group.bench_function("steady_state", |b| {
        let mut m = filled(&windows);
        m.update(300_000.0);
        m.drain_events().for_each(drop);
        b.iter(|| {
            black_box(m.update(black_box(300_000.0)));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_playback, bench_seek);
criterion_main!(benches);
