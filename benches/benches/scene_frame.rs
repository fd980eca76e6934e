// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_scene::{
    Axes, NodeDesc, NodeId, RecordingRenderer, Tree, TreeIndex, TreeOptions, draw_tree,
};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Size, Vec2};

/// A grid of `n * n` leaves, one auto-sized row composite per line.
fn grid(n: usize, flatten_composites: bool) -> (Tree, Vec<NodeId>) {
    let mut tree = Tree::new(TreeOptions {
        flatten_composites,
        ..TreeOptions::default()
    });
    let root = tree.root();
    let mut leaves = Vec::with_capacity(n * n);
    for y in 0..n {
        let row = tree
            .create(
                NodeDesc::composite()
                    .with_auto_size(Axes::BOTH)
                    .with_position(Vec2::new(0.0, y as f64 * 10.0)),
            )
            .unwrap();
        tree.add_child(root, row).unwrap();
        for x in 0..n {
            let leaf = tree
                .create(
                    NodeDesc::leaf()
                        .with_size(Size::new(8.0, 8.0))
                        .with_position(Vec2::new(x as f64 * 10.0, 0.0)),
                )
                .unwrap();
            tree.add_child(row, leaf).unwrap();
            leaves.push(leaf);
        }
    }
    (tree, leaves)
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_update");
    for &n in &[16usize, 32, 64] {
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("steady_n{}", n), |b| {
            let (mut tree, _) = grid(n, true);
            tree.update();
            b.iter(|| tree.update());
        });
        group.bench_function(format!("move_one_n{}", n), |b| {
            let (mut tree, leaves) = grid(n, true);
            tree.update();
            let mut x = 0.0;
            b.iter(|| {
                x += 1.0;
                tree.set_position(leaves[0], Vec2::new(x % 50.0, 0.0)).unwrap();
                tree.update();
            });
        });
    }
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_generate");
    for flatten in [false, true] {
        let n = 64;
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("fresh_flatten_{}", flatten), |b| {
            b.iter_batched(
                || {
                    let (mut tree, _) = grid(n, flatten);
                    tree.update();
                    tree
                },
                |mut tree| black_box(tree.generate_draw_nodes(TreeIndex::ALL[0])),
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("reused_flatten_{}", flatten), |b| {
            let (mut tree, _) = grid(n, flatten);
            tree.update();
            let mut frame = 0;
            b.iter(|| {
                frame += 1;
                tree.update();
                black_box(tree.generate_draw_nodes(TreeIndex::ALL[frame % 3]))
            });
        });
    }
    group.finish();
}

fn bench_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_draw");
    let (mut tree, _) = grid(64, true);
    tree.update();
    let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
    group.throughput(Throughput::Elements(snapshot.subtree_len() as u64));
    group.bench_function("record_n64", |b| {
        b.iter(|| {
            let mut renderer = RecordingRenderer::new();
            draw_tree(&snapshot, &mut renderer);
            black_box(renderer.ops.len())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_update, bench_generate, bench_draw);
criterion_main!(benches);
