// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics.
//!
//! Build an auto-sized row, resize a child, snapshot the tree and render it into a
//! recording renderer.
//!
//! Run:
//! - `RUST_LOG=canopy_scene=trace cargo run -p canopy_demos --example scene_basics`

use canopy_scene::{
    Axes, Fill, NodeDesc, RecordingRenderer, Rgba, Tree, TreeIndex, draw_tree,
};
use kurbo::{Size, Vec2};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut tree = Tree::default();
    let root = tree.root();
    let row = tree
        .create(
            NodeDesc::composite()
                .with_auto_size(Axes::BOTH)
                .with_position(Vec2::new(20.0, 20.0)),
        )
        .unwrap();
    tree.add_child(root, row).unwrap();

    let red = Rgba::new(1.0, 0.0, 0.0, 1.0);
    let a = tree
        .create(
            NodeDesc::leaf()
                .with_size(Size::new(100.0, 50.0))
                .with_behavior(Fill(red)),
        )
        .unwrap();
    let b = tree
        .create(
            NodeDesc::leaf()
                .with_size(Size::new(60.0, 120.0))
                .with_position(Vec2::new(110.0, 0.0)),
        )
        .unwrap();
    tree.add_children(row, [a, b]).unwrap();

    tree.update();
    println!("row size: {:?}", tree.size(row));
    assert_eq!(tree.size(row), Some(Size::new(170.0, 120.0)));

    tree.set_size(b, Size::new(60.0, 30.0)).unwrap();
    tree.update();
    println!("row size after shrinking b: {:?}", tree.size(row));

    let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
    println!("snapshot nodes: {}", snapshot.subtree_len());

    let mut renderer = RecordingRenderer::new();
    draw_tree(&snapshot, &mut renderer);
    for (command, info) in renderer.draws() {
        println!("{command:?} at {:?}", info.matrix.translation());
    }
}
