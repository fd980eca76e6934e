// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update and draw on separate threads.
//!
//! The update thread animates a leaf inside a cached buffered composite and publishes a
//! snapshot per frame; the draw thread renders whatever is newest. The buffered subtree
//! is only re-rendered on frames where something inside it changed.
//!
//! Run:
//! - `cargo run -p canopy_demos --example threaded_draw`

use std::thread;

use canopy_scene::{
    FrameStatistics, NodeDesc, RecordingRenderer, RenderOp, StatisticsCounter, Tree,
    TripleBuffer, draw_tree_with,
};
use kurbo::{Size, Vec2};

const FRAMES: u32 = 120;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let (mut writer, mut reader) = TripleBuffer::new();

    let updater = thread::spawn(move || {
        let mut tree = Tree::default();
        let root = tree.root();
        let panel = tree
            .create(NodeDesc::buffered().with_size(Size::new(200.0, 200.0)))
            .unwrap();
        tree.add_child(root, panel).unwrap();
        tree.set_cache_drawn_frame_buffer(panel, true).unwrap();
        let dot = tree
            .create(NodeDesc::leaf().with_size(Size::new(10.0, 10.0)))
            .unwrap();
        tree.add_child(panel, dot).unwrap();

        for frame in 0..FRAMES {
            // Move only every tenth frame; the panel stays cached in between.
            if frame % 10 == 0 {
                let x = f64::from(frame);
                tree.set_position(dot, Vec2::new(x, x / 2.0)).unwrap();
            }
            tree.update();
            let snapshot = tree.generate_draw_nodes(writer.index());
            writer.publish(snapshot);
            thread::yield_now();
        }
    });

    let stats = FrameStatistics::new();
    let mut frames_drawn = 0;
    let mut composites = 0;
    while !updater.is_finished() || reader.has_fresh() {
        if !reader.has_fresh() {
            thread::yield_now();
            continue;
        }
        let Some(snapshot) = reader.latest() else {
            continue;
        };
        let mut renderer = RecordingRenderer::new();
        draw_tree_with(&snapshot, &mut renderer, Some(&stats));
        frames_drawn += 1;
        composites += renderer
            .ops
            .iter()
            .filter(|op| matches!(op, RenderOp::DrawFrameBuffer(..)))
            .count();
    }
    updater.join().unwrap();

    println!(
        "drew {frames_drawn} frames, composited the panel {composites} times, re-rendered it {} times",
        stats.get(StatisticsCounter::FrameBufferRedraws)
    );
}
