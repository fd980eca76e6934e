// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A lifetime-managed timeline.
//!
//! Thousands of short-lived children under one lifetime-managed composite. Each update
//! only touches the few alive ones, and a behavior reports lifetime boundary crossings.
//!
//! Run:
//! - `cargo run -p canopy_demos --example timeline`

use std::sync::Arc;

use canopy_lifetime::{CrossingDirection, LifetimeBoundary};
use canopy_scene::{
    Behavior, ClockId, FrameStatistics, NodeDesc, NodeId, StatisticsCounter, Tree,
};
use kurbo::Size;
use tracing::info;

struct Announcer;

impl Behavior for Announcer {
    fn lifetime_boundary_crossed(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        child: NodeId,
        boundary: LifetimeBoundary,
        direction: CrossingDirection,
    ) {
        info!(?child, ?boundary, ?direction, "boundary crossed");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut tree = Tree::default();
    let stats = Arc::new(FrameStatistics::new());
    tree.set_statistics(Some(stats.clone()));

    let root = tree.root();
    let track = tree
        .create(NodeDesc::lifetime_managed().with_behavior(Announcer))
        .unwrap();
    tree.add_child(root, track).unwrap();

    for i in 0..5_000 {
        let start = f64::from(i) * 100.0;
        let note = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(10.0, 10.0))
                    .with_lifetime(start, start + 250.0),
            )
            .unwrap();
        tree.add_child(track, note).unwrap();
    }

    for frame in 0..10 {
        tree.set_clock_time(ClockId::ROOT, f64::from(frame) * 16.0 + 1_000.0)
            .unwrap();
        tree.update();
        let counts = stats.take();
        let updated = counts[StatisticsCounter::NodesUpdated.index()];
        let checks = counts[StatisticsCounter::LifetimeChecks.index()];
        println!(
            "frame {frame}: {} alive of {}, {updated} nodes updated, {checks} lifetime checks",
            tree.alive_children(track).len(),
            tree.children(track).len(),
        );
    }
}
