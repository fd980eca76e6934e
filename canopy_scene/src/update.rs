// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame update pass.

use tracing::trace;

use crate::stats::StatisticsCounter;
use crate::tree::Tree;
use crate::types::{LoadState, NodeId};

impl Tree {
    /// Run one update pass over the alive part of the tree.
    ///
    /// Applies finished deferred loads, then visits every alive node depth first:
    /// first-update hooks, [`Behavior::update`](crate::Behavior::update), the life-cycle
    /// scan of its children, the children themselves, tasks scheduled after children,
    /// and finally auto-size resolution.
    pub fn update(&mut self) {
        self.frame += 1;
        self.drain_load_completions();
        let root = self.root();
        self.update_subtree(root);
        trace!(frame = self.frame, "update pass done");
    }

    fn update_subtree(&mut self, id: NodeId) {
        self.record(StatisticsCounter::NodesUpdated, 1);

        let node = self.node_mut(id);
        if node.load_state == LoadState::Ready {
            node.load_state = LoadState::Loaded;
            if let Some(behavior) = node.behavior.as_mut() {
                behavior.load_complete(id);
            }
        }

        self.with_behavior(id, |behavior, tree| behavior.update(tree, id));
        if !self.contains(id) {
            return;
        }

        if self.composite_opt(id).is_some() {
            self.update_child_life(id);
            for child in self.alive_children(id).to_vec() {
                let still_alive = self
                    .node_opt(child)
                    .is_some_and(|n| n.alive && n.parent == Some(id));
                if still_alive {
                    self.update_subtree(child);
                }
            }
        }

        self.run_scheduled_after_children(id);
        if !self.contains(id) {
            return;
        }
        self.update_auto_size(id);

        // Without caching, a buffered composite redraws its subtree every frame.
        if self.buffered_state(id).is_some_and(|b| !b.cache_drawn_frame_buffer) {
            self.bump_update_version(id);
        }
    }
}
