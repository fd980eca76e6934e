// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alive/dead transitions of children.

use canopy_lifetime::{LifetimeEntryManager, LifetimeEvent};
use tracing::trace;

use crate::stats::StatisticsCounter;
use crate::tree::Tree;
use crate::types::{LoadState, NodeId};

impl Tree {
    /// Bring the alive view of `parent` in line with the current time.
    ///
    /// Returns whether any child became alive, died, or was removed. Any change
    /// invalidates the composite's auto-size.
    pub(crate) fn update_child_life(&mut self, parent: NodeId) -> bool {
        let Some(c) = self.composite_opt(parent) else {
            return false;
        };
        let changed = if c.lifetimes.is_some() {
            self.update_managed_life(parent)
        } else {
            let children = c.children.clone();
            self.record(StatisticsCounter::LifetimeChecks, children.len() as u64);
            let mut changed = false;
            for child in children {
                changed |= self.check_child_life(parent, child);
            }
            changed
        };
        if changed {
            self.invalidate_auto_size(parent);
            self.mark_buffered_dirty(parent);
        }
        changed
    }

    /// Evaluate one child's lifetime window. Returns whether anything changed.
    pub(crate) fn check_child_life(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.node_opt(child) else {
            return false;
        };
        if node.parent != Some(parent) {
            return false;
        }
        let time = self.time_of(child);
        if node.should_be_alive_at(time) {
            if node.alive {
                return false;
            }
            return self.try_make_alive(parent, child);
        }

        let mut changed = false;
        if node.alive {
            self.make_dead(parent, child);
            changed = true;
        }
        let node = self.node(child);
        // Nodes that have not started yet stay until their window opens.
        if node.remove_when_not_alive && time > node.lifetime_start {
            let dispose = node.dispose_on_death_removal;
            self.detach_child(parent, child);
            if dispose {
                self.dispose(child);
            }
            trace!(?parent, ?child, dispose, "removed for not being alive");
            changed = true;
        }
        changed
    }

    /// Load the child if needed and add it to the alive view once it is ready.
    fn try_make_alive(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.node(child).load_state {
            LoadState::NotLoaded => self.load_subtree(child),
            LoadState::Loading => return false,
            LoadState::Ready | LoadState::Loaded => {}
        }
        if self.node(child).load_state < LoadState::Ready {
            return false;
        }
        self.node_mut(child).alive = true;
        self.insert_alive(parent, child);
        trace!(?parent, ?child, "became alive");
        true
    }

    fn make_dead(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).alive = false;
        self.remove_alive(parent, child);
        trace!(?parent, ?child, "became dead");
    }

    fn lifetimes_mut(&mut self, parent: NodeId) -> Option<&mut LifetimeEntryManager<NodeId>> {
        self.node_opt_mut(parent)?.composite.as_mut()?.lifetimes.as_mut()
    }

    /// Drive the alive view from the lifetime manager's events.
    ///
    /// Events are handled after each manager update; changes the handlers make are
    /// processed by another update at the same time until none are left.
    fn update_managed_life(&mut self, parent: NodeId) -> bool {
        let time = self.time_of(parent);
        let mut changed = false;
        loop {
            let Some(manager) = self.lifetimes_mut(parent) else {
                return changed;
            };
            manager.update(time);
            let checks = manager.last_update_checks();
            let events: Vec<_> = manager.drain_events().collect();
            self.record(StatisticsCounter::LifetimeChecks, checks);
            if events.is_empty() {
                return changed;
            }
            for event in events {
                changed |= self.apply_lifetime_event(parent, event);
            }
        }
    }

    fn apply_lifetime_event(&mut self, parent: NodeId, event: LifetimeEvent<NodeId>) -> bool {
        let owned = |tree: &Self, child: NodeId| {
            tree.node_opt(child).is_some_and(|n| n.parent == Some(parent))
        };
        match event {
            LifetimeEvent::BecameAlive(child) => {
                owned(self, child) && !self.node(child).alive && self.try_make_alive(parent, child)
            }
            LifetimeEvent::BecameDead(child) => {
                if owned(self, child) && self.node(child).alive {
                    self.make_dead(parent, child);
                    true
                } else {
                    false
                }
            }
            LifetimeEvent::CrossedBoundary {
                key,
                boundary,
                direction,
            } => {
                if owned(self, key) {
                    self.with_behavior(parent, |behavior, tree| {
                        behavior.lifetime_boundary_crossed(tree, parent, key, boundary, direction);
                    });
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use canopy_lifetime::{CrossingDirection, LifetimeBoundary};
    use kurbo::Size;

    use crate::behavior::Behavior;
    use crate::clock::ClockId;
    use crate::stats::FrameStatistics;
    use crate::{NodeDesc, SceneError, Tree};

    use super::*;

    fn at(tree: &mut Tree, time: f64) {
        tree.set_clock_time(ClockId::ROOT, time).unwrap();
        tree.update();
    }

    #[test]
    fn window_is_half_open() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = tree
            .create(NodeDesc::leaf().with_lifetime(10.0, 20.0))
            .unwrap();
        tree.add_child(root, a).unwrap();
        for (time, alive) in [(5.0, false), (10.0, true), (15.0, true), (20.0, false), (25.0, false)] {
            at(&mut tree, time);
            assert_eq!(tree.is_alive(a), alive, "alive state at {time}");
            assert_eq!(tree.alive_children(root).contains(&a), alive);
        }
        assert_eq!(tree.parent(a), Some(root), "dead nodes stay attached by default");
    }

    #[test]
    fn remove_when_not_alive_waits_for_window_end() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = tree
            .create(NodeDesc {
                remove_when_not_alive: true,
                ..NodeDesc::leaf().with_lifetime(10.0, 20.0)
            })
            .unwrap();
        tree.add_child(root, a).unwrap();
        at(&mut tree, 5.0);
        assert_eq!(tree.parent(a), Some(root), "not removed before its window opens");
        at(&mut tree, 15.0);
        assert!(tree.is_alive(a));
        at(&mut tree, 25.0);
        assert!(!tree.children(root).contains(&a));
        assert!(!tree.contains(a), "disposed on death removal by default");
    }

    #[test]
    fn death_removal_can_keep_the_node() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = tree
            .create(NodeDesc {
                remove_when_not_alive: true,
                dispose_on_death_removal: false,
                ..NodeDesc::leaf().with_lifetime(0.0, 1.0)
            })
            .unwrap();
        tree.add_child(root, a).unwrap();
        at(&mut tree, 2.0);
        assert!(tree.contains(a));
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn life_changes_invalidate_auto_size() {
        let mut tree = Tree::default();
        let root = tree.root();
        let group = tree
            .create(NodeDesc::composite().with_auto_size(crate::Axes::BOTH))
            .unwrap();
        tree.add_child(root, group).unwrap();
        let short = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(50.0, 50.0))
                    .with_lifetime(0.0, 10.0),
            )
            .unwrap();
        let long = tree
            .create(NodeDesc::leaf().with_size(Size::new(20.0, 20.0)))
            .unwrap();
        tree.add_children(group, [short, long]).unwrap();
        at(&mut tree, 0.0);
        assert_eq!(tree.size(group), Some(Size::new(50.0, 50.0)));
        at(&mut tree, 10.0);
        assert_eq!(tree.size(group), Some(Size::new(20.0, 20.0)));
    }

    #[test]
    fn managed_children_follow_the_manager() {
        let mut tree = Tree::default();
        let root = tree.root();
        let list = tree.create(NodeDesc::lifetime_managed()).unwrap();
        tree.add_child(root, list).unwrap();
        let items: Vec<_> = (0..100)
            .map(|i| {
                let start = f64::from(i) * 10.0;
                let id = tree
                    .create(NodeDesc::leaf().with_lifetime(start, start + 10.0))
                    .unwrap();
                tree.add_child(list, id).unwrap();
                id
            })
            .collect();

        let stats = Arc::new(FrameStatistics::new());
        tree.set_statistics(Some(stats.clone()));
        at(&mut tree, 55.0);
        assert_eq!(tree.alive_children(list), &[items[5]]);
        stats.take();

        at(&mut tree, 65.0);
        assert_eq!(tree.alive_children(list), &[items[6]]);
        assert!(
            stats.get(StatisticsCounter::LifetimeChecks) < 10,
            "only entries near the boundary are checked, got {}",
            stats.get(StatisticsCounter::LifetimeChecks)
        );

        tree.set_lifetime(items[6], 0.0, 1.0).unwrap();
        at(&mut tree, 65.0);
        assert!(tree.alive_children(list).is_empty(), "re-timed entries are re-evaluated");

        assert!(tree.remove_child(list, items[0]).unwrap());
        at(&mut tree, 0.5);
        assert_eq!(tree.alive_children(list), &[items[6]]);
    }

    #[test]
    fn managed_children_cannot_remove_themselves() {
        let mut tree = Tree::default();
        let list = tree.create(NodeDesc::lifetime_managed()).unwrap();
        let a = tree
            .create(NodeDesc {
                remove_when_not_alive: true,
                ..NodeDesc::leaf()
            })
            .unwrap();
        assert_eq!(
            tree.add_child(list, a),
            Err(SceneError::LifetimeManagedRemoveWhenNotAlive(list))
        );
        let b = tree.create(NodeDesc::leaf()).unwrap();
        tree.add_child(list, b).unwrap();
        assert!(tree.set_remove_when_not_alive(b, true).is_err());
    }

    type Crossings = Arc<Mutex<Vec<(NodeId, LifetimeBoundary, CrossingDirection)>>>;

    struct Recorder(Crossings);

    impl Behavior for Recorder {
        fn lifetime_boundary_crossed(
            &mut self,
            tree: &mut Tree,
            _node: NodeId,
            child: NodeId,
            boundary: LifetimeBoundary,
            direction: CrossingDirection,
        ) {
            self.0.lock().unwrap().push((child, boundary, direction));
            if boundary == LifetimeBoundary::End && direction == CrossingDirection::Forward {
                // Recycle the item for another window later on.
                tree.set_lifetime(child, 100.0, 200.0).unwrap();
            }
        }
    }

    #[test]
    fn boundary_handlers_can_retime_children() {
        let crossings = Crossings::default();
        let mut tree = Tree::default();
        let root = tree.root();
        let list = tree
            .create(NodeDesc::lifetime_managed().with_behavior(Recorder(Arc::clone(&crossings))))
            .unwrap();
        tree.add_child(root, list).unwrap();
        let a = tree
            .create(NodeDesc::leaf().with_lifetime(10.0, 20.0))
            .unwrap();
        tree.add_child(list, a).unwrap();

        at(&mut tree, 5.0);
        at(&mut tree, 15.0);
        at(&mut tree, 25.0);
        assert!(!tree.is_alive(a));
        assert_eq!(tree.lifetime(a), Some((100.0, 200.0)));
        at(&mut tree, 150.0);
        assert!(tree.is_alive(a), "re-timed child comes back");

        let seen = crossings.lock().unwrap();
        assert_eq!(
            seen.first(),
            Some(&(a, LifetimeBoundary::Start, CrossingDirection::Forward))
        );
        assert!(seen.contains(&(a, LifetimeBoundary::End, CrossingDirection::Forward)));
    }
}
