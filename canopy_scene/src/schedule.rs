// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred per-node work, run after the node's children update.

use crate::error::{SceneError, finite};
use crate::stats::StatisticsCounter;
use crate::tree::Tree;
use crate::types::NodeId;

type Task = Box<dyn FnOnce(&mut Tree, NodeId) + Send>;

/// A task waiting for its node's clock to reach `due`.
pub(crate) struct ScheduledTask {
    due: f64,
    task: Task,
}

impl Tree {
    /// Run `task` on the first update of `id` at least `delay` after now, once the
    /// node's children have updated.
    ///
    /// Time is measured on the node's clock. Tasks scheduled for the same update run in
    /// the order they were scheduled. Disposing the node drops its pending tasks.
    pub fn schedule_after_children(
        &mut self,
        id: NodeId,
        delay: f64,
        task: impl FnOnce(&mut Self, NodeId) + Send + 'static,
    ) -> Result<(), SceneError> {
        let delay = finite("delay", delay)?;
        self.try_node(id)?;
        let due = self.time_of(id) + delay.max(0.0);
        self.node_mut(id).scheduled.push(ScheduledTask {
            due,
            task: Box::new(task),
        });
        Ok(())
    }

    /// Number of tasks waiting on `id`.
    pub fn scheduled_count(&self, id: NodeId) -> usize {
        self.node_opt(id).map_or(0, |n| n.scheduled.len())
    }

    /// Run the tasks of `id` that are due.
    ///
    /// Tasks scheduled while running wait for the next update.
    pub(crate) fn run_scheduled_after_children(&mut self, id: NodeId) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        if node.scheduled.is_empty() {
            return;
        }
        let time = self.time_of(id);
        let pending = core::mem::take(&mut self.node_mut(id).scheduled);
        let (due, mut waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|t| t.due <= time);
        self.record(StatisticsCounter::ScheduledTasks, due.len() as u64);

        for task in due {
            if !self.contains(id) {
                return;
            }
            (task.task)(self, id);
        }
        if let Some(node) = self.node_opt_mut(id) {
            waiting.append(&mut node.scheduled);
            node.scheduled = waiting;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::clock::ClockId;
    use crate::stats::FrameStatistics;
    use crate::{NodeDesc, Tree};

    use super::*;

    #[test]
    fn tasks_wait_for_their_time() {
        let mut tree = Tree::default();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();
        tree.add_child(tree.root(), leaf).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        tree.schedule_after_children(leaf, 50.0, move |tree, node| {
            counter.fetch_add(1, Ordering::Relaxed);
            tree.set_alpha(node, 0.5).unwrap();
        })
        .unwrap();
        let stats = Arc::new(FrameStatistics::new());
        tree.set_statistics(Some(stats.clone()));

        tree.advance_clock(ClockId::ROOT, 20.0).unwrap();
        tree.update();
        assert_eq!(runs.load(Ordering::Relaxed), 0, "not due yet");
        assert_eq!(tree.scheduled_count(leaf), 1);

        tree.advance_clock(ClockId::ROOT, 30.0).unwrap();
        tree.update();
        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(tree.scheduled_count(leaf), 0);
        assert_eq!(tree.alpha(leaf), Some(0.5), "tasks get mutable tree access");
        assert_eq!(stats.get(StatisticsCounter::ScheduledTasks), 1);
    }

    #[test]
    fn tasks_run_after_children_and_in_order() {
        let mut tree = Tree::default();
        let root = tree.root();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            tree.schedule_after_children(root, 0.0, move |tree, node| {
                order.lock().unwrap().push(name);
                if name == "first" {
                    // Rescheduled work waits for the next update.
                    let order = Arc::clone(&order);
                    tree.schedule_after_children(node, 0.0, move |_, _| {
                        order.lock().unwrap().push("later");
                    })
                    .unwrap();
                }
            })
            .unwrap();
        }
        tree.update();
        assert_eq!(*order.lock().unwrap(), ["first", "second"]);
        tree.update();
        assert_eq!(*order.lock().unwrap(), ["first", "second", "later"]);
    }

    #[test]
    fn disposed_nodes_drop_their_tasks() {
        let mut tree = Tree::default();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();
        tree.add_child(tree.root(), leaf).unwrap();
        tree.schedule_after_children(leaf, 0.0, |_, _| panic!("must not run"))
            .unwrap();
        tree.dispose(leaf);
        tree.update();
        assert!(tree.schedule_after_children(leaf, 0.0, |_, _| {}).is_err());
    }
}
