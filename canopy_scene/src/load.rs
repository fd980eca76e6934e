// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loading nodes, on the update thread or deferred to another thread.
//!
//! A node loads once, before it can become alive. Attaching a node under a parent that
//! has started loading loads it on the spot; nodes attached under an unloaded parent
//! load together with that parent. [`Tree::load_async`] moves the heavyweight part of
//! loading to another thread and splices the node in when the result comes back.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, trace, warn};

use crate::behavior::Behavior;
use crate::dependencies::Dependencies;
use crate::error::SceneError;
use crate::tree::Tree;
use crate::types::{LoadState, NodeId};

/// Shared flag telling a deferred load that its result is no longer wanted.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every holder of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancellationToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// What [`Behavior::load`] gets to work with.
#[derive(Debug)]
pub struct LoadContext<'a> {
    node: NodeId,
    time: f64,
    dependencies: &'a Dependencies,
    token: Option<&'a CancellationToken>,
}

impl<'a> LoadContext<'a> {
    /// The node being loaded.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Clock time of the node when loading started.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The dependency set handed to the node.
    pub fn dependencies(&self) -> &'a Dependencies {
        self.dependencies
    }

    /// Whether a deferred load was cancelled while it ran.
    ///
    /// Long-running loads may poll this and bail out early. Always `false` on the update
    /// thread.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_some_and(CancellationToken::is_cancelled)
    }
}

/// Result of a deferred load, posted back to the tree.
pub(crate) struct LoadCompletion {
    target: NodeId,
    parent: NodeId,
    token: CancellationToken,
    behavior: Option<Box<dyn Behavior>>,
    loaded: bool,
}

/// A deferred load of one node, ready to run on any thread.
///
/// Created by [`Tree::load_async`]. Running it calls [`Behavior::load`] and posts the
/// result back; the next [`Tree::update`] attaches the node to its target parent.
/// Dropping the job without running it returns the node to
/// [`LoadState::NotLoaded`].
#[must_use = "the node stays in the loading state until the job runs or is dropped"]
pub struct AsyncLoad {
    job: Option<LoadJob>,
}

struct LoadJob {
    target: NodeId,
    parent: NodeId,
    time: f64,
    dependencies: Dependencies,
    token: CancellationToken,
    behavior: Option<Box<dyn Behavior>>,
    tx: Sender<LoadCompletion>,
}

impl LoadJob {
    fn complete(mut self, loaded: bool) {
        let done = LoadCompletion {
            target: self.target,
            parent: self.parent,
            token: self.token,
            behavior: self.behavior.take(),
            loaded,
        };
        // The tree is gone if the receiver hung up; nothing is left to update.
        let _ = self.tx.send(done);
    }
}

impl core::fmt::Debug for AsyncLoad {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("AsyncLoad");
        if let Some(job) = &self.job {
            s.field("target", &job.target)
                .field("parent", &job.parent)
                .field("cancelled", &job.token.is_cancelled());
        }
        s.finish_non_exhaustive()
    }
}

impl AsyncLoad {
    /// The node being loaded.
    pub fn target(&self) -> Option<NodeId> {
        self.job.as_ref().map(|j| j.target)
    }

    /// A handle that cancels this load.
    pub fn token(&self) -> Option<CancellationToken> {
        self.job.as_ref().map(|j| j.token.clone())
    }

    /// Perform the load and post the result to the tree.
    ///
    /// Skips the work if the load was cancelled before it started.
    pub fn run(mut self) {
        let Some(mut job) = self.job.take() else {
            return;
        };
        if job.token.is_cancelled() {
            job.complete(false);
            return;
        }
        if let Some(behavior) = job.behavior.as_mut() {
            let mut ctx = LoadContext {
                node: job.target,
                time: job.time,
                dependencies: &job.dependencies,
                token: Some(&job.token),
            };
            behavior.load(&mut ctx);
        }
        job.complete(true);
    }
}

impl Drop for AsyncLoad {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.complete(false);
        }
    }
}

impl Tree {
    /// Load `id` and its subtree on the update thread.
    ///
    /// Nodes that are already loading or loaded are left alone.
    pub(crate) fn load_subtree(&mut self, id: NodeId) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        if node.load_state != LoadState::NotLoaded {
            return;
        }
        node.load_state = LoadState::Loading;
        self.run_load(id);
        self.finish_load(id);
    }

    fn run_load(&mut self, id: NodeId) {
        let Some(mut behavior) = self.node_mut(id).behavior.take() else {
            return;
        };
        let time = self.time_of(id);
        let dependencies = self.dependencies_for(id).cloned().unwrap_or_default();
        let mut ctx = LoadContext {
            node: id,
            time,
            dependencies: &dependencies,
            token: None,
        };
        behavior.load(&mut ctx);
        let node = self.node_mut(id);
        if node.behavior.is_none() {
            node.behavior = Some(behavior);
        }
    }

    /// Load the children of a node whose own load finished, then mark it ready.
    fn finish_load(&mut self, id: NodeId) {
        for child in self.children_vec(id) {
            self.load_subtree(child);
        }
        self.node_mut(id).load_state = LoadState::Ready;
        trace!(?id, "node ready");
    }

    /// Load `child` on another thread and attach it to `parent` once done.
    ///
    /// The child must be detached and not yet loaded. It is marked
    /// [`LoadState::Loading`] until the returned job has run and a later
    /// [`Tree::update`] has picked up the result. The completion is dropped, and the
    /// child returned to [`LoadState::NotLoaded`], if the load was cancelled or `parent`
    /// was disposed in the meantime.
    pub fn load_async(&mut self, parent: NodeId, child: NodeId) -> Result<AsyncLoad, SceneError> {
        self.try_composite(parent)?;
        let node = self.try_node(child)?;
        if child == self.root() {
            return Err(SceneError::RootNotAttachable(child));
        }
        if let Some(existing) = node.parent {
            return Err(SceneError::AlreadyParented {
                child,
                parent: existing,
            });
        }
        if node.load_state != LoadState::NotLoaded {
            return Err(SceneError::AlreadyLoaded(child));
        }

        let time = self.time_of(parent);
        let dependencies = self.dependencies_for(parent).cloned().unwrap_or_default();
        let token = CancellationToken::new();
        let node = self.node_mut(child);
        node.load_state = LoadState::Loading;
        node.load_token = Some(token.clone());
        let behavior = node.behavior.take();
        debug!(?parent, ?child, "deferred load started");

        Ok(AsyncLoad {
            job: Some(LoadJob {
                target: child,
                parent,
                time,
                dependencies,
                token,
                behavior,
                tx: self.load_tx.clone(),
            }),
        })
    }

    /// Cancel the deferred load of `id`. Returns `false` if none is in flight.
    pub fn cancel_load(&mut self, id: NodeId) -> bool {
        let Some(token) = self.node_opt(id).and_then(|n| n.load_token.as_ref()) else {
            return false;
        };
        token.cancel();
        debug!(?id, "deferred load cancelled");
        true
    }

    /// Apply every deferred load result posted since the last call.
    pub(crate) fn drain_load_completions(&mut self) {
        while let Ok(done) = self.load_rx.try_recv() {
            self.complete_load(done);
        }
    }

    fn complete_load(&mut self, done: LoadCompletion) {
        let LoadCompletion {
            target,
            parent,
            token,
            behavior,
            loaded,
        } = done;
        let Some(node) = self.node_opt_mut(target) else {
            debug!(?target, "deferred load finished for a disposed node");
            return;
        };
        if !node.load_token.as_ref().is_some_and(|t| t.same_as(&token)) {
            return;
        }
        node.load_token = None;
        if node.behavior.is_none() {
            node.behavior = behavior;
        }

        let wanted = loaded && !token.is_cancelled();
        if !wanted || !self.contains(parent) {
            self.node_mut(target).load_state = LoadState::NotLoaded;
            debug!(?target, ?parent, loaded, "deferred load dropped");
            return;
        }

        self.finish_load(target);
        debug!(?target, ?parent, "deferred load completed");
        if let Err(err) = self.add_child(parent, target) {
            warn!(?target, ?parent, %err, "loaded node could not be attached");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use kurbo::Size;

    use crate::{NodeDesc, Tree};

    use super::*;

    #[derive(Debug, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    struct Loader {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Behavior for Loader {
        fn load(&mut self, ctx: &mut LoadContext<'_>) {
            let greeting = ctx.dependencies().get::<String>().cloned().unwrap_or_default();
            self.log
                .lock()
                .unwrap()
                .push(format!("load {} {greeting}", self.name));
        }

        fn load_complete(&mut self, _node: NodeId) {
            self.log.lock().unwrap().push(format!("complete {}", self.name));
        }
    }

    fn loader(log: &Log, name: &'static str) -> Loader {
        Loader {
            name,
            log: Arc::clone(&log.0),
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.0.lock().unwrap().clone()
    }

    #[test]
    fn subtree_loads_when_attached_under_a_loaded_parent() {
        let log = Log::default();
        let mut tree = Tree::default();
        tree.dependencies.insert(String::from("hi"));
        let group = tree
            .create(NodeDesc::composite().with_behavior(loader(&log, "group")))
            .unwrap();
        let leaf = tree
            .create(NodeDesc::leaf().with_behavior(loader(&log, "leaf")))
            .unwrap();
        tree.add_child(group, leaf).unwrap();
        assert_eq!(tree.load_state(leaf), Some(LoadState::NotLoaded));
        assert!(entries(&log).is_empty(), "detached parents do not load children");

        tree.add_child(tree.root(), group).unwrap();
        assert_eq!(tree.load_state(group), Some(LoadState::Ready));
        assert_eq!(tree.load_state(leaf), Some(LoadState::Ready));
        assert_eq!(entries(&log), ["load group hi", "load leaf hi"]);

        tree.update();
        assert_eq!(tree.load_state(leaf), Some(LoadState::Loaded));
        assert_eq!(
            entries(&log)[2..],
            ["complete group", "complete leaf"],
            "load_complete runs on the first update, parents first"
        );
    }

    #[test]
    fn subtree_dependencies_override_the_tree_set() {
        let log = Log::default();
        let mut tree = Tree::default();
        tree.dependencies.insert(String::from("tree"));
        let group = tree.create(NodeDesc::composite()).unwrap();
        tree.set_dependencies(group, Dependencies::new().with(String::from("group")))
            .unwrap();
        let leaf = tree
            .create(NodeDesc::leaf().with_behavior(loader(&log, "leaf")))
            .unwrap();
        tree.add_child(group, leaf).unwrap();
        tree.add_child(tree.root(), group).unwrap();
        assert_eq!(entries(&log), ["load leaf group"]);
    }

    #[test]
    fn async_load_attaches_on_update() {
        let log = Log::default();
        let mut tree = Tree::default();
        let root = tree.root();
        let leaf = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(10.0, 10.0))
                    .with_behavior(loader(&log, "async")),
            )
            .unwrap();
        let job = tree.load_async(root, leaf).unwrap();
        assert_eq!(tree.load_state(leaf), Some(LoadState::Loading));
        assert!(matches!(
            tree.load_async(root, leaf),
            Err(SceneError::AlreadyLoaded(_))
        ));

        std::thread::spawn(move || job.run()).join().unwrap();
        assert_eq!(tree.parent(leaf), None, "nothing changes until the next update");

        tree.update();
        assert_eq!(tree.parent(leaf), Some(root));
        assert!(tree.is_alive(leaf));
        assert_eq!(entries(&log), ["load async ", "complete async"]);
    }

    #[test]
    fn nodes_loading_elsewhere_cannot_be_attached() {
        let mut tree = Tree::default();
        let root = tree.root();
        let intended = tree.create(NodeDesc::composite()).unwrap();
        let other = tree.create(NodeDesc::composite()).unwrap();
        tree.add_children(root, [intended, other]).unwrap();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();

        let job = tree.load_async(intended, leaf).unwrap();
        assert!(
            matches!(tree.add_child(other, leaf), Err(SceneError::AlreadyLoaded(_))),
            "the in-flight load owns the node"
        );
        assert_eq!(tree.parent(leaf), None, "the failed attach changed nothing");

        job.run();
        tree.update();
        assert_eq!(tree.parent(leaf), Some(intended), "the load attaches it where asked");
        assert_eq!(tree.load_state(leaf), Some(LoadState::Ready));
        assert!(tree.is_alive(leaf), "attached and alive");
    }

    #[test]
    fn cancelled_async_load_leaves_the_tree_alone() {
        let log = Log::default();
        let mut tree = Tree::default();
        let root = tree.root();
        let leaf = tree
            .create(NodeDesc::leaf().with_behavior(loader(&log, "cancelled")))
            .unwrap();
        let job = tree.load_async(root, leaf).unwrap();
        assert!(tree.cancel_load(leaf));
        job.run();
        tree.update();
        assert_eq!(tree.parent(leaf), None);
        assert_eq!(tree.load_state(leaf), Some(LoadState::NotLoaded));
        assert!(entries(&log).is_empty(), "cancelled loads skip the work");

        tree.add_child(root, leaf).unwrap();
        assert_eq!(
            entries(&log),
            ["load cancelled "],
            "the behavior is handed back for a later load"
        );
    }

    #[test]
    fn async_load_for_a_disposed_parent_is_dropped() {
        let mut tree = Tree::default();
        let group = tree.create(NodeDesc::composite()).unwrap();
        tree.add_child(tree.root(), group).unwrap();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();
        let job = tree.load_async(group, leaf).unwrap();
        tree.dispose(group);
        job.run();
        tree.update();
        assert!(tree.contains(leaf));
        assert_eq!(tree.parent(leaf), None);
        assert_eq!(tree.load_state(leaf), Some(LoadState::NotLoaded));
    }

    #[test]
    fn dropped_job_resets_the_node() {
        let mut tree = Tree::default();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();
        let job = tree.load_async(tree.root(), leaf).unwrap();
        drop(job);
        tree.update();
        assert_eq!(tree.load_state(leaf), Some(LoadState::NotLoaded));
        assert!(!tree.cancel_load(leaf), "no load in flight");
    }
}
