// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: storage, invalidation, node setters.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use kurbo::{Size, Vec2};
use tracing::debug;

use crate::behavior::Behavior;
use crate::clock::{ClockId, FrameClock};
use crate::dependencies::Dependencies;
use crate::error::{SceneError, finite};
use crate::invalidation::{Invalidation, InvalidationSource, derive_child_invalidation};
use crate::load::LoadCompletion;
use crate::node::{CompositeState, Node, NodeDesc, NodeKind};
use crate::stats::{StatisticsCounter, StatisticsSink};
use crate::types::{Anchor, Axes, LoadState, MarginPadding, NodeId, Rgba};

/// Tree-wide configuration.
#[derive(Clone, Debug)]
pub struct TreeOptions {
    /// Size of the root composite.
    pub root_size: Size,
    /// Splice the children of pure grouping composites into their parent's draw node
    /// instead of giving the composite a draw node of its own.
    pub flatten_composites: bool,
    /// Starting time of the root clock.
    pub initial_time: f64,
    /// Dependencies handed to every node that loads, unless overridden on a subtree.
    pub dependencies: Dependencies,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            root_size: Size::new(1024.0, 768.0),
            flatten_composites: true,
            initial_time: 0.0,
            dependencies: Dependencies::new(),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(TreeOptions::default())
    }
}

/// A retained-mode scene graph.
///
/// The tree owns every node. Nodes are created detached with [`Tree::create`], attached
/// to composites with [`Tree::add_child`], and freed with [`Tree::dispose`].
/// Ids are generational: once a node is disposed, its id never resolves again.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    root: NodeId,
    pub(crate) flatten_composites: bool,
    pub(crate) clocks: Vec<FrameClock>,
    pub(crate) dependencies: Dependencies,
    pub(crate) stats: Option<Arc<dyn StatisticsSink>>,
    /// Number of live buffered composites; zero skips ancestor version walks.
    pub(crate) buffered_count: usize,
    pub(crate) load_tx: Sender<LoadCompletion>,
    pub(crate) load_rx: Receiver<LoadCompletion>,
    pub(crate) frame: u64,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let live = self.node_count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_live", &live)
            .field("free_list", &free)
            .field("root", &self.root)
            .field("clocks", &self.clocks.len())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Create a tree holding only its root composite.
    ///
    /// The root is ready and alive from the start, so children added to it load
    /// immediately.
    pub fn new(options: TreeOptions) -> Self {
        let (load_tx, load_rx) = crossbeam_channel::unbounded();
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            flatten_composites: options.flatten_composites,
            clocks: vec![FrameClock::new(options.initial_time)],
            dependencies: options.dependencies,
            stats: None,
            buffered_count: 0,
            load_tx,
            load_rx,
            frame: 0,
        };
        let desc = NodeDesc::composite().with_size(options.root_size);
        let root = tree.insert(&desc, None);
        let node = tree.node_mut(root);
        node.load_state = LoadState::Ready;
        node.alive = true;
        node.own_clock = true;
        tree.root = root;
        tree
    }

    /// The root composite.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node.
    ///
    /// Fails if a numeric field is not finite, or if composite-only fields are set on a
    /// leaf, or if an axis is both relatively sized and auto-sized.
    pub fn create(&mut self, mut desc: NodeDesc) -> Result<NodeId, SceneError> {
        validate_desc(&desc)?;
        let behavior = desc.behavior.take();
        let id = self.insert(&desc, behavior);
        if let Err(err) = self.check_desc(id, &desc) {
            self.release(id);
            return Err(err);
        }
        if desc.kind == NodeKind::Buffered {
            self.buffered_count += 1;
        }
        Ok(id)
    }

    fn check_desc(&self, id: NodeId, desc: &NodeDesc) -> Result<(), SceneError> {
        let composite_only = !desc.auto_size_axes.is_empty()
            || desc.padding != MarginPadding::ZERO
            || desc.masking;
        if !desc.kind.is_composite() && composite_only {
            return Err(SceneError::NotAComposite(id));
        }
        let both = desc.auto_size_axes & desc.relative_size_axes;
        if !both.is_empty() {
            return Err(SceneError::RelativeAndAutoSized { node: id, axes: both });
        }
        Ok(())
    }

    fn insert(&mut self, desc: &NodeDesc, behavior: Option<Box<dyn Behavior>>) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, desc, behavior));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, desc, behavior)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Dispose a node and its whole subtree, detaching it from its parent first.
    ///
    /// Returns `false` for stale ids and for the root.
    pub fn dispose(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.node(id).parent {
            self.detach_child(parent, id);
        }
        self.release(id);
        debug!(?id, "node disposed");
        true
    }

    /// Free a detached subtree.
    fn release(&mut self, id: NodeId) {
        let Some(node) = self.nodes[id.idx()].take() else {
            return;
        };
        if let Some(token) = &node.load_token {
            token.cancel();
        }
        if node.is_buffered() {
            self.buffered_count = self.buffered_count.saturating_sub(1);
        }
        self.free_list.push(id.idx());
        if let Some(composite) = node.composite {
            for child in composite.children {
                self.release(child);
            }
        }
    }

    /// Returns true if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// Number of live nodes, including the root and detached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node_opt(id).map(|n| n.kind)
    }

    /// The composite owning `id`, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    /// Children of a composite in draw order. Empty for leaves and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.composite_opt(id).map_or(&[], |c| &c.children)
    }

    /// The alive subset of [`Tree::children`], in the same order.
    pub fn alive_children(&self, id: NodeId) -> &[NodeId] {
        self.composite_opt(id).map_or(&[], |c| &c.alive)
    }

    /// Insertion id assigned by the current parent; zero when detached.
    pub fn child_id(&self, id: NodeId) -> Option<u64> {
        self.node_opt(id).map(|n| n.child_id)
    }

    /// Attach a statistics sink, or remove it with `None`.
    pub fn set_statistics(&mut self, sink: Option<Arc<dyn StatisticsSink>>) {
        self.stats = sink;
    }

    /// Number of completed update passes.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // --- node access ---

    /// Access a node; panics if its slot is empty.
    ///
    /// A reused slot is only detected in debug builds. Use [`Tree::try_node`] for ids
    /// that may be stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        let node = self.nodes[id.idx()].as_ref().expect("dangling NodeId");
        debug_assert_eq!(node.generation, id.1, "stale NodeId {id:?}");
        node
    }

    /// Access a node mutably; panics if its slot is empty.
    ///
    /// Stale ids are checked as in [`Tree::node`].
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let node = self.nodes[id.idx()].as_mut().expect("dangling NodeId");
        debug_assert_eq!(node.generation, id.1, "stale NodeId {id:?}");
        node
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    pub(crate) fn try_node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.node_opt(id).ok_or(SceneError::StaleNode(id))
    }

    pub(crate) fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.node_opt_mut(id).ok_or(SceneError::StaleNode(id))
    }

    pub(crate) fn composite_opt(&self, id: NodeId) -> Option<&CompositeState> {
        self.node_opt(id)?.composite.as_deref()
    }

    pub(crate) fn try_composite(&self, id: NodeId) -> Result<&CompositeState, SceneError> {
        self.try_node(id)?
            .composite
            .as_deref()
            .ok_or(SceneError::NotAComposite(id))
    }

    pub(crate) fn try_composite_mut(
        &mut self,
        id: NodeId,
    ) -> Result<&mut CompositeState, SceneError> {
        self.try_node_mut(id)?
            .composite
            .as_deref_mut()
            .ok_or(SceneError::NotAComposite(id))
    }

    /// Snapshot of a composite's children.
    pub(crate) fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).to_vec()
    }

    pub(crate) fn record(&self, counter: StatisticsCounter, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Some(stats) = &self.stats {
            stats.increment(counter, amount);
        }
    }

    // --- invalidation ---

    /// Invalidate cached state of `id` and propagate it through the tree.
    ///
    /// Returns whether any cached state changed. Invalidating state that is already
    /// invalid is a no-op.
    pub fn invalidate(&mut self, id: NodeId, mask: Invalidation) -> Result<bool, SceneError> {
        self.try_node(id)?;
        Ok(self.invalidate_with(id, mask, InvalidationSource::Own, true))
    }

    pub(crate) fn invalidate_with(
        &mut self,
        id: NodeId,
        mask: Invalidation,
        source: InvalidationSource,
        propagate: bool,
    ) -> bool {
        let Some(node) = self.node_opt_mut(id) else {
            return false;
        };
        let mut changed = node.caches.invalidate_layout(mask);
        if node.caches.draw_node.invalidate_for(mask) {
            node.invalidation_id += 1;
            changed = true;
        }
        let parent = node.parent;
        let buffered = node.is_buffered();

        if changed {
            self.record(StatisticsCounter::Invalidations, 1);
            if buffered {
                self.bump_update_version(id);
            }
        }

        if changed && propagate && source != InvalidationSource::Child {
            for child in self.children_vec(id) {
                let derived = derive_child_invalidation(mask, self.node(child).sizing());
                if !derived.is_empty() {
                    self.invalidate_with(child, derived, InvalidationSource::Parent, true);
                }
            }
        }

        if source != InvalidationSource::Parent {
            if let Some(parent) = parent {
                self.invalidate_from_child(parent, id, mask);
                // A node turning visible has no warm caches, yet still changes what a
                // buffered ancestor renders.
                if changed || mask.contains(Invalidation::PRESENCE) {
                    self.mark_buffered_dirty(parent);
                }
            }
        }

        changed
    }

    /// A child's geometry or presence changed; recompute auto-size if it matters.
    pub(crate) fn invalidate_from_child(&mut self, parent: NodeId, child: NodeId, mask: Invalidation) {
        if !mask.intersects(Invalidation::REQUIRED_PARENT_SIZE_TO_FIT | Invalidation::PRESENCE) {
            return;
        }
        let Some(axes) = self.composite_opt(parent).map(|c| c.auto_size_axes) else {
            return;
        };
        let bypass = self.node(child).geometry.bypass_auto_size_axes;
        if axes.is_empty() || bypass.contains(axes) {
            return;
        }
        self.invalidate_auto_size(parent);
    }

    /// Mark the auto-size of `id` stale.
    ///
    /// Without a transition the next read already sees the new size, so sizes derived
    /// from the old one are invalidated as well. Animated auto-sizes follow in `update`.
    pub(crate) fn invalidate_auto_size(&mut self, id: NodeId) {
        let Some(c) = self.composite_opt(id) else {
            return;
        };
        if c.auto_size_axes.is_empty() {
            return;
        }
        if c.auto_size.invalidate() && c.auto_size_is_immediate() {
            self.invalidate_with(id, Invalidation::DRAW_SIZE, InvalidationSource::Own, true);
        }
    }

    /// Bump the update version of `from` and every buffered ancestor.
    pub(crate) fn mark_buffered_dirty(&mut self, from: NodeId) {
        if self.buffered_count == 0 {
            return;
        }
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let Some(node) = self.node_opt(id) else {
                return;
            };
            cursor = node.parent;
            if node.is_buffered() {
                self.bump_update_version(id);
            }
        }
    }

    /// Apply a mutation and raise `mask`, adding [`Invalidation::PRESENCE`] when the
    /// node's presence flips.
    fn mutate(
        &mut self,
        id: NodeId,
        mask: Invalidation,
        f: impl FnOnce(&mut Node),
    ) -> Result<(), SceneError> {
        let node = self.try_node_mut(id)?;
        let was_present = node.is_present();
        f(node);
        let mut mask = mask;
        if node.is_present() != was_present {
            mask |= Invalidation::PRESENCE;
        }
        self.invalidate_with(id, mask, InvalidationSource::Own, true);
        Ok(())
    }

    // --- setters ---

    /// Set the position relative to the anchor.
    pub fn set_position(&mut self, id: NodeId, position: Vec2) -> Result<(), SceneError> {
        finite_vec("position", position)?;
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| {
            n.geometry.position = position;
        })
    }

    /// Set the size. Fails on auto-sized composites.
    pub fn set_size(&mut self, id: NodeId, size: Size) -> Result<(), SceneError> {
        finite("width", size.width)?;
        finite("height", size.height)?;
        self.check_not_auto_sized(id, Axes::BOTH)?;
        self.mutate(id, Invalidation::DRAW_SIZE, |n| n.geometry.size = size)
    }

    /// Set the width. Fails if the width is auto-sized.
    pub fn set_width(&mut self, id: NodeId, width: f64) -> Result<(), SceneError> {
        finite("width", width)?;
        self.check_not_auto_sized(id, Axes::X)?;
        self.mutate(id, Invalidation::DRAW_SIZE, |n| n.geometry.size.width = width)
    }

    /// Set the height. Fails if the height is auto-sized.
    pub fn set_height(&mut self, id: NodeId, height: f64) -> Result<(), SceneError> {
        finite("height", height)?;
        self.check_not_auto_sized(id, Axes::Y)?;
        self.mutate(id, Invalidation::DRAW_SIZE, |n| {
            n.geometry.size.height = height;
        })
    }

    fn check_not_auto_sized(&self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        let auto = self.try_node(id)?.auto_size_axes() & axes;
        if auto.is_empty() {
            Ok(())
        } else {
            Err(SceneError::AutoSizedAxis { node: id, axes: auto })
        }
    }

    /// Set the scale around the origin.
    pub fn set_scale(&mut self, id: NodeId, scale: Vec2) -> Result<(), SceneError> {
        finite_vec("scale", scale)?;
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| n.geometry.scale = scale)
    }

    /// Set the rotation around the origin, in radians.
    pub fn set_rotation(&mut self, id: NodeId, rotation: f64) -> Result<(), SceneError> {
        finite("rotation", rotation)?;
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| {
            n.geometry.rotation = rotation;
        })
    }

    /// Set the shear around the origin.
    pub fn set_shear(&mut self, id: NodeId, shear: Vec2) -> Result<(), SceneError> {
        finite_vec("shear", shear)?;
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| n.geometry.shear = shear)
    }

    /// Set the pivot within the parent.
    pub fn set_anchor(&mut self, id: NodeId, anchor: Anchor) -> Result<(), SceneError> {
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| n.geometry.anchor = anchor)
    }

    /// Set the pivot within the node.
    pub fn set_origin(&mut self, id: NodeId, origin: Anchor) -> Result<(), SceneError> {
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| n.geometry.origin = origin)
    }

    /// Set the outer spacing.
    pub fn set_margin(&mut self, id: NodeId, margin: MarginPadding) -> Result<(), SceneError> {
        if !margin.is_finite() {
            return Err(SceneError::InvalidValue {
                what: "margin",
                value: f64::NAN,
            });
        }
        self.mutate(
            id,
            Invalidation::MISC_GEOMETRY | Invalidation::DRAW_SIZE,
            |n| n.geometry.margin = margin,
        )
    }

    /// Set the colour multiplied into the node and its descendants.
    pub fn set_colour(&mut self, id: NodeId, colour: Rgba) -> Result<(), SceneError> {
        self.mutate(id, Invalidation::COLOUR, |n| n.colour = colour)
    }

    /// Set the opacity multiplied into the node and its descendants.
    pub fn set_alpha(&mut self, id: NodeId, alpha: f32) -> Result<(), SceneError> {
        finite("alpha", f64::from(alpha))?;
        self.mutate(id, Invalidation::COLOUR, |n| n.alpha = alpha)
    }

    /// Keep the node present even when it is invisible.
    pub fn set_always_present(&mut self, id: NodeId, always: bool) -> Result<(), SceneError> {
        self.mutate(id, Invalidation::empty(), |n| n.always_present = always)
    }

    /// Set the sibling ordering key, re-sorting the parent's children.
    pub fn set_depth(&mut self, id: NodeId, depth: f32) -> Result<(), SceneError> {
        finite("depth", f64::from(depth))?;
        match self.try_node(id)?.parent {
            Some(parent) => self.change_child_depth(parent, id, depth),
            None => {
                self.node_mut(id).depth = depth;
                Ok(())
            }
        }
    }

    /// Set the lifetime window `[start, end)`. Infinite bounds leave that side open.
    ///
    /// Takes effect at the parent's next life-cycle scan.
    pub fn set_lifetime(&mut self, id: NodeId, start: f64, end: f64) -> Result<(), SceneError> {
        if start.is_nan() {
            return Err(SceneError::InvalidValue {
                what: "lifetime start",
                value: start,
            });
        }
        if end.is_nan() {
            return Err(SceneError::InvalidValue {
                what: "lifetime end",
                value: end,
            });
        }
        let node = self.try_node_mut(id)?;
        node.lifetime_start = start;
        node.lifetime_end = end;
        let (parent, entry) = (node.parent, node.lifetime_entry);
        if let (Some(parent), Some(entry)) = (parent, entry) {
            if let Some(manager) = self
                .node_opt_mut(parent)
                .and_then(|p| p.composite.as_mut())
                .and_then(|c| c.lifetimes.as_mut())
            {
                manager.set_lifetime(entry, start, end);
            }
        }
        Ok(())
    }

    /// Leave the parent once the lifetime window has passed.
    pub fn set_remove_when_not_alive(&mut self, id: NodeId, remove: bool) -> Result<(), SceneError> {
        let parent = self.try_node(id)?.parent;
        if remove {
            if let Some(parent) = parent {
                if self.node(parent).kind == NodeKind::LifetimeManaged {
                    return Err(SceneError::LifetimeManagedRemoveWhenNotAlive(parent));
                }
            }
        }
        self.node_mut(id).remove_when_not_alive = remove;
        Ok(())
    }

    /// Dispose the node when it is removed for not being alive.
    pub fn set_dispose_on_death_removal(
        &mut self,
        id: NodeId,
        dispose: bool,
    ) -> Result<(), SceneError> {
        self.try_node_mut(id)?.dispose_on_death_removal = dispose;
        Ok(())
    }

    /// Set the axes on which the size is a fraction of the parent.
    pub fn set_relative_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        let both = self.try_node(id)?.auto_size_axes() & axes;
        if !both.is_empty() {
            return Err(SceneError::RelativeAndAutoSized { node: id, axes: both });
        }
        self.mutate(id, Invalidation::DRAW_SIZE, |n| {
            n.geometry.relative_size_axes = axes;
        })
    }

    /// Set the axes on which the position is a fraction of the parent.
    pub fn set_relative_position_axes(
        &mut self,
        id: NodeId,
        axes: Axes,
    ) -> Result<(), SceneError> {
        self.mutate(id, Invalidation::MISC_GEOMETRY, |n| {
            n.geometry.relative_position_axes = axes;
        })
    }

    /// Set the axes on which an auto-sizing parent ignores this node.
    pub fn set_bypass_auto_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        let node = self.try_node_mut(id)?;
        node.geometry.bypass_auto_size_axes = axes;
        if let Some(parent) = node.parent {
            self.invalidate_auto_size(parent);
        }
        Ok(())
    }

    /// Replace the node's behavior.
    pub fn set_behavior(&mut self, id: NodeId, behavior: impl Behavior) -> Result<(), SceneError> {
        self.mutate(
            id,
            Invalidation::DRAW_NODE | Invalidation::REQUIRED_PARENT_SIZE_TO_FIT,
            |n| n.behavior = Some(Box::new(behavior)),
        )
    }

    // --- plain state queries ---

    /// Whether the node is alive in its parent.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.alive)
    }

    /// Whether the node contributes to rendering and auto-sizing.
    pub fn is_present(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(Node::is_present)
    }

    /// The node's loading stage.
    pub fn load_state(&self, id: NodeId) -> Option<LoadState> {
        self.node_opt(id).map(|n| n.load_state)
    }

    /// The declared lifetime window.
    pub fn lifetime(&self, id: NodeId) -> Option<(f64, f64)> {
        self.node_opt(id).map(|n| (n.lifetime_start, n.lifetime_end))
    }

    /// The sibling ordering key.
    pub fn depth(&self, id: NodeId) -> Option<f32> {
        self.node_opt(id).map(|n| n.depth)
    }

    /// The declared position.
    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.node_opt(id).map(|n| n.geometry.position)
    }

    /// The declared colour.
    pub fn colour(&self, id: NodeId) -> Option<Rgba> {
        self.node_opt(id).map(|n| n.colour)
    }

    /// The declared opacity.
    pub fn alpha(&self, id: NodeId) -> Option<f32> {
        self.node_opt(id).map(|n| n.alpha)
    }

    /// The axes an auto-sizing parent ignores this node on.
    pub fn bypass_auto_size_axes(&self, id: NodeId) -> Option<Axes> {
        self.node_opt(id).map(|n| n.geometry.bypass_auto_size_axes)
    }

    /// The clock driving the root.
    pub fn root_clock(&self) -> ClockId {
        ClockId::ROOT
    }
}

fn finite_vec(what: &'static str, v: Vec2) -> Result<(), SceneError> {
    finite(what, v.x)?;
    finite(what, v.y)?;
    Ok(())
}

fn validate_desc(desc: &NodeDesc) -> Result<(), SceneError> {
    finite_vec("position", desc.position)?;
    finite("width", desc.size.width)?;
    finite("height", desc.size.height)?;
    finite_vec("scale", desc.scale)?;
    finite("rotation", desc.rotation)?;
    finite_vec("shear", desc.shear)?;
    finite("alpha", f64::from(desc.alpha))?;
    finite("depth", f64::from(desc.depth))?;
    if desc.lifetime_start.is_nan() {
        return Err(SceneError::InvalidValue {
            what: "lifetime start",
            value: desc.lifetime_start,
        });
    }
    if desc.lifetime_end.is_nan() {
        return Err(SceneError::InvalidValue {
            what: "lifetime end",
            value: desc.lifetime_end,
        });
    }
    if !desc.margin.is_finite() || !desc.padding.is_finite() {
        return Err(SceneError::InvalidValue {
            what: "spacing",
            value: f64::NAN,
        });
    }
    Ok(())
}
