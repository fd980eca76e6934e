// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child collections and composite-only configuration.

use kurbo::Vec2;
use tracing::trace;

use crate::error::{SceneError, finite};
use crate::invalidation::{Invalidation, InvalidationSource};
use crate::node::{CompositeState, NodeKind, sibling_order};
use crate::transition::Easing;
use crate::tree::Tree;
use crate::types::{Axes, EdgeEffect, LoadState, MarginPadding, NodeId, Rgba};

impl Tree {
    /// Attach `child` to the composite `parent`.
    ///
    /// The child is assigned the next child id, inherits the parent's clock, and is
    /// loaded at once if the parent has started loading. If the parent is ready, the
    /// child's alive state is evaluated immediately.
    ///
    /// A child with a deferred load in flight belongs to that load's parent and is
    /// rejected with [`SceneError::AlreadyLoaded`].
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let p = self.try_node(parent)?;
        let c = self.try_node(child)?;
        if parent == child {
            return Err(SceneError::AddToSelf(child));
        }
        if child == self.root() {
            return Err(SceneError::RootNotAttachable(child));
        }
        if p.composite.is_none() {
            return Err(SceneError::NotAComposite(parent));
        }
        if let Some(existing) = c.parent {
            return Err(SceneError::AlreadyParented {
                child,
                parent: existing,
            });
        }
        if c.load_token.is_some() {
            return Err(SceneError::AlreadyLoaded(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { child, parent });
        }
        let managed = p.kind == NodeKind::LifetimeManaged;
        if managed && c.remove_when_not_alive {
            return Err(SceneError::LifetimeManagedRemoveWhenNotAlive(parent));
        }
        let (parent_clock, parent_state) = (p.clock, p.load_state);

        let composite = self.composite_mut(parent);
        composite.next_child_id += 1;
        let child_id = composite.next_child_id;
        let node = self.node_mut(child);
        node.parent = Some(parent);
        node.child_id = child_id;
        let key = node.order_key();
        let (start, end) = (node.lifetime_start, node.lifetime_end);
        let inherit_clock = !node.own_clock;
        if inherit_clock {
            node.clock = parent_clock;
        }

        let at = self.sorted_position(&self.composite_ref(parent).children, key);
        let composite = self.composite_mut(parent);
        composite.children.insert(at, child);
        let entry = composite.lifetimes.as_mut().map(|m| m.add(child, start, end));
        if entry.is_some() {
            self.node_mut(child).lifetime_entry = entry;
        }
        if inherit_clock {
            self.propagate_clock(child, parent_clock);
        }
        trace!(?parent, ?child, child_id, "child added");

        if parent_state >= LoadState::Loading && self.node(child).load_state == LoadState::NotLoaded
        {
            self.load_subtree(child);
        }

        self.invalidate_with(
            child,
            Invalidation::ALL | Invalidation::PARENT,
            InvalidationSource::Parent,
            true,
        );
        self.invalidate_auto_size(parent);
        self.mark_buffered_dirty(parent);

        if parent_state >= LoadState::Ready && !managed {
            self.check_child_life(parent, child);
        }
        Ok(())
    }

    /// Attach every node in `children`, stopping at the first failure.
    pub fn add_children(
        &mut self,
        parent: NodeId,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<(), SceneError> {
        for child in children {
            self.add_child(parent, child)?;
        }
        Ok(())
    }

    /// Detach `child` from `parent`, handing ownership back to the caller.
    ///
    /// Returns `Ok(false)` if `child` is not currently a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SceneError> {
        self.try_composite(parent)?;
        if self.index_of(parent, child).is_none() {
            return Ok(false);
        }
        self.detach_child(parent, child);
        Ok(true)
    }

    /// Detach every child matching `predicate`. Returns how many were removed.
    pub fn remove_where(
        &mut self,
        parent: NodeId,
        mut predicate: impl FnMut(&Self, NodeId) -> bool,
    ) -> Result<usize, SceneError> {
        let children = self.try_composite(parent)?.children.clone();
        let doomed: Vec<NodeId> = children
            .into_iter()
            .filter(|&c| predicate(self, c))
            .collect();
        for &child in &doomed {
            self.detach_child(parent, child);
        }
        Ok(doomed.len())
    }

    /// Remove every child, disposing their subtrees if `dispose` is set.
    ///
    /// Without `dispose` the children are only detached and belong to the caller again.
    /// Returns how many children were removed.
    pub fn clear_children(&mut self, parent: NodeId, dispose: bool) -> Result<usize, SceneError> {
        let composite = self.try_composite_mut(parent)?;
        let children = core::mem::take(&mut composite.children);
        composite.alive.clear();
        if let Some(manager) = composite.lifetimes.as_mut() {
            manager.clear();
        }
        for &child in &children {
            let node = self.node_mut(child);
            node.parent = None;
            node.child_id = 0;
            node.alive = false;
            node.lifetime_entry = None;
            if dispose {
                self.dispose(child);
            } else {
                self.invalidate_with(
                    child,
                    Invalidation::ALL | Invalidation::PARENT,
                    InvalidationSource::Parent,
                    true,
                );
            }
        }
        self.invalidate_auto_size(parent);
        self.mark_buffered_dirty(parent);
        trace!(?parent, count = children.len(), dispose, "children cleared");
        Ok(children.len())
    }

    /// Move `child` to a new depth, keeping both child lists sorted.
    pub fn change_child_depth(
        &mut self,
        parent: NodeId,
        child: NodeId,
        depth: f32,
    ) -> Result<(), SceneError> {
        finite("depth", f64::from(depth))?;
        self.try_composite(parent)?;
        let Some(at) = self.index_of(parent, child) else {
            return Err(SceneError::NotAChild { child, parent });
        };
        let alive_at = self.alive_index_of(parent, child);
        let composite = self.composite_mut(parent);
        composite.children.remove(at);
        if let Some(i) = alive_at {
            composite.alive.remove(i);
        }

        let node = self.node_mut(child);
        node.depth = depth;
        let key = node.order_key();
        let at = self.sorted_position(&self.composite_ref(parent).children, key);
        self.composite_mut(parent).children.insert(at, child);
        if alive_at.is_some() {
            let at = self.sorted_position(&self.composite_ref(parent).alive, key);
            self.composite_mut(parent).alive.insert(at, child);
        }
        self.mark_buffered_dirty(parent);
        Ok(())
    }

    /// Unlink an attached child. The child must be in `parent`'s list.
    pub(crate) fn detach_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(at) = self.index_of(parent, child) else {
            return;
        };
        assert_eq!(
            self.node(child).parent,
            Some(parent),
            "child list of {parent:?} holds {child:?}, whose parent pointer disagrees"
        );
        let alive_at = self.alive_index_of(parent, child);
        let entry = self.node_mut(child).lifetime_entry.take();
        let composite = self.composite_mut(parent);
        composite.children.remove(at);
        if let Some(i) = alive_at {
            composite.alive.remove(i);
        }
        if let (Some(manager), Some(entry)) = (composite.lifetimes.as_mut(), entry) {
            manager.remove(entry);
        }

        let node = self.node_mut(child);
        node.parent = None;
        node.child_id = 0;
        node.alive = false;
        trace!(?parent, ?child, "child removed");

        self.invalidate_with(
            child,
            Invalidation::ALL | Invalidation::PARENT,
            InvalidationSource::Parent,
            true,
        );
        self.invalidate_auto_size(parent);
        self.mark_buffered_dirty(parent);
    }

    /// Insert `child` into the alive list of `parent`.
    pub(crate) fn insert_alive(&mut self, parent: NodeId, child: NodeId) {
        let key = self.node(child).order_key();
        let at = self.sorted_position(&self.composite_ref(parent).alive, key);
        let alive = &mut self.composite_mut(parent).alive;
        if alive.get(at) != Some(&child) {
            alive.insert(at, child);
        }
    }

    /// Remove `child` from the alive list of `parent`.
    pub(crate) fn remove_alive(&mut self, parent: NodeId, child: NodeId) {
        if let Some(i) = self.alive_index_of(parent, child) {
            self.composite_mut(parent).alive.remove(i);
        }
    }

    fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        let list = &self.composite_opt(parent)?.children;
        self.find_sorted(list, child)
    }

    fn alive_index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        let list = &self.composite_opt(parent)?.alive;
        self.find_sorted(list, child)
    }

    fn find_sorted(&self, list: &[NodeId], child: NodeId) -> Option<usize> {
        let key = self.node_opt(child)?.order_key();
        let at = self.sorted_position(list, key);
        (list.get(at) == Some(&child)).then_some(at)
    }

    /// First position in `list` whose key does not sort before `key`.
    fn sorted_position(&self, list: &[NodeId], key: (f32, u64)) -> usize {
        list.partition_point(|&c| sibling_order(self.node(c).order_key(), key).is_lt())
    }

    fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.node(id).parent;
        }
        false
    }

    fn composite_ref(&self, id: NodeId) -> &CompositeState {
        self.node(id)
            .composite
            .as_deref()
            .expect("node is not a composite")
    }

    fn composite_mut(&mut self, id: NodeId) -> &mut CompositeState {
        self.node_mut(id)
            .composite
            .as_deref_mut()
            .expect("node is not a composite")
    }

    fn mutate_composite(
        &mut self,
        id: NodeId,
        mask: Invalidation,
        f: impl FnOnce(&mut CompositeState) -> Result<(), SceneError>,
    ) -> Result<(), SceneError> {
        f(self.try_composite_mut(id)?)?;
        self.invalidate_with(id, mask, InvalidationSource::Own, true);
        Ok(())
    }

    // --- composite configuration ---

    /// Size the composite from its children on `axes`.
    ///
    /// Axes leaving auto-size keep the last auto-sized value as their declared size.
    pub fn set_auto_size_axes(&mut self, id: NodeId, axes: Axes) -> Result<(), SceneError> {
        self.try_node(id)?;
        let current = self.effective_size(id);
        let node = self.try_node_mut(id)?;
        let both = node.geometry.relative_size_axes & axes;
        if !both.is_empty() {
            return Err(SceneError::RelativeAndAutoSized { node: id, axes: both });
        }
        let declared = node.geometry.size;
        let Some(c) = node.composite.as_deref_mut() else {
            return Err(SceneError::NotAComposite(id));
        };
        let previous = c.auto_size_axes;
        let mut size = declared;
        let mut auto = current;
        for (axis, decl, cur) in [
            (Axes::X, &mut size.width, &mut auto.width),
            (Axes::Y, &mut size.height, &mut auto.height),
        ] {
            if previous.contains(axis) && !axes.contains(axis) {
                *decl = *cur;
            } else if !previous.contains(axis) && axes.contains(axis) {
                *cur = *decl;
            }
        }
        c.auto_size_axes = axes;
        c.auto_size_current = auto;
        c.transition = None;
        c.auto_size.invalidate();
        node.geometry.size = size;
        self.invalidate_with(id, Invalidation::DRAW_SIZE, InvalidationSource::Own, true);
        Ok(())
    }

    /// Animate auto-size changes over `duration` clock units. Zero applies them at once.
    pub fn set_auto_size_duration(&mut self, id: NodeId, duration: f64) -> Result<(), SceneError> {
        let duration = finite("auto-size duration", duration)?;
        if duration < 0.0 {
            return Err(SceneError::InvalidValue {
                what: "auto-size duration",
                value: duration,
            });
        }
        self.try_composite(id)?;
        let shown = self.effective_size(id);
        let c = self.try_composite_mut(id)?;
        let was_immediate = c.auto_size_is_immediate();
        c.auto_size_current = shown;
        c.auto_size_duration = duration;
        if c.auto_size_is_immediate() != was_immediate {
            self.invalidate_with(id, Invalidation::DRAW_SIZE, InvalidationSource::Own, true);
        }
        Ok(())
    }

    /// Easing of auto-size animations.
    pub fn set_auto_size_easing(&mut self, id: NodeId, easing: Easing) -> Result<(), SceneError> {
        self.try_composite_mut(id)?.auto_size_easing = easing;
        Ok(())
    }

    /// Set the inner spacing around children.
    pub fn set_padding(&mut self, id: NodeId, padding: MarginPadding) -> Result<(), SceneError> {
        if !padding.is_finite() {
            return Err(SceneError::InvalidValue {
                what: "padding",
                value: f64::NAN,
            });
        }
        self.mutate_composite(id, Invalidation::DRAW_SIZE, |c| {
            c.padding = padding;
            Ok(())
        })?;
        self.invalidate_auto_size(id);
        Ok(())
    }

    /// Clip children to the composite's bounds.
    ///
    /// Fails when disabling masking while a border or edge effect is set.
    pub fn set_masking(&mut self, id: NodeId, masking: bool) -> Result<(), SceneError> {
        self.mutate_composite(id, Invalidation::DRAW_NODE, |c| {
            if !masking && (c.border_thickness > 0.0 || c.edge_effect.is_some()) {
                return Err(SceneError::EffectWithoutMasking(id));
            }
            c.masking = masking;
            Ok(())
        })
    }

    /// Round the corners of the masked area.
    pub fn set_corner_radius(&mut self, id: NodeId, radius: f64) -> Result<(), SceneError> {
        let radius = non_negative("corner radius", radius)?;
        self.mutate_composite(id, Invalidation::DRAW_NODE, |c| {
            c.corner_radius = radius;
            Ok(())
        })
    }

    /// Draw a border inside the masked area. Requires masking for a non-zero thickness.
    pub fn set_border(&mut self, id: NodeId, thickness: f64, colour: Rgba) -> Result<(), SceneError> {
        let thickness = non_negative("border thickness", thickness)?;
        self.mutate_composite(id, Invalidation::DRAW_NODE, |c| {
            if thickness > 0.0 && !c.masking {
                return Err(SceneError::EffectWithoutMasking(id));
            }
            c.border_thickness = thickness;
            c.border_colour = colour;
            Ok(())
        })
    }

    /// Draw a shadow or glow around the masked area. Requires masking.
    pub fn set_edge_effect(
        &mut self,
        id: NodeId,
        effect: Option<EdgeEffect>,
    ) -> Result<(), SceneError> {
        if let Some(e) = effect {
            non_negative("edge effect radius", e.radius)?;
            finite("edge effect offset", e.offset.x)?;
            finite("edge effect offset", e.offset.y)?;
        }
        self.mutate_composite(id, Invalidation::DRAW_NODE, |c| {
            if effect.is_some() && !c.masking {
                return Err(SceneError::EffectWithoutMasking(id));
            }
            c.edge_effect = effect;
            Ok(())
        })
    }

    /// Set the coordinate extent children's relative sizes and positions refer to.
    pub fn set_relative_child_size(&mut self, id: NodeId, size: Vec2) -> Result<(), SceneError> {
        for v in [size.x, size.y] {
            if !v.is_finite() || v == 0.0 {
                return Err(SceneError::InvalidValue {
                    what: "relative child size",
                    value: v,
                });
            }
        }
        self.mutate_composite(id, Invalidation::DRAW_SIZE, |c| {
            c.relative_child_size = size;
            Ok(())
        })
    }

    /// Shift children's coordinate space, in relative units.
    pub fn set_relative_child_offset(
        &mut self,
        id: NodeId,
        offset: Vec2,
    ) -> Result<(), SceneError> {
        finite("relative child offset", offset.x)?;
        finite("relative child offset", offset.y)?;
        self.mutate_composite(id, Invalidation::DRAW_SIZE, |c| {
            c.relative_child_offset = offset;
            Ok(())
        })
    }

    /// Axes on which the composite sizes itself from its children.
    pub fn auto_size_axes(&self, id: NodeId) -> Option<Axes> {
        self.composite_opt(id).map(|c| c.auto_size_axes)
    }

    /// Inner spacing of a composite.
    pub fn padding(&self, id: NodeId) -> Option<MarginPadding> {
        self.composite_opt(id).map(|c| c.padding)
    }

    /// Whether a composite clips its children.
    pub fn masking(&self, id: NodeId) -> Option<bool> {
        self.composite_opt(id).map(|c| c.masking)
    }
}

fn non_negative(what: &'static str, value: f64) -> Result<f64, SceneError> {
    let value = finite(what, value)?;
    if value < 0.0 {
        return Err(SceneError::InvalidValue { what, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use kurbo::Size;

    use super::*;
    use crate::types::EdgeEffectKind;
    use crate::{NodeDesc, Tree};

    fn leaf_at_depth(tree: &mut Tree, parent: NodeId, depth: f32) -> NodeId {
        let id = tree.create(NodeDesc::leaf().with_depth(depth)).unwrap();
        tree.add_child(parent, id).unwrap();
        id
    }

    #[test]
    fn add_rejects_misuse() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = tree.create(NodeDesc::composite()).unwrap();
        let b = tree.create(NodeDesc::composite()).unwrap();
        let leaf = tree.create(NodeDesc::leaf()).unwrap();

        assert_eq!(tree.add_child(a, a), Err(SceneError::AddToSelf(a)));
        assert_eq!(tree.add_child(a, root), Err(SceneError::RootNotAttachable(root)));
        assert_eq!(tree.add_child(leaf, a), Err(SceneError::NotAComposite(leaf)));

        tree.add_child(a, b).unwrap();
        assert_eq!(tree.add_child(b, a), Err(SceneError::Cycle { child: a, parent: b }));
        assert_eq!(
            tree.add_child(root, b),
            Err(SceneError::AlreadyParented { child: b, parent: a }),
            "a node has at most one parent"
        );
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.children(root), &[] as &[NodeId]);
    }

    #[test]
    fn children_sorted_by_depth_then_insertion() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = leaf_at_depth(&mut tree, root, 0.0);
        let b = leaf_at_depth(&mut tree, root, 5.0);
        let c = leaf_at_depth(&mut tree, root, 0.0);
        let d = leaf_at_depth(&mut tree, root, -1.0);
        assert_eq!(tree.children(root), &[b, a, c, d]);
        assert_eq!(tree.alive_children(root), &[b, a, c, d]);
        assert!(tree.child_id(a) < tree.child_id(c));

        tree.set_depth(d, 10.0).unwrap();
        assert_eq!(tree.children(root), &[d, b, a, c]);
        assert_eq!(tree.alive_children(root), &[d, b, a, c], "alive view follows");
    }

    #[test]
    fn remove_is_benign_for_strangers() {
        let mut tree = Tree::default();
        let root = tree.root();
        let group = tree.create(NodeDesc::composite()).unwrap();
        let a = leaf_at_depth(&mut tree, root, 0.0);
        assert_eq!(tree.remove_child(group, a), Ok(false));
        assert_eq!(tree.remove_child(root, a), Ok(true));
        assert_eq!(tree.remove_child(root, a), Ok(false));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.child_id(a), Some(0));
        assert!(!tree.is_alive(a), "detached nodes are dead");

        tree.add_child(group, a).unwrap();
        assert_eq!(tree.parent(a), Some(group), "detached nodes can be re-added");
    }

    #[test]
    fn remove_where_and_clear() {
        let mut tree = Tree::default();
        let root = tree.root();
        let nodes: Vec<_> = (0..6)
            .map(|i| leaf_at_depth(&mut tree, root, i as f32))
            .collect();
        let removed = tree
            .remove_where(root, |t, id| t.depth(id).is_some_and(|d| d >= 3.0))
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(tree.children(root), &[nodes[2], nodes[1], nodes[0]]);
        assert!(tree.contains(nodes[5]), "remove_where only detaches");

        assert_eq!(tree.clear_children(root, false), Ok(3));
        assert!(tree.contains(nodes[0]), "detached without disposal");
        assert_eq!(tree.parent(nodes[0]), None);

        tree.add_children(root, [nodes[0], nodes[1]]).unwrap();
        assert_eq!(tree.clear_children(root, true), Ok(2));
        assert!(!tree.contains(nodes[0]));
        assert!(!tree.contains(nodes[1]));
    }

    #[test]
    fn clear_disposes_nested_children() {
        let mut tree = Tree::default();
        let root = tree.root();
        let group = tree.create(NodeDesc::composite()).unwrap();
        tree.add_child(root, group).unwrap();
        let inner = leaf_at_depth(&mut tree, group, 0.0);
        tree.clear_children(root, true).unwrap();
        assert!(!tree.contains(group));
        assert!(!tree.contains(inner), "disposal cascades");
    }

    #[test]
    fn border_and_effects_require_masking() {
        let mut tree = Tree::default();
        let c = tree.create(NodeDesc::composite()).unwrap();
        assert_eq!(
            tree.set_border(c, 2.0, Rgba::BLACK),
            Err(SceneError::EffectWithoutMasking(c))
        );
        let glow = EdgeEffect {
            kind: EdgeEffectKind::Glow,
            colour: Rgba::WHITE,
            radius: 4.0,
            offset: Vec2::ZERO,
            roundness: 0.0,
            hollow: false,
        };
        assert_eq!(
            tree.set_edge_effect(c, Some(glow)),
            Err(SceneError::EffectWithoutMasking(c))
        );

        tree.set_masking(c, true).unwrap();
        tree.set_border(c, 2.0, Rgba::BLACK).unwrap();
        tree.set_edge_effect(c, Some(glow)).unwrap();
        assert_eq!(
            tree.set_masking(c, false),
            Err(SceneError::EffectWithoutMasking(c))
        );
        assert_eq!(tree.masking(c), Some(true), "failed call leaves state unchanged");
        assert!(matches!(
            tree.set_corner_radius(c, -1.0),
            Err(SceneError::InvalidValue { .. })
        ));
    }

    #[test]
    fn leaving_auto_size_keeps_last_size() {
        let mut tree = Tree::default();
        let root = tree.root();
        let c = tree
            .create(NodeDesc::composite().with_auto_size(Axes::BOTH))
            .unwrap();
        tree.add_child(root, c).unwrap();
        let a = tree
            .create(NodeDesc::leaf().with_size(Size::new(30.0, 20.0)))
            .unwrap();
        tree.add_child(c, a).unwrap();
        tree.update();
        tree.set_auto_size_axes(c, Axes::Y).unwrap();
        assert_eq!(tree.size(c), Some(Size::new(30.0, 20.0)));
        tree.set_width(c, 50.0).unwrap();
        assert_eq!(tree.resolve_size(c), Ok(Size::new(50.0, 20.0)));
    }

    #[test]
    fn relative_child_size_scales_children() {
        let mut tree = Tree::default();
        let root = tree.root();
        let c = tree
            .create(NodeDesc::composite().with_size(Size::new(200.0, 100.0)))
            .unwrap();
        tree.add_child(root, c).unwrap();
        tree.set_relative_child_size(c, Vec2::new(10.0, 10.0)).unwrap();
        let half = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(5.0, 5.0))
                    .with_relative_size(Axes::BOTH),
            )
            .unwrap();
        tree.add_child(c, half).unwrap();
        assert_eq!(tree.draw_size(half), Some(Size::new(100.0, 50.0)));
        assert!(tree.set_relative_child_size(c, Vec2::new(0.0, 1.0)).is_err());
    }
}
