// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolved geometry: draw size, transforms, bounds, colour and auto-size.
//!
//! Every query reads through the node's [`LayoutCell`]s. A node's local matrix maps its
//! draw space into its parent's child space, which starts at the parent's padding; the
//! parent's child offset is applied when composing screen-space matrices. Bounding boxes
//! are therefore independent of the parent's padding, and auto-size reads them as is.

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::behavior::SizeProbe;
use crate::cache::{CacheState, LayoutCell};
use crate::draw_node::DrawInfo;
use crate::error::SceneError;
use crate::invalidation::{Invalidation, InvalidationSource};
use crate::node::{CompositeState, Node};
use crate::stats::StatisticsCounter;
use crate::transition::AutoSizeTransition;
use crate::tree::Tree;
use crate::types::{Axes, MarginPadding, NodeId, Rgba};

/// Whether a query reads and fills caches, or recomputes everything from scratch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum CacheMode {
    Use,
    /// Ignore and leave untouched every cache on the path.
    Bypass,
}

/// The node's layout rectangle in its own draw space: the draw rectangle grown by the
/// margin.
fn layout_rect(margin: MarginPadding, draw_size: Size) -> Rect {
    Rect::new(
        -margin.left,
        -margin.top,
        draw_size.width + margin.right,
        draw_size.height + margin.bottom,
    )
}

fn inverse_or_zero(r: f64) -> f64 {
    if r <= 0.0 { 0.0 } else { 1.0 / r }
}

/// Size a parent needs so that `bbox` fits when anchored at `anchor_fraction`.
///
/// `anchor` is the anchor position `bbox` was laid out against; it cancels out, so the
/// result does not depend on the parent's current size.
pub(crate) fn fit_size(anchor: Vec2, anchor_fraction: Vec2, bbox: Rect) -> Size {
    let ratio1 = Vec2::new(
        inverse_or_zero(anchor_fraction.x),
        inverse_or_zero(anchor_fraction.y),
    );
    let ratio2 = Vec2::new(
        inverse_or_zero(1.0 - anchor_fraction.x),
        inverse_or_zero(1.0 - anchor_fraction.y),
    );
    let top_left = anchor - Vec2::new(bbox.x0, bbox.y0);
    let bottom_right = anchor - Vec2::new(bbox.x1, bbox.y1);
    let axis = |tl: f64, br: f64, r1: f64, r2: f64| {
        (tl * r1).max(-tl * r2).max(br * r1).max(-br * r2)
    };
    Size::new(
        axis(top_left.x, bottom_right.x, ratio1.x, ratio2.x),
        axis(top_left.y, bottom_right.y, ratio1.y, ratio2.y),
    )
}

impl Tree {
    fn cached<T: Copy>(&self, mode: CacheMode, cell: &LayoutCell<T>, compute: impl FnOnce() -> T) -> T {
        match mode {
            CacheMode::Bypass => compute(),
            CacheMode::Use => {
                if let Some(value) = cell.get() {
                    return value;
                }
                self.record(StatisticsCounter::Refreshes, 1);
                cell.refresh(compute)
            }
        }
    }

    pub(crate) fn draw_size_in(&self, id: NodeId, mode: CacheMode) -> Size {
        let node = self.node(id);
        self.cached(mode, &node.caches.draw_size, || {
            let mut size = self.effective_size(id);
            let rel = node.geometry.relative_size_axes;
            if rel.is_empty() {
                return size;
            }
            let factor = node
                .parent
                .map_or(Vec2::new(1.0, 1.0), |p| self.relative_to_absolute_factor_in(p, mode));
            let margin = node.geometry.margin.total();
            if rel.contains(Axes::X) {
                size.width = (size.width * factor.x - margin.x).max(0.0);
            }
            if rel.contains(Axes::Y) {
                size.height = (size.height * factor.y - margin.y).max(0.0);
            }
            size
        })
    }

    pub(crate) fn child_size_in(&self, id: NodeId, mode: CacheMode) -> Size {
        let draw = self.draw_size_in(id, mode);
        let padding = self
            .node(id)
            .composite
            .as_deref()
            .map_or(Vec2::ZERO, |c| c.padding.total());
        Size::new(
            (draw.width - padding.x).max(0.0),
            (draw.height - padding.y).max(0.0),
        )
    }

    pub(crate) fn relative_to_absolute_factor_in(&self, id: NodeId, mode: CacheMode) -> Vec2 {
        let child = self.child_size_in(id, mode);
        let relative = self
            .node(id)
            .composite
            .as_deref()
            .map_or(Vec2::new(1.0, 1.0), |c| c.relative_child_size);
        Vec2::new(child.width / relative.x, child.height / relative.y)
    }

    pub(crate) fn child_offset_in(&self, id: NodeId, mode: CacheMode) -> Vec2 {
        let Some(c) = self.node(id).composite.as_deref() else {
            return Vec2::ZERO;
        };
        let factor = self.relative_to_absolute_factor_in(id, mode);
        c.padding.top_left()
            - Vec2::new(
                c.relative_child_offset.x * factor.x,
                c.relative_child_offset.y * factor.y,
            )
    }

    /// Parent child size and relative factor as seen by `node`.
    fn parent_space(&self, node: &Node, mode: CacheMode) -> (Size, Vec2) {
        match node.parent {
            Some(p) => (
                self.child_size_in(p, mode),
                self.relative_to_absolute_factor_in(p, mode),
            ),
            None => (Size::ZERO, Vec2::new(1.0, 1.0)),
        }
    }

    pub(crate) fn local_matrix_in(&self, id: NodeId, mode: CacheMode) -> Affine {
        let node = self.node(id);
        self.cached(mode, &node.caches.local_matrix, || {
            let g = &node.geometry;
            let (parent_size, factor) = self.parent_space(node, mode);
            let mut position = g.position;
            if g.relative_position_axes.contains(Axes::X) {
                position.x *= factor.x;
            }
            if g.relative_position_axes.contains(Axes::Y) {
                position.y *= factor.y;
            }
            let anchor = g.anchor.position_in(parent_size);
            let draw_size = self.draw_size_in(id, mode);
            let margin = g.margin.total();
            let layout_size = Size::new(draw_size.width + margin.x, draw_size.height + margin.y);
            let origin = g.origin.position_in(layout_size) - g.margin.top_left();
            Affine::translate(position + anchor)
                * Affine::rotate(g.rotation)
                * Affine::skew(g.shear.x, g.shear.y)
                * Affine::scale_non_uniform(g.scale.x, g.scale.y)
                * Affine::translate(-origin)
        })
    }

    pub(crate) fn draw_matrix_in(&self, id: NodeId, mode: CacheMode) -> Affine {
        let node = self.node(id);
        self.cached(mode, &node.caches.draw_matrix, || {
            let local = self.local_matrix_in(id, mode);
            match node.parent {
                Some(p) => {
                    self.draw_matrix_in(p, mode)
                        * Affine::translate(self.child_offset_in(p, mode))
                        * local
                }
                None => local,
            }
        })
    }

    pub(crate) fn bounding_box_in(&self, id: NodeId, mode: CacheMode) -> Rect {
        let node = self.node(id);
        self.cached(mode, &node.caches.bounding_box, || {
            let draw_size = self.draw_size_in(id, mode);
            self.local_matrix_in(id, mode)
                .transform_rect_bbox(layout_rect(node.geometry.margin, draw_size))
        })
    }

    pub(crate) fn required_parent_size_to_fit_in(&self, id: NodeId, mode: CacheMode) -> Size {
        let node = self.node(id);
        self.cached(mode, &node.caches.required_parent_size_to_fit, || {
            let (parent_size, _) = self.parent_space(node, mode);
            let anchor = node.geometry.anchor.position_in(parent_size);
            let computed = fit_size(
                anchor,
                node.geometry.anchor.fraction(),
                self.bounding_box_in(id, mode),
            );
            match node.behavior.as_deref() {
                Some(b) => b.required_parent_size_to_fit(&SizeProbe::new(self, id), computed),
                None => computed,
            }
        })
    }

    pub(crate) fn screen_space_aabb_in(&self, id: NodeId, mode: CacheMode) -> Rect {
        let node = self.node(id);
        self.cached(mode, &node.caches.screen_space_aabb, || {
            let draw_size = self.draw_size_in(id, mode);
            self.draw_matrix_in(id, mode)
                .transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, draw_size))
        })
    }

    pub(crate) fn draw_colour_in(&self, id: NodeId, mode: CacheMode) -> Rgba {
        let node = self.node(id);
        self.cached(mode, &node.caches.draw_colour, || {
            let own = node.colour.with_alpha_multiplied(node.alpha);
            match node.parent {
                Some(p) => self.draw_colour_in(p, mode).multiply(own),
                None => own,
            }
        })
    }

    // --- public queries ---

    /// The declared size; auto-sized axes report the currently applied auto-size.
    ///
    /// Without an auto-size animation, a stale auto-size is resolved by the read itself.
    pub fn size(&self, id: NodeId) -> Option<Size> {
        self.node_opt(id)?;
        Some(self.effective_size(id))
    }

    /// Size after applying relative axes and margins.
    pub fn draw_size(&self, id: NodeId) -> Option<Size> {
        self.node_opt(id)?;
        Some(self.draw_size_in(id, CacheMode::Use))
    }

    /// Area available to children: the draw size minus padding.
    pub fn child_size(&self, id: NodeId) -> Option<Size> {
        self.node_opt(id)?;
        Some(self.child_size_in(id, CacheMode::Use))
    }

    /// Offset of the children's coordinate space inside the node.
    pub fn child_offset(&self, id: NodeId) -> Option<Vec2> {
        self.node_opt(id)?;
        Some(self.child_offset_in(id, CacheMode::Use))
    }

    /// Multiplier turning children's relative sizes and positions into absolute ones.
    pub fn relative_to_absolute_factor(&self, id: NodeId) -> Option<Vec2> {
        self.node_opt(id)?;
        Some(self.relative_to_absolute_factor_in(id, CacheMode::Use))
    }

    /// Transform from the node's draw space into its parent's child space.
    pub fn local_matrix(&self, id: NodeId) -> Option<Affine> {
        self.node_opt(id)?;
        Some(self.local_matrix_in(id, CacheMode::Use))
    }

    /// Screen-space transform and colour.
    pub fn draw_info(&self, id: NodeId) -> Option<DrawInfo> {
        self.node_opt(id)?;
        Some(DrawInfo {
            matrix: self.draw_matrix_in(id, CacheMode::Use),
            colour: self.draw_colour_in(id, CacheMode::Use),
        })
    }

    /// Bounds of the layout rectangle in the parent's child space.
    pub fn bounding_box(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id)?;
        Some(self.bounding_box_in(id, CacheMode::Use))
    }

    /// Size the parent's child area needs so the node fits at its anchor.
    pub fn required_parent_size_to_fit(&self, id: NodeId) -> Option<Size> {
        self.node_opt(id)?;
        Some(self.required_parent_size_to_fit_in(id, CacheMode::Use))
    }

    /// Axis-aligned screen-space bounds of the draw rectangle.
    pub fn screen_space_aabb(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id)?;
        Some(self.screen_space_aabb_in(id, CacheMode::Use))
    }

    /// Colour with every ancestor's colour and alpha multiplied in.
    pub fn draw_colour(&self, id: NodeId) -> Option<Rgba> {
        self.node_opt(id)?;
        Some(self.draw_colour_in(id, CacheMode::Use))
    }

    /// State of a composite's auto-size cache.
    pub fn auto_size_state(&self, id: NodeId) -> Option<CacheState> {
        self.composite_opt(id).map(|c| c.auto_size.state())
    }

    /// Resolve pending auto-sizes in the subtree of `id`, children first, and return the
    /// resulting size.
    ///
    /// The update pass does this for every alive node; this is for reading a settled size
    /// between updates.
    pub fn resolve_size(&mut self, id: NodeId) -> Result<Size, SceneError> {
        self.try_node(id)?;
        self.resolve_auto_sizes(id);
        Ok(self.effective_size(id))
    }

    fn resolve_auto_sizes(&mut self, id: NodeId) {
        for child in self.alive_children(id).to_vec() {
            self.resolve_auto_sizes(child);
        }
        self.update_auto_size(id);
    }

    // --- auto-size ---

    /// The size a node declares, with auto-sized axes replaced by their applied value.
    pub(crate) fn effective_size(&self, id: NodeId) -> Size {
        let node = self.node(id);
        let mut size = node.geometry.size;
        let Some(c) = node.composite.as_deref() else {
            return size;
        };
        if c.auto_size_axes.is_empty() {
            return size;
        }
        let auto = self.applied_auto_size(id, c);
        if c.auto_size_axes.contains(Axes::X) {
            size.width = auto.width;
        }
        if c.auto_size_axes.contains(Axes::Y) {
            size.height = auto.height;
        }
        size
    }

    /// The auto-size in effect: the target itself when changes apply at once, the
    /// animated value otherwise.
    fn applied_auto_size(&self, id: NodeId, c: &CompositeState) -> Size {
        if c.auto_size_is_immediate() {
            self.auto_size_target(id, c)
        } else {
            c.auto_size_current
        }
    }

    /// The size the children call for, recomputed if stale.
    ///
    /// Reads made while the computation runs see the previous target.
    fn auto_size_target(&self, id: NodeId, c: &CompositeState) -> Size {
        if let Some(size) = c.auto_size.get() {
            return size;
        }
        if c.auto_size.is_computing() {
            return c.auto_size_current;
        }
        self.record(StatisticsCounter::Refreshes, 1);
        c.auto_size.begin_compute();
        let target = self.compute_auto_size(id);
        c.auto_size.finish(target);
        target
    }

    /// Target size from the alive, present children.
    ///
    /// An auto-sized axis no child contributes to keeps the declared size.
    pub(crate) fn compute_auto_size(&self, id: NodeId) -> Size {
        let node = self.node(id);
        let Some(c) = node.composite.as_deref() else {
            return node.geometry.size;
        };
        let mut max = Vec2::ZERO;
        let (mut seen_x, mut seen_y) = (false, false);
        for &child in &c.alive {
            let cn = self.node(child);
            if !cn.is_present() {
                continue;
            }
            let fit = self.required_parent_size_to_fit_in(child, CacheMode::Use);
            let bypass = cn.geometry.bypass_auto_size_axes;
            if !bypass.contains(Axes::X) {
                max.x = max.x.max(fit.width);
                seen_x = true;
            }
            if !bypass.contains(Axes::Y) {
                max.y = max.y.max(fit.height);
                seen_y = true;
            }
        }
        let padding = c.padding.total();
        let declared = node.geometry.size;
        Size::new(
            if seen_x { max.x + padding.x } else { declared.width },
            if seen_y { max.y + padding.y } else { declared.height },
        )
    }

    /// Recompute a stale auto-size, retarget towards it and step any running transition.
    pub(crate) fn update_auto_size(&mut self, id: NodeId) {
        let Some(c) = self.composite_opt(id) else {
            return;
        };
        if c.auto_size_axes.is_empty() {
            return;
        }
        let time = self.time_of(id);
        let target = self.auto_size_target(id, c);
        self.retarget_auto_size(id, target, time);
        self.step_auto_size(id, time);
    }

    fn retarget_auto_size(&mut self, id: NodeId, target: Size, time: f64) {
        let Ok(c) = self.try_composite_mut(id) else {
            return;
        };
        let axes = c.auto_size_axes;
        let current = c.auto_size_current;
        let target = Size::new(
            if axes.contains(Axes::X) { target.width } else { current.width },
            if axes.contains(Axes::Y) { target.height } else { current.height },
        );
        if c.transition.is_some_and(|t| t.to == target) {
            return;
        }
        if c.auto_size_duration <= 0.0 {
            if c.transition.take().is_some() {
                self.apply_auto_size(id, target);
            } else {
                // Reads already resolve to the target; only the applied value lags.
                c.auto_size_current = target;
            }
        } else if target != current {
            c.transition = Some(AutoSizeTransition {
                from: current,
                to: target,
                start: time,
                duration: c.auto_size_duration,
                easing: c.auto_size_easing,
            });
        } else {
            c.transition = None;
        }
    }

    fn step_auto_size(&mut self, id: NodeId, time: f64) {
        let Ok(c) = self.try_composite_mut(id) else {
            return;
        };
        let Some(t) = c.transition else {
            return;
        };
        if t.is_finished(time) {
            c.transition = None;
        }
        self.apply_auto_size(id, t.value_at(time));
    }

    /// The only writer of an auto-sized axis.
    fn apply_auto_size(&mut self, id: NodeId, size: Size) {
        let Ok(c) = self.try_composite_mut(id) else {
            return;
        };
        if c.auto_size_current == size {
            return;
        }
        c.auto_size_current = size;
        self.invalidate_with(id, Invalidation::DRAW_SIZE, InvalidationSource::Own, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::types::Anchor;
    use crate::{NodeDesc, TreeOptions};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn leaf(tree: &mut Tree, parent: NodeId, size: Size) -> NodeId {
        let id = tree.create(NodeDesc::leaf().with_size(size)).unwrap();
        tree.add_child(parent, id).unwrap();
        id
    }

    #[test]
    fn fit_size_handles_anchors() {
        let bbox = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(fit_size(Vec2::ZERO, Vec2::ZERO, bbox), Size::new(100.0, 50.0));

        let centred = Rect::new(-50.0, -25.0, 50.0, 25.0);
        assert_eq!(
            fit_size(Vec2::ZERO, Vec2::new(0.5, 0.5), centred),
            Size::new(100.0, 50.0),
            "a centred child needs twice its half extent"
        );

        let right = Rect::new(-100.0, 0.0, 0.0, 50.0);
        assert_eq!(
            fit_size(Vec2::ZERO, Vec2::new(1.0, 0.0), right),
            Size::new(100.0, 50.0)
        );
    }

    #[test]
    fn relative_size_follows_parent_child_area() {
        let mut tree = Tree::new(TreeOptions {
            root_size: Size::new(200.0, 100.0),
            ..TreeOptions::default()
        });
        let root = tree.root();
        tree.set_padding(root, MarginPadding::uniform(10.0)).unwrap();
        let fill = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(1.0, 0.5))
                    .with_relative_size(Axes::BOTH),
            )
            .unwrap();
        tree.add_child(root, fill).unwrap();
        assert_eq!(tree.draw_size(fill), Some(Size::new(180.0, 40.0)));
        assert_eq!(
            tree.screen_space_aabb(fill),
            Some(Rect::new(10.0, 10.0, 190.0, 50.0)),
            "children start at the padding"
        );

        tree.set_size(root, Size::new(400.0, 100.0)).unwrap();
        assert_eq!(
            tree.draw_size(fill),
            Some(Size::new(380.0, 40.0)),
            "parent resize reaches relatively sized children"
        );
    }

    #[test]
    fn anchored_children_move_with_parent() {
        let mut tree = Tree::new(TreeOptions {
            root_size: Size::new(200.0, 100.0),
            ..TreeOptions::default()
        });
        let root = tree.root();
        let c = tree
            .create(NodeDesc {
                anchor: Anchor::CENTRE,
                origin: Anchor::CENTRE,
                ..NodeDesc::leaf().with_size(Size::new(20.0, 10.0))
            })
            .unwrap();
        tree.add_child(root, c).unwrap();
        assert_eq!(
            tree.screen_space_aabb(c),
            Some(Rect::new(90.0, 45.0, 110.0, 55.0))
        );
        tree.set_size(root, Size::new(400.0, 100.0)).unwrap();
        assert_eq!(
            tree.screen_space_aabb(c),
            Some(Rect::new(190.0, 45.0, 210.0, 55.0))
        );
    }

    #[test]
    fn colour_multiplies_down_the_tree() {
        let mut tree = Tree::default();
        let root = tree.root();
        let group = tree.create(NodeDesc::composite()).unwrap();
        tree.add_child(root, group).unwrap();
        let c = leaf(&mut tree, group, Size::new(1.0, 1.0));
        tree.set_alpha(group, 0.5).unwrap();
        tree.set_colour(c, Rgba::new(1.0, 0.5, 1.0, 1.0)).unwrap();
        assert_eq!(tree.draw_colour(c), Some(Rgba::new(1.0, 0.5, 1.0, 0.5)));
        tree.set_colour(group, Rgba::new(0.5, 1.0, 1.0, 1.0)).unwrap();
        assert_eq!(tree.draw_colour(c), Some(Rgba::new(0.5, 0.5, 1.0, 0.5)));
    }

    #[test]
    fn cached_results_match_uncached() {
        let mut tree = Tree::default();
        let root = tree.root();
        let group = tree
            .create(NodeDesc::composite().with_size(Size::new(300.0, 300.0)))
            .unwrap();
        tree.add_child(root, group).unwrap();
        let c = leaf(&mut tree, group, Size::new(40.0, 20.0));
        let _ = tree.screen_space_aabb(c);

        tree.set_rotation(group, 0.5).unwrap();
        tree.set_position(group, Vec2::new(7.0, 3.0)).unwrap();
        tree.set_padding(group, MarginPadding::uniform(4.0)).unwrap();
        tree.set_scale(c, Vec2::new(2.0, 1.0)).unwrap();

        for id in [group, c] {
            assert_eq!(
                tree.screen_space_aabb_in(id, CacheMode::Use),
                tree.screen_space_aabb_in(id, CacheMode::Bypass),
                "cache for {id:?} is stale"
            );
            assert_eq!(
                tree.required_parent_size_to_fit_in(id, CacheMode::Use),
                tree.required_parent_size_to_fit_in(id, CacheMode::Bypass),
            );
        }
    }

    #[test]
    fn auto_size_takes_max_over_children() {
        let mut tree = Tree::default();
        let root = tree.root();
        let parent = tree
            .create(NodeDesc::composite().with_auto_size(Axes::BOTH))
            .unwrap();
        tree.add_child(root, parent).unwrap();
        let _a = leaf(&mut tree, parent, Size::new(100.0, 50.0));
        let b = leaf(&mut tree, parent, Size::new(60.0, 120.0));
        tree.update();
        assert_eq!(tree.size(parent), Some(Size::new(100.0, 120.0)));
        assert_eq!(tree.auto_size_state(parent), Some(CacheState::Valid));

        tree.set_bypass_auto_size_axes(b, Axes::Y).unwrap();
        assert_eq!(tree.resolve_size(parent), Ok(Size::new(100.0, 50.0)));

        tree.set_padding(parent, MarginPadding::uniform(5.0)).unwrap();
        assert_eq!(tree.resolve_size(parent), Ok(Size::new(110.0, 60.0)));
    }

    #[test]
    fn auto_size_reads_are_current_between_updates() {
        let mut tree = Tree::default();
        let root = tree.root();
        let parent = tree
            .create(NodeDesc::composite().with_auto_size(Axes::BOTH))
            .unwrap();
        tree.add_child(root, parent).unwrap();
        let _a = leaf(&mut tree, parent, Size::new(100.0, 50.0));
        let b = leaf(&mut tree, parent, Size::new(60.0, 120.0));
        assert_eq!(
            tree.size(parent),
            Some(Size::new(100.0, 120.0)),
            "the first read resolves the auto-size"
        );

        tree.update();
        assert_eq!(tree.draw_size(parent), Some(Size::new(100.0, 120.0)));
        let _ = tree.bounding_box(parent);

        tree.remove_child(parent, b).unwrap();
        assert_eq!(
            tree.size(parent),
            Some(Size::new(100.0, 50.0)),
            "a removed child stops counting before the next update"
        );
        assert_eq!(
            tree.draw_size(parent),
            Some(Size::new(100.0, 50.0)),
            "cached draw size follows the auto-size"
        );
        assert_eq!(
            tree.bounding_box(parent),
            Some(Rect::new(0.0, 0.0, 100.0, 50.0)),
            "and so do the bounds"
        );

        tree.update();
        assert_eq!(
            tree.size(parent),
            Some(Size::new(100.0, 50.0)),
            "the update pass agrees with the read"
        );
    }

    #[test]
    fn auto_size_animates_over_duration() {
        let mut tree = Tree::default();
        let root = tree.root();
        let parent = tree
            .create(NodeDesc::composite().with_auto_size(Axes::X))
            .unwrap();
        tree.add_child(root, parent).unwrap();
        tree.set_auto_size_duration(parent, 100.0).unwrap();
        let _a = leaf(&mut tree, parent, Size::new(200.0, 10.0));

        tree.update();
        assert_eq!(tree.size(parent).unwrap().width, 0.0, "transition starts at the old size");
        tree.advance_clock(tree.root_clock(), 50.0).unwrap();
        tree.update();
        assert_eq!(tree.size(parent).unwrap().width, 100.0);
        tree.advance_clock(tree.root_clock(), 50.0).unwrap();
        tree.update();
        assert_eq!(tree.size(parent).unwrap().width, 200.0);
    }

    struct Probe {
        parent: NodeId,
        saw_computing: Arc<AtomicBool>,
    }

    impl Behavior for Probe {
        fn required_parent_size_to_fit(&self, probe: &SizeProbe<'_>, computed: Size) -> Size {
            let tree = probe.tree();
            if tree.auto_size_state(self.parent) == Some(CacheState::Computing) {
                self.saw_computing.store(true, Ordering::Relaxed);
                assert_eq!(
                    probe.parent_size(),
                    Some(Size::new(100.0, 50.0)),
                    "reads during the computation see the previous size"
                );
            }
            computed
        }
    }

    #[test]
    fn reentrant_size_reads_see_previous_value() {
        let mut tree = Tree::default();
        let root = tree.root();
        let parent = tree
            .create(NodeDesc::composite().with_auto_size(Axes::BOTH))
            .unwrap();
        tree.add_child(root, parent).unwrap();
        let _a = leaf(&mut tree, parent, Size::new(100.0, 50.0));
        tree.update();
        assert_eq!(tree.size(parent), Some(Size::new(100.0, 50.0)));

        let saw_computing = Arc::new(AtomicBool::new(false));
        let probe = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(10.0, 80.0))
                    .with_behavior(Probe {
                        parent,
                        saw_computing: Arc::clone(&saw_computing),
                    }),
            )
            .unwrap();
        tree.add_child(parent, probe).unwrap();
        tree.update();
        assert!(saw_computing.load(Ordering::Relaxed), "probe ran during auto-size");
        assert_eq!(tree.size(parent), Some(Size::new(100.0, 80.0)));
    }
}
