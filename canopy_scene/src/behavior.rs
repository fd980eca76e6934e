// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node customization hooks.

use canopy_lifetime::{CrossingDirection, LifetimeBoundary};
use kurbo::{Point, Rect, Size};

use crate::draw_node::DrawCommand;
use crate::load::LoadContext;
use crate::tree::Tree;
use crate::types::{NodeId, Rgba};

/// Custom behavior attached to a node.
///
/// Every hook has a default, so an implementation only overrides what it needs.
/// A node without a behavior acts like one that keeps every default.
///
/// Hooks that receive `&mut Tree` run while the behavior is detached from its node, so
/// they may freely mutate the tree, including the node itself.
pub trait Behavior: Send + 'static {
    /// Heavyweight initialization. May run on a loader thread.
    fn load(&mut self, _ctx: &mut LoadContext<'_>) {}

    /// Called once, on the first update after the node became ready.
    fn load_complete(&mut self, _node: NodeId) {}

    /// Per-frame logic, run before the node's children update.
    fn update(&mut self, _tree: &mut Tree, _node: NodeId) {}

    /// Emit draw commands in the node's local draw space.
    ///
    /// The default fills the node's draw rectangle with its resolved colour. Commands
    /// are only regenerated when the node is invalidated; call
    /// [`Tree::invalidate`] with [`Invalidation::DRAW_NODE`](crate::Invalidation::DRAW_NODE)
    /// after changing state read here.
    fn draw(&self, ctx: &DrawContext, out: &mut Vec<DrawCommand>) {
        out.push(DrawCommand::FillRect {
            rect: Rect::from_origin_size(Point::ORIGIN, ctx.draw_size),
            colour: Rgba::WHITE,
        });
    }

    /// Adjust the size a parent needs to fit this node.
    ///
    /// `probe` gives read access to the tree. Reading the size of an ancestor that is
    /// resolving its auto-size returns its previous size.
    fn required_parent_size_to_fit(&self, _probe: &SizeProbe<'_>, computed: Size) -> Size {
        computed
    }

    /// A child of this lifetime-managed composite crossed a lifetime boundary.
    ///
    /// Changes made here, such as re-timing or removing children, are picked up within
    /// the same life-cycle scan.
    fn lifetime_boundary_crossed(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _child: NodeId,
        _boundary: LifetimeBoundary,
        _direction: CrossingDirection,
    ) {
    }
}

impl Tree {
    /// Run `f` with the behavior of `id` detached from its node.
    ///
    /// The behavior is put back afterwards unless `f` installed a new one or disposed the
    /// node.
    pub(crate) fn with_behavior(&mut self, id: NodeId, f: impl FnOnce(&mut dyn Behavior, &mut Self)) {
        let Some(mut behavior) = self.node_opt_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        f(behavior.as_mut(), self);
        if let Some(node) = self.node_opt_mut(id) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }
}

/// A behavior that draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Empty;

impl Behavior for Empty {
    fn draw(&self, _ctx: &DrawContext, _out: &mut Vec<DrawCommand>) {}
}

/// A behavior that fills the node with a fixed colour.
///
/// The resolved node colour still applies on top.
#[derive(Clone, Copy, Debug)]
pub struct Fill(pub Rgba);

impl Behavior for Fill {
    fn draw(&self, ctx: &DrawContext, out: &mut Vec<DrawCommand>) {
        out.push(DrawCommand::FillRect {
            rect: Rect::from_origin_size(Point::ORIGIN, ctx.draw_size),
            colour: self.0,
        });
    }
}

/// Resolved state handed to [`Behavior::draw`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawContext {
    /// The node being drawn.
    pub node: NodeId,
    /// Its resolved draw size.
    pub draw_size: Size,
    /// Its resolved colour.
    pub colour: Rgba,
}

/// Read access to the tree while a size is being resolved.
#[derive(Copy, Clone, Debug)]
pub struct SizeProbe<'a> {
    tree: &'a Tree,
    node: NodeId,
}

impl<'a> SizeProbe<'a> {
    pub(crate) fn new(tree: &'a Tree, node: NodeId) -> Self {
        Self { tree, node }
    }

    /// The node whose size is being resolved.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The tree.
    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    /// The node's parent.
    pub fn parent(&self) -> Option<NodeId> {
        self.tree.parent(self.node)
    }

    /// The parent's size, which is its previous size if it is resolving its auto-size.
    pub fn parent_size(&self) -> Option<Size> {
        self.tree.size(self.parent()?)
    }
}
