// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable draw snapshots and their generation.
//!
//! Each frame the update thread walks the alive tree and produces a tree of
//! [`DrawNode`]s for one [`TreeIndex`] slot. Snapshots copy every value the draw thread
//! needs, so mutating the tree afterwards never changes a snapshot already handed out.
//! Unchanged subtrees reuse the snapshot generated for the same slot earlier.

use std::sync::Arc;

use kurbo::{Affine, Point, Rect, Size};

use crate::behavior::{Behavior, DrawContext, Fill};
use crate::buffered::BufferedDrawNode;
use crate::layout::CacheMode;
use crate::node::CompositeState;
use crate::stats::StatisticsCounter;
use crate::tree::Tree;
use crate::types::{EdgeEffect, NodeId, Rgba};

/// Number of snapshot slots each node keeps.
///
/// One slot is being drawn, one holds the latest finished snapshot and one is being
/// written, so the update thread never overwrites what the draw thread reads.
pub const DRAW_NODE_SLOTS: usize = 3;

/// Which snapshot slot a generation pass writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeIndex(usize);

impl TreeIndex {
    /// Every slot, in order.
    pub const ALL: [Self; DRAW_NODE_SLOTS] = [Self(0), Self(1), Self(2)];

    /// The slot `index`, if it exists.
    pub const fn new(index: usize) -> Option<Self> {
        if index < DRAW_NODE_SLOTS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// The slot number.
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Screen-space transform and colour of a node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawInfo {
    /// Maps the node's draw space to screen space.
    pub matrix: Affine,
    /// Colour with every ancestor's colour and alpha multiplied in.
    pub colour: Rgba,
}

/// Opaque handle of a texture owned by the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// A primitive in a node's local draw space.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// A solid rectangle, tinted by the node's draw colour.
    FillRect {
        /// Area in draw space.
        rect: Rect,
        /// Colour before tinting.
        colour: Rgba,
    },
    /// A textured rectangle, tinted by the node's draw colour.
    Texture {
        /// The texture.
        texture: TextureId,
        /// Area in draw space.
        rect: Rect,
        /// Colour before tinting.
        colour: Rgba,
    },
}

/// Clipping state a masking composite pushes for its children.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaskingInfo {
    /// Screen-space bounds of the masked area.
    pub screen_space_aabb: Rect,
    /// The masked area in the composite's draw space.
    pub masking_rect: Rect,
    /// Maps screen space into the composite's draw space.
    pub to_masking_space: Affine,
    /// Corner rounding.
    pub corner_radius: f64,
    /// Border thickness, drawn inside the masked area.
    pub border_thickness: f64,
    /// Border colour.
    pub border_colour: Rgba,
    /// Width of the anti-aliased edge.
    pub blend_range: f64,
}

/// A frozen view of one node, shared with the draw thread.
#[derive(Debug)]
pub struct DrawNode {
    /// The node this was generated from.
    pub source: NodeId,
    /// The node's invalidation id at generation time.
    pub invalidation_id: u64,
    /// Transform and colour.
    pub draw_info: DrawInfo,
    /// Draw size.
    pub draw_size: Size,
    /// Screen-space bounds.
    pub screen_space_aabb: Rect,
    /// What to draw.
    pub kind: DrawNodeKind,
}

/// Payload of a [`DrawNode`].
#[derive(Debug)]
pub enum DrawNodeKind {
    /// A leaf and its commands.
    Leaf {
        /// Commands in the leaf's draw space.
        commands: Vec<DrawCommand>,
    },
    /// A composite and its visible children, in draw order.
    ///
    /// Children of flattened composites appear here directly.
    Composite {
        /// Clipping applied to the children.
        masking: Option<MaskingInfo>,
        /// Shadow or glow drawn before the children.
        edge_effect: Option<EdgeEffect>,
        /// Child snapshots.
        children: Vec<Arc<DrawNode>>,
    },
    /// A composite rendered through offscreen buffers.
    Buffered(BufferedDrawNode),
}

impl DrawNode {
    /// Child snapshots; empty for leaves.
    pub fn children(&self) -> &[Arc<Self>] {
        match &self.kind {
            DrawNodeKind::Leaf { .. } => &[],
            DrawNodeKind::Composite { children, .. } => children,
            DrawNodeKind::Buffered(b) => &b.children,
        }
    }

    /// Number of snapshots in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    /// Depth-first search for the snapshot of `id`.
    pub fn find(&self, id: NodeId) -> Option<&Self> {
        if self.source == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }
}

fn same_children(a: &[Arc<DrawNode>], b: &[Arc<DrawNode>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

fn masking_info(c: &CompositeState, info: &DrawInfo, draw_size: Size, aabb: Rect) -> MaskingInfo {
    let m = info.matrix;
    MaskingInfo {
        screen_space_aabb: aabb,
        masking_rect: Rect::from_origin_size(Point::ORIGIN, draw_size),
        to_masking_space: if m.determinant() == 0.0 {
            Affine::IDENTITY
        } else {
            m.inverse()
        },
        corner_radius: c.corner_radius,
        border_thickness: c.border_thickness,
        border_colour: c.border_colour,
        blend_range: 1.0,
    }
}

impl Tree {
    /// Generate the snapshot tree for slot `index`, starting at the root.
    ///
    /// Returns `None` when nothing is visible. Children outside the root's bounds, or
    /// outside the bounds of a masking ancestor, are left out and marked masked away.
    pub fn generate_draw_nodes(&mut self, index: TreeIndex) -> Option<Arc<DrawNode>> {
        let root = self.root();
        let clip = self.screen_space_aabb_in(root, CacheMode::Use);
        self.generate_node(root, index, clip)
    }

    /// The snapshot last generated for `id` in slot `index`.
    pub fn draw_node(&self, id: NodeId, index: TreeIndex) -> Option<Arc<DrawNode>> {
        self.node_opt(id)?.draw_nodes[index.get()].clone()
    }

    /// Whether `id` was skipped by the last generation pass for lying outside the clip
    /// bounds.
    pub fn is_masked_away(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.masked_away)
    }

    fn generate_node(&mut self, id: NodeId, index: TreeIndex, clip: Rect) -> Option<Arc<DrawNode>> {
        let node = self.node(id);
        if !node.is_present() {
            return None;
        }
        let draw_info = DrawInfo {
            matrix: self.draw_matrix_in(id, CacheMode::Use),
            colour: self.draw_colour_in(id, CacheMode::Use),
        };
        let draw_size = self.draw_size_in(id, CacheMode::Use);
        let aabb = self.screen_space_aabb_in(id, CacheMode::Use);
        let invalidation_id = node.invalidation_id;
        let previous = node.draw_nodes[index.get()]
            .clone()
            .filter(|p| p.invalidation_id == invalidation_id);

        let kind = match node.composite.as_deref() {
            None => {
                if let Some(previous) = previous {
                    return Some(self.reuse_draw_node(id, previous));
                }
                let ctx = DrawContext {
                    node: id,
                    draw_size,
                    colour: draw_info.colour,
                };
                let mut commands = Vec::new();
                match node.behavior.as_deref() {
                    Some(behavior) => behavior.draw(&ctx, &mut commands),
                    None => Fill(Rgba::WHITE).draw(&ctx, &mut commands),
                }
                DrawNodeKind::Leaf { commands }
            }
            Some(c) => {
                let masking = c.masking.then(|| masking_info(c, &draw_info, draw_size, aabb));
                let edge_effect = c.edge_effect;
                let buffered = c.buffered.is_some();
                let child_clip = if masking.is_some() || buffered {
                    clip.intersect(aabb)
                } else {
                    clip
                };
                let mut children = Vec::new();
                self.collect_children(id, index, child_clip, &mut children);
                if let Some(previous) = previous {
                    if same_children(previous.children(), &children) {
                        return Some(self.reuse_draw_node(id, previous));
                    }
                }
                if buffered {
                    DrawNodeKind::Buffered(self.buffered_draw_node(id, children, aabb)?)
                } else if children.is_empty() && masking.is_none() && edge_effect.is_none() {
                    self.store_draw_node(id, index, invalidation_id, None);
                    return None;
                } else {
                    DrawNodeKind::Composite {
                        masking,
                        edge_effect,
                        children,
                    }
                }
            }
        };

        let snapshot = Arc::new(DrawNode {
            source: id,
            invalidation_id,
            draw_info,
            draw_size,
            screen_space_aabb: aabb,
            kind,
        });
        self.record(StatisticsCounter::DrawNodesCreated, 1);
        self.store_draw_node(id, index, invalidation_id, Some(Arc::clone(&snapshot)));
        Some(snapshot)
    }

    /// Append snapshots of the visible alive children of `id`, splicing in the children
    /// of composites that need no snapshot of their own.
    fn collect_children(
        &mut self,
        id: NodeId,
        index: TreeIndex,
        clip: Rect,
        out: &mut Vec<Arc<DrawNode>>,
    ) {
        for child in self.alive_children(id).to_vec() {
            let node = self.node(child);
            if !node.is_present() {
                continue;
            }
            // Pure grouping composites are never culled by their own bounds.
            let flattenable = node
                .composite
                .as_deref()
                .is_some_and(CompositeState::can_be_flattened);
            if flattenable && self.flatten_composites {
                self.node_mut(child).masked_away = false;
                self.collect_children(child, index, clip, out);
                continue;
            }
            let visible =
                flattenable || overlaps(self.screen_space_aabb_in(child, CacheMode::Use), clip);
            self.node_mut(child).masked_away = !visible;
            if !visible {
                continue;
            }
            if let Some(snapshot) = self.generate_node(child, index, clip) {
                out.push(snapshot);
            }
        }
    }

    fn reuse_draw_node(&self, id: NodeId, previous: Arc<DrawNode>) -> Arc<DrawNode> {
        self.record(StatisticsCounter::DrawNodesReused, 1);
        self.node(id).caches.draw_node.set(previous.invalidation_id);
        previous
    }

    fn store_draw_node(
        &mut self,
        id: NodeId,
        index: TreeIndex,
        invalidation_id: u64,
        snapshot: Option<Arc<DrawNode>>,
    ) {
        let node = self.node_mut(id);
        node.draw_nodes[index.get()] = snapshot;
        node.caches.draw_node.set(invalidation_id);
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Size, Vec2};

    use crate::stats::FrameStatistics;
    use crate::{NodeDesc, Tree, TreeOptions};

    use super::*;

    fn leaf(tree: &mut Tree, parent: NodeId, position: Vec2) -> NodeId {
        let id = tree
            .create(
                NodeDesc::leaf()
                    .with_size(Size::new(10.0, 10.0))
                    .with_position(position),
            )
            .unwrap();
        tree.add_child(parent, id).unwrap();
        id
    }

    #[test]
    fn snapshots_are_isolated_from_later_mutation() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = leaf(&mut tree, root, Vec2::new(5.0, 5.0));
        tree.update();
        let first = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
        let before = first.find(a).unwrap().draw_info;
        assert_eq!(before.matrix.translation(), Vec2::new(5.0, 5.0));

        tree.set_position(a, Vec2::new(50.0, 60.0)).unwrap();
        tree.update();
        let second = tree.generate_draw_nodes(TreeIndex::ALL[1]).unwrap();
        assert_eq!(first.find(a).unwrap().draw_info, before, "old snapshot is frozen");
        assert_eq!(
            second.find(a).unwrap().draw_info.matrix.translation(),
            Vec2::new(50.0, 60.0)
        );
    }

    #[test]
    fn unchanged_nodes_are_reused_per_slot() {
        let mut tree = Tree::default();
        let root = tree.root();
        let a = leaf(&mut tree, root, Vec2::ZERO);
        let b = leaf(&mut tree, root, Vec2::new(20.0, 0.0));
        let stats = Arc::new(FrameStatistics::new());
        tree.set_statistics(Some(stats.clone()));
        tree.update();

        let index = TreeIndex::ALL[0];
        let first = tree.generate_draw_nodes(index).unwrap();
        assert_eq!(stats.get(StatisticsCounter::DrawNodesCreated), 3);
        stats.take();

        let again = tree.generate_draw_nodes(index).unwrap();
        assert!(Arc::ptr_eq(&first, &again), "nothing changed, so the root is reused");
        assert_eq!(stats.get(StatisticsCounter::DrawNodesCreated), 0);
        stats.take();

        tree.set_colour(b, Rgba::BLACK).unwrap();
        let third = tree.generate_draw_nodes(index).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(
            Arc::ptr_eq(&third.children()[0], &first.children()[0]),
            "the untouched leaf is shared between generations"
        );
        assert!(Arc::ptr_eq(
            &tree.draw_node(a, index).unwrap(),
            &first.children()[0]
        ));
        assert_eq!(
            stats.get(StatisticsCounter::DrawNodesCreated),
            2,
            "only the changed leaf and its parent are rebuilt"
        );
    }

    #[test]
    fn children_outside_the_clip_are_masked_away() {
        let mut tree = Tree::default();
        let root = tree.root();
        let inside = leaf(&mut tree, root, Vec2::new(10.0, 10.0));
        let outside = leaf(&mut tree, root, Vec2::new(5000.0, 10.0));
        tree.update();
        let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
        assert!(snapshot.find(inside).is_some());
        assert!(snapshot.find(outside).is_none());
        assert!(tree.is_masked_away(outside));
        assert!(!tree.is_masked_away(inside));
    }

    #[test]
    fn masking_composites_clip_their_children() {
        let mut tree = Tree::default();
        let root = tree.root();
        let mask = tree
            .create(NodeDesc {
                masking: true,
                ..NodeDesc::composite().with_size(Size::new(50.0, 50.0))
            })
            .unwrap();
        tree.add_child(root, mask).unwrap();
        let inside = leaf(&mut tree, mask, Vec2::new(10.0, 10.0));
        let clipped = leaf(&mut tree, mask, Vec2::new(100.0, 10.0));
        tree.update();

        let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
        let masked = snapshot.find(mask).unwrap();
        let DrawNodeKind::Composite { masking, .. } = &masked.kind else {
            panic!("masking composites keep their own snapshot");
        };
        assert_eq!(
            masking.map(|m| m.masking_rect),
            Some(Rect::new(0.0, 0.0, 50.0, 50.0))
        );
        assert!(masked.find(inside).is_some());
        assert!(tree.is_masked_away(clipped));
    }

    fn build(flatten: bool) -> (Tree, Option<Arc<DrawNode>>) {
        let mut tree = Tree::new(TreeOptions {
            flatten_composites: flatten,
            ..TreeOptions::default()
        });
        let root = tree.root();
        let group = tree
            .create(NodeDesc::composite().with_position(Vec2::new(100.0, 100.0)))
            .unwrap();
        tree.add_child(root, group).unwrap();
        tree.set_alpha(group, 0.5).unwrap();
        leaf(&mut tree, group, Vec2::ZERO);
        leaf(&mut tree, group, Vec2::new(30.0, 0.0));
        leaf(&mut tree, root, Vec2::new(300.0, 0.0));
        tree.update();
        let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]);
        (tree, snapshot)
    }

    fn leaves(node: &DrawNode, out: &mut Vec<(DrawInfo, Vec<DrawCommand>)>) {
        if let DrawNodeKind::Leaf { commands } = &node.kind {
            out.push((node.draw_info, commands.clone()));
        }
        for child in node.children() {
            leaves(child, out);
        }
    }

    #[test]
    fn flattening_preserves_output() {
        let (_, flat) = build(true);
        let (_, nested) = build(false);
        let (flat, nested) = (flat.unwrap(), nested.unwrap());
        assert_eq!(flat.children().len(), 3, "group children are spliced into the root");
        assert_eq!(nested.children().len(), 2);
        assert!(flat.subtree_len() < nested.subtree_len());

        let (mut a, mut b) = (Vec::new(), Vec::new());
        leaves(&flat, &mut a);
        leaves(&nested, &mut b);
        assert_eq!(a, b, "same leaves, same order, same resolved state");
        assert_eq!(a[0].0.colour.a, 0.5, "group alpha reaches spliced children");
    }

    #[test]
    fn empty_trees_have_no_snapshot() {
        let mut tree = Tree::default();
        tree.update();
        assert!(tree.generate_draw_nodes(TreeIndex::ALL[0]).is_none());
        assert_eq!(TreeIndex::new(3), None);
        assert_eq!(TreeIndex::new(2).map(TreeIndex::get), Some(2));
    }
}
