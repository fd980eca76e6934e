// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node descriptions and per-node storage.

use std::sync::Arc;

use canopy_lifetime::{EntryId, LifetimeEntryManager};
use kurbo::{Affine, Rect, Size, Vec2};

use crate::behavior::Behavior;
use crate::buffered::BufferedState;
use crate::cache::{Cached, LayoutCell};
use crate::clock::ClockId;
use crate::dependencies::Dependencies;
use crate::draw_node::{DRAW_NODE_SLOTS, DrawNode};
use crate::invalidation::{ChildSizing, Invalidation};
use crate::load::CancellationToken;
use crate::schedule::ScheduledTask;
use crate::transition::{AutoSizeTransition, Easing};
use crate::types::{Anchor, Axes, EdgeEffect, LoadState, MarginPadding, NodeId, Rgba};

/// What a node is able to hold and draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A node without children that draws through its [`Behavior`].
    #[default]
    Leaf,
    /// A node owning a depth-ordered collection of children.
    Composite,
    /// A composite whose children's alive state is driven by a lifetime entry manager
    /// instead of a full scan; suited to large, sparsely alive collections.
    LifetimeManaged,
    /// A composite that renders its subtree into an offscreen buffer and composites it.
    Buffered,
}

impl NodeKind {
    /// Whether nodes of this kind own children.
    pub fn is_composite(self) -> bool {
        !matches!(self, Self::Leaf)
    }
}

/// Everything needed to create a node.
///
/// Composite-only fields (`auto_size_axes`, `padding`, `masking`) are rejected on leaves.
pub struct NodeDesc {
    /// Kind of node.
    pub kind: NodeKind,
    /// Position relative to the anchor.
    pub position: Vec2,
    /// Size; a fraction of the parent on relative axes.
    pub size: Size,
    /// Scale around the origin.
    pub scale: Vec2,
    /// Rotation around the origin, in radians.
    pub rotation: f64,
    /// Shear around the origin.
    pub shear: Vec2,
    /// Pivot within the parent's child area.
    pub anchor: Anchor,
    /// Pivot within the node.
    pub origin: Anchor,
    /// Outer spacing.
    pub margin: MarginPadding,
    /// Colour, multiplied into descendants.
    pub colour: Rgba,
    /// Opacity, multiplied into descendants.
    pub alpha: f32,
    /// Ordering key among siblings; higher depth is drawn first.
    pub depth: f32,
    /// Start of the lifetime window (inclusive).
    pub lifetime_start: f64,
    /// End of the lifetime window (exclusive).
    pub lifetime_end: f64,
    /// Axes on which `size` is relative to the parent.
    pub relative_size_axes: Axes,
    /// Axes on which `position` is relative to the parent.
    pub relative_position_axes: Axes,
    /// Axes on which this node is ignored by an auto-sizing parent.
    pub bypass_auto_size_axes: Axes,
    /// Axes sized from children. Composites only.
    pub auto_size_axes: Axes,
    /// Inner spacing around children. Composites only.
    pub padding: MarginPadding,
    /// Clip children to the node's bounds. Composites only.
    pub masking: bool,
    /// Stay present even when fully transparent.
    pub always_present: bool,
    /// Leave the parent once the lifetime window has passed.
    pub remove_when_not_alive: bool,
    /// Dispose (rather than just detach) when removed for not being alive.
    pub dispose_on_death_removal: bool,
    /// Custom hooks.
    pub behavior: Option<Box<dyn Behavior>>,
}

impl core::fmt::Debug for NodeDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeDesc")
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("depth", &self.depth)
            .field("lifetime_start", &self.lifetime_start)
            .field("lifetime_end", &self.lifetime_end)
            .field("auto_size_axes", &self.auto_size_axes)
            .field("has_behavior", &self.behavior.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for NodeDesc {
    fn default() -> Self {
        Self {
            kind: NodeKind::Leaf,
            position: Vec2::ZERO,
            size: Size::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            shear: Vec2::ZERO,
            anchor: Anchor::TOP_LEFT,
            origin: Anchor::TOP_LEFT,
            margin: MarginPadding::ZERO,
            colour: Rgba::WHITE,
            alpha: 1.0,
            depth: 0.0,
            lifetime_start: f64::NEG_INFINITY,
            lifetime_end: f64::INFINITY,
            relative_size_axes: Axes::empty(),
            relative_position_axes: Axes::empty(),
            bypass_auto_size_axes: Axes::empty(),
            auto_size_axes: Axes::empty(),
            padding: MarginPadding::ZERO,
            masking: false,
            always_present: false,
            remove_when_not_alive: false,
            dispose_on_death_removal: true,
            behavior: None,
        }
    }
}

impl NodeDesc {
    /// A leaf.
    pub fn leaf() -> Self {
        Self::default()
    }

    /// A composite.
    pub fn composite() -> Self {
        Self {
            kind: NodeKind::Composite,
            ..Self::default()
        }
    }

    /// A lifetime-managed composite.
    pub fn lifetime_managed() -> Self {
        Self {
            kind: NodeKind::LifetimeManaged,
            ..Self::default()
        }
    }

    /// A buffered composite.
    pub fn buffered() -> Self {
        Self {
            kind: NodeKind::Buffered,
            ..Self::default()
        }
    }

    /// Set the size.
    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the depth.
    #[must_use]
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    /// Set the lifetime window `[start, end)`.
    #[must_use]
    pub fn with_lifetime(mut self, start: f64, end: f64) -> Self {
        self.lifetime_start = start;
        self.lifetime_end = end;
        self
    }

    /// Size the composite from its children on `axes`.
    #[must_use]
    pub fn with_auto_size(mut self, axes: Axes) -> Self {
        self.auto_size_axes = axes;
        self
    }

    /// Size relative to the parent on `axes`.
    #[must_use]
    pub fn with_relative_size(mut self, axes: Axes) -> Self {
        self.relative_size_axes = axes;
        self
    }

    /// Attach custom hooks.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl Behavior) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}

/// Local geometry as set by the user.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Geometry {
    pub(crate) position: Vec2,
    pub(crate) size: Size,
    pub(crate) scale: Vec2,
    pub(crate) rotation: f64,
    pub(crate) shear: Vec2,
    pub(crate) anchor: Anchor,
    pub(crate) origin: Anchor,
    pub(crate) margin: MarginPadding,
    pub(crate) relative_size_axes: Axes,
    pub(crate) relative_position_axes: Axes,
    pub(crate) bypass_auto_size_axes: Axes,
}

/// Resolved-state caches of a node.
#[derive(Debug)]
pub(crate) struct NodeCaches {
    pub(crate) draw_size: LayoutCell<Size>,
    pub(crate) local_matrix: LayoutCell<Affine>,
    pub(crate) draw_matrix: LayoutCell<Affine>,
    pub(crate) bounding_box: LayoutCell<Rect>,
    pub(crate) required_parent_size_to_fit: LayoutCell<Size>,
    pub(crate) screen_space_aabb: LayoutCell<Rect>,
    pub(crate) draw_colour: LayoutCell<Rgba>,
    /// Valid while the latest draw node reflects the node; holds the invalidation id.
    pub(crate) draw_node: LayoutCell<u64>,
}

impl NodeCaches {
    fn new() -> Self {
        use Invalidation as I;
        let fit = I::REQUIRED_PARENT_SIZE_TO_FIT.union(I::PARENT);
        Self {
            draw_size: LayoutCell::new(I::DRAW_SIZE.union(I::PARENT)),
            local_matrix: LayoutCell::new(fit),
            draw_matrix: LayoutCell::new(fit.union(I::DRAW_INFO)),
            bounding_box: LayoutCell::new(fit),
            required_parent_size_to_fit: LayoutCell::new(fit),
            screen_space_aabb: LayoutCell::new(fit.union(I::DRAW_INFO)),
            draw_colour: LayoutCell::new(I::COLOUR.union(I::PARENT)),
            draw_node: LayoutCell::new(I::all()),
        }
    }

    /// Invalidate the layout cells touched by `mask`. Returns whether any was valid.
    pub(crate) fn invalidate_layout(&self, mask: Invalidation) -> bool {
        self.draw_size.invalidate_for(mask)
            | self.local_matrix.invalidate_for(mask)
            | self.draw_matrix.invalidate_for(mask)
            | self.bounding_box.invalidate_for(mask)
            | self.required_parent_size_to_fit.invalidate_for(mask)
            | self.screen_space_aabb.invalidate_for(mask)
            | self.draw_colour.invalidate_for(mask)
    }

    #[cfg(test)]
    pub(crate) fn states(&self) -> [crate::cache::CacheState; 8] {
        [
            self.draw_size.state(),
            self.local_matrix.state(),
            self.draw_matrix.state(),
            self.bounding_box.state(),
            self.required_parent_size_to_fit.state(),
            self.screen_space_aabb.state(),
            self.draw_colour.state(),
            self.draw_node.state(),
        ]
    }
}

/// State only composites carry.
pub(crate) struct CompositeState {
    /// Children sorted by depth (descending), then child id (ascending).
    pub(crate) children: Vec<NodeId>,
    /// The alive subset of `children`, in the same order.
    pub(crate) alive: Vec<NodeId>,
    pub(crate) next_child_id: u64,
    pub(crate) auto_size_axes: Axes,
    /// Target size computed from children.
    pub(crate) auto_size: Cached<Size>,
    /// Size currently applied on auto-sized axes.
    pub(crate) auto_size_current: Size,
    pub(crate) auto_size_duration: f64,
    pub(crate) auto_size_easing: Easing,
    pub(crate) transition: Option<AutoSizeTransition>,
    pub(crate) padding: MarginPadding,
    pub(crate) masking: bool,
    pub(crate) corner_radius: f64,
    pub(crate) border_thickness: f64,
    pub(crate) border_colour: Rgba,
    pub(crate) edge_effect: Option<EdgeEffect>,
    pub(crate) relative_child_size: Vec2,
    pub(crate) relative_child_offset: Vec2,
    pub(crate) lifetimes: Option<LifetimeEntryManager<NodeId>>,
    pub(crate) buffered: Option<BufferedState>,
}

impl CompositeState {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            children: Vec::new(),
            alive: Vec::new(),
            next_child_id: 0,
            auto_size_axes: Axes::empty(),
            auto_size: Cached::new(),
            auto_size_current: Size::ZERO,
            auto_size_duration: 0.0,
            auto_size_easing: Easing::None,
            transition: None,
            padding: MarginPadding::ZERO,
            masking: false,
            corner_radius: 0.0,
            border_thickness: 0.0,
            border_colour: Rgba::BLACK,
            edge_effect: None,
            relative_child_size: Vec2::new(1.0, 1.0),
            relative_child_offset: Vec2::ZERO,
            lifetimes: (kind == NodeKind::LifetimeManaged).then(LifetimeEntryManager::new),
            buffered: (kind == NodeKind::Buffered).then(BufferedState::new),
        }
    }

    /// Whether auto-size changes show up at once rather than through a transition.
    pub(crate) fn auto_size_is_immediate(&self) -> bool {
        self.auto_size_duration <= 0.0 && self.transition.is_none()
    }

    /// Whether the composite can be spliced into its parent's draw list.
    pub(crate) fn can_be_flattened(&self) -> bool {
        !self.masking && self.edge_effect.is_none() && self.buffered.is_none()
    }
}

pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    /// Non-zero while attached; assigned by the parent, monotonically increasing.
    pub(crate) child_id: u64,
    pub(crate) geometry: Geometry,
    pub(crate) colour: Rgba,
    pub(crate) alpha: f32,
    pub(crate) depth: f32,
    pub(crate) always_present: bool,
    pub(crate) lifetime_start: f64,
    pub(crate) lifetime_end: f64,
    pub(crate) remove_when_not_alive: bool,
    pub(crate) dispose_on_death_removal: bool,
    pub(crate) alive: bool,
    pub(crate) load_state: LoadState,
    pub(crate) clock: ClockId,
    pub(crate) own_clock: bool,
    pub(crate) dependencies: Option<Dependencies>,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) caches: NodeCaches,
    /// Bumped every time the draw-node cache goes stale.
    pub(crate) invalidation_id: u64,
    pub(crate) composite: Option<Box<CompositeState>>,
    pub(crate) draw_nodes: [Option<Arc<DrawNode>>; DRAW_NODE_SLOTS],
    pub(crate) scheduled: Vec<ScheduledTask>,
    pub(crate) load_token: Option<CancellationToken>,
    pub(crate) lifetime_entry: Option<EntryId>,
    /// Culled by the last draw node generation pass.
    pub(crate) masked_away: bool,
}

impl Node {
    pub(crate) fn new(generation: u32, desc: &NodeDesc, behavior: Option<Box<dyn Behavior>>) -> Self {
        Self {
            generation,
            kind: desc.kind,
            parent: None,
            child_id: 0,
            geometry: Geometry {
                position: desc.position,
                size: desc.size,
                scale: desc.scale,
                rotation: desc.rotation,
                shear: desc.shear,
                anchor: desc.anchor,
                origin: desc.origin,
                margin: desc.margin,
                relative_size_axes: desc.relative_size_axes,
                relative_position_axes: desc.relative_position_axes,
                bypass_auto_size_axes: desc.bypass_auto_size_axes,
            },
            colour: desc.colour,
            alpha: desc.alpha,
            depth: desc.depth,
            always_present: desc.always_present,
            lifetime_start: desc.lifetime_start,
            lifetime_end: desc.lifetime_end,
            remove_when_not_alive: desc.remove_when_not_alive,
            dispose_on_death_removal: desc.dispose_on_death_removal,
            alive: false,
            load_state: LoadState::NotLoaded,
            clock: ClockId::ROOT,
            own_clock: false,
            dependencies: None,
            behavior,
            caches: NodeCaches::new(),
            invalidation_id: 0,
            composite: desc.kind.is_composite().then(|| {
                let mut c = CompositeState::new(desc.kind);
                c.auto_size_axes = desc.auto_size_axes;
                c.padding = desc.padding;
                c.masking = desc.masking;
                Box::new(c)
            }),
            draw_nodes: Default::default(),
            scheduled: Vec::new(),
            load_token: None,
            lifetime_entry: None,
            masked_away: false,
        }
    }

    /// Whether the node contributes to rendering and auto-sizing.
    pub(crate) fn is_present(&self) -> bool {
        self.always_present
            || (self.alpha > VISIBILITY_CUTOFF
                && self.geometry.scale.x != 0.0
                && self.geometry.scale.y != 0.0)
    }

    pub(crate) fn is_buffered(&self) -> bool {
        self.composite.as_ref().is_some_and(|c| c.buffered.is_some())
    }

    pub(crate) fn auto_size_axes(&self) -> Axes {
        self.composite.as_ref().map_or(Axes::empty(), |c| c.auto_size_axes)
    }

    pub(crate) fn sizing(&self) -> ChildSizing {
        ChildSizing {
            relative_size_axes: self.geometry.relative_size_axes,
            relative_position_axes: self.geometry.relative_position_axes,
            anchor: self.geometry.anchor,
        }
    }

    /// Whether `time` lies inside the lifetime window.
    pub(crate) fn should_be_alive_at(&self, time: f64) -> bool {
        time >= self.lifetime_start && time < self.lifetime_end
    }

    /// Sort key among siblings.
    pub(crate) fn order_key(&self) -> (f32, u64) {
        (self.depth, self.child_id)
    }
}

/// Alpha at or below which a node is considered invisible.
pub(crate) const VISIBILITY_CUTOFF: f32 = 0.0001;

/// Sibling order: depth descending, then child id ascending.
pub(crate) fn sibling_order(a: (f32, u64), b: (f32, u64)) -> core::cmp::Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}
