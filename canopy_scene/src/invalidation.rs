// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation categories and the parent-to-child derivation rule.

use crate::types::{Anchor, Axes};

bitflags::bitflags! {
    /// Categories of cached node state that may become stale.
    ///
    /// Distinct bits let a change in one category skip recomputation in the others.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Invalidation: u32 {
        /// Screen-space transform.
        const DRAW_INFO = 1 << 0;
        /// Resolved draw size.
        const DRAW_SIZE = 1 << 1;
        /// Local geometry: position, rotation, shear, scale, anchor, origin.
        const MISC_GEOMETRY = 1 << 2;
        /// Resolved colour and alpha.
        const COLOUR = 1 << 3;
        /// Render-only state with no layout effect.
        const DRAW_NODE = 1 << 4;
        /// Whether the node contributes to rendering and auto-sizing.
        const PRESENCE = 1 << 5;
        /// The node was attached to or detached from a parent.
        const PARENT = 1 << 6;

        /// Everything that changes where and how large the node is.
        const LAYOUT = Self::DRAW_INFO.bits() | Self::DRAW_SIZE.bits() | Self::MISC_GEOMETRY.bits();
        /// Everything that changes the size a parent needs to fit this node.
        const REQUIRED_PARENT_SIZE_TO_FIT = Self::MISC_GEOMETRY.bits() | Self::DRAW_SIZE.bits();
        /// Every state category.
        const ALL = Self::LAYOUT.bits()
            | Self::COLOUR.bits()
            | Self::DRAW_NODE.bits()
            | Self::PRESENCE.bits();
    }
}

/// Where an invalidation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationSource {
    /// The node's own state changed.
    Own,
    /// The node's parent pushed a derived invalidation down.
    Parent,
    /// One of the node's children reported a change up.
    Child,
}

/// The parts of a child's configuration that decide how parent changes reach it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildSizing {
    /// Axes on which the child is sized relative to the parent.
    pub relative_size_axes: Axes,
    /// Axes on which the child is positioned relative to the parent.
    pub relative_position_axes: Axes,
    /// The child's anchor within the parent.
    pub anchor: Anchor,
}

/// Derive the invalidation a child receives when its parent is invalidated with `parent`.
///
/// - A change to what the parent needs to fit its own parent moves its screen transform,
///   so children get [`Invalidation::DRAW_INFO`].
/// - Attaching or detaching the parent changes the children's screen transform and colour.
/// - The parent's own rotation, shear or scale do not change child geometry.
/// - A parent draw size change moves children that are positioned relatively or anchored
///   away from the top left corner.
/// - Draw size changes only reach children sized relative to the parent.
pub fn derive_child_invalidation(parent: Invalidation, child: ChildSizing) -> Invalidation {
    let mut inv = parent;

    if parent.intersects(Invalidation::REQUIRED_PARENT_SIZE_TO_FIT) {
        inv |= Invalidation::DRAW_INFO;
    }
    if parent.contains(Invalidation::PARENT) {
        inv |= Invalidation::DRAW_INFO | Invalidation::COLOUR;
        inv.remove(Invalidation::PARENT);
    }

    inv.remove(Invalidation::MISC_GEOMETRY);

    let moves_with_parent =
        !child.relative_position_axes.is_empty() || !child.anchor.is_top_left();
    if parent.contains(Invalidation::DRAW_SIZE) && moves_with_parent {
        inv |= Invalidation::MISC_GEOMETRY;
    }

    if child.relative_size_axes.is_empty() {
        inv.remove(Invalidation::DRAW_SIZE);
    }

    inv
}
