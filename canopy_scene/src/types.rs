// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public value types: node identifiers, axes, anchors, spacing, colours, load states.

use kurbo::{Size, Vec2};

/// Identifier for a node in the [`Tree`](crate::Tree).
///
/// A small, copyable handle consisting of a slot index and a generation counter.
///
/// - On create, a fresh slot is allocated with generation `1`.
/// - On dispose, the slot is freed; any existing `NodeId` pointing at it is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a distinct `NodeId`.
///
/// Stale ids never alias a different live node because the generation must match.
/// Use [`Tree::contains`](crate::Tree::contains) to check whether an id is still live.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// A set of layout axes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Axes: u8 {
        /// The horizontal axis.
        const X = 0b01;
        /// The vertical axis.
        const Y = 0b10;
        /// Both axes.
        const BOTH = Self::X.bits() | Self::Y.bits();
    }
}

impl Default for Axes {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags::bitflags! {
    /// A normalized pivot: one horizontal and one vertical component.
    ///
    /// Used both as the anchor (a point within the parent's child area) and as the
    /// origin (a point within the node itself).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Anchor: u8 {
        /// Top edge.
        const Y0 = 1 << 0;
        /// Vertical centre.
        const Y1 = 1 << 1;
        /// Bottom edge.
        const Y2 = 1 << 2;
        /// Left edge.
        const X0 = 1 << 3;
        /// Horizontal centre.
        const X1 = 1 << 4;
        /// Right edge.
        const X2 = 1 << 5;

        /// Top left corner.
        const TOP_LEFT = Self::Y0.bits() | Self::X0.bits();
        /// Centre of the top edge.
        const TOP_CENTRE = Self::Y0.bits() | Self::X1.bits();
        /// Top right corner.
        const TOP_RIGHT = Self::Y0.bits() | Self::X2.bits();
        /// Centre of the left edge.
        const CENTRE_LEFT = Self::Y1.bits() | Self::X0.bits();
        /// Centre.
        const CENTRE = Self::Y1.bits() | Self::X1.bits();
        /// Centre of the right edge.
        const CENTRE_RIGHT = Self::Y1.bits() | Self::X2.bits();
        /// Bottom left corner.
        const BOTTOM_LEFT = Self::Y2.bits() | Self::X0.bits();
        /// Centre of the bottom edge.
        const BOTTOM_CENTRE = Self::Y2.bits() | Self::X1.bits();
        /// Bottom right corner.
        const BOTTOM_RIGHT = Self::Y2.bits() | Self::X2.bits();
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::TOP_LEFT
    }
}

impl Anchor {
    /// The pivot as a fraction of a size, `(0, 0)` being the top left corner.
    pub fn fraction(self) -> Vec2 {
        let x = if self.contains(Self::X1) {
            0.5
        } else if self.contains(Self::X2) {
            1.0
        } else {
            0.0
        };
        let y = if self.contains(Self::Y1) {
            0.5
        } else if self.contains(Self::Y2) {
            1.0
        } else {
            0.0
        };
        Vec2::new(x, y)
    }

    /// The pivot applied to `size`.
    pub fn position_in(self, size: Size) -> Vec2 {
        let f = self.fraction();
        Vec2::new(f.x * size.width, f.y * size.height)
    }

    /// Whether the pivot is the top left corner.
    pub fn is_top_left(self) -> bool {
        self.fraction() == Vec2::ZERO
    }
}

/// Spacing on the four sides of a rectangle, used for margins and padding.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarginPadding {
    /// Top spacing.
    pub top: f64,
    /// Left spacing.
    pub left: f64,
    /// Bottom spacing.
    pub bottom: f64,
    /// Right spacing.
    pub right: f64,
}

impl MarginPadding {
    /// No spacing.
    pub const ZERO: Self = Self::uniform(0.0);

    /// The same spacing on every side.
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            left: value,
            bottom: value,
            right: value,
        }
    }

    /// Horizontal total (`left + right`) and vertical total (`top + bottom`).
    pub fn total(&self) -> Vec2 {
        Vec2::new(self.left + self.right, self.top + self.bottom)
    }

    /// Offset of the top left corner.
    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.left, self.top)
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.top.is_finite() && self.left.is_finite() && self.bottom.is_finite() && self.right.is_finite()
    }
}

/// A linear RGBA colour with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Rgba {
    /// Opaque white; the identity for [`Rgba::multiply`].
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a colour from its components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Component-wise product.
    pub fn multiply(self, other: Self) -> Self {
        Self::new(
            self.r * other.r,
            self.g * other.g,
            self.b * other.b,
            self.a * other.a,
        )
    }

    /// The same colour with alpha scaled by `alpha`.
    pub fn with_alpha_multiplied(self, alpha: f32) -> Self {
        Self { a: self.a * alpha, ..self }
    }
}

/// Loading stage of a node.
///
/// Nodes only move forward through these stages; disposal frees the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LoadState {
    /// Created, not yet attached under a loaded parent.
    #[default]
    NotLoaded,
    /// Loading is in progress (possibly on another thread).
    Loading,
    /// Loaded and eligible to become alive.
    Ready,
    /// Ready, and has received its first update.
    Loaded,
}

/// Kind of an [`EdgeEffect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeEffectKind {
    /// A drop shadow outside the masked area.
    Shadow,
    /// A glow around the masked area.
    Glow,
}

/// A soft effect drawn around the edge of a masking composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEffect {
    /// Shadow or glow.
    pub kind: EdgeEffectKind,
    /// Effect colour.
    pub colour: Rgba,
    /// Softness radius.
    pub radius: f64,
    /// Offset of the effect from the masked area.
    pub offset: Vec2,
    /// Extra corner rounding of the effect.
    pub roundness: f64,
    /// Whether the area inside the mask is left empty.
    pub hollow: bool,
}
