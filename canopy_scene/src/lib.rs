// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: a retained-mode scene graph with cached layout and lock-free draw snapshots.
//!
//! The [`Tree`] owns every node in a generational arena and hands out [`NodeId`]s.
//! Leaves draw; composites own ordered children and may size themselves from them.
//!
//! - Derived geometry (draw size, transforms, bounds, colour) lives in per-node caches that
//!   are invalidated by category ([`Invalidation`]) and recomputed lazily on demand.
//! - [`Tree::update`] visits the alive part of the tree once per frame: life-cycle scans
//!   decide which children are alive at the current clock time, [`Behavior`] hooks run,
//!   scheduled tasks fire and auto-sizing is resolved.
//! - [`Tree::generate_draw_nodes`] freezes the visible tree into an immutable [`DrawNode`]
//!   snapshot for one of [`DRAW_NODE_SLOTS`] slots. Unchanged subtrees are shared with the
//!   previous snapshot of the same slot.
//! - A [`TripleBuffer`] carries snapshots to a draw thread, which renders them through a
//!   [`Renderer`] with [`draw_tree`].
//!
//! Buffered composites render their subtree offscreen and only re-render it when something
//! below them changed, tracked by an update version on the scene side and a draw version
//! on the draw side.
//!
//! Time comes from [`FrameClock`]s. Each node follows the clock of its parent unless given
//! its own, and lifetimes are evaluated against that clock.
//!
//! Large, mostly dead child sets can be handed to a lifetime-managed composite
//! ([`NodeKind::LifetimeManaged`]), which tracks them with
//! [`canopy_lifetime::LifetimeEntryManager`] so each update only inspects alive children and
//! those whose lifetime boundary was crossed.
//!
//! # Example
//!
//! ```rust
//! use canopy_scene::{Axes, DrawNodeKind, NodeDesc, RecordingRenderer, Tree, TreeIndex, draw_tree};
//! use kurbo::Size;
//!
//! let mut tree = Tree::default();
//! let root = tree.root();
//! let row = tree.create(NodeDesc::composite().with_auto_size(Axes::BOTH)).unwrap();
//! tree.add_child(root, row).unwrap();
//!
//! let a = tree.create(NodeDesc::leaf().with_size(Size::new(100.0, 50.0))).unwrap();
//! let b = tree.create(NodeDesc::leaf().with_size(Size::new(60.0, 120.0))).unwrap();
//! tree.add_children(row, [a, b]).unwrap();
//!
//! tree.update();
//! assert_eq!(tree.size(row), Some(Size::new(100.0, 120.0)));
//!
//! let snapshot = tree.generate_draw_nodes(TreeIndex::ALL[0]).unwrap();
//! assert!(matches!(snapshot.kind, DrawNodeKind::Composite { .. }));
//!
//! let mut renderer = RecordingRenderer::new();
//! draw_tree(&snapshot, &mut renderer);
//! assert_eq!(renderer.draws().count(), 2);
//! ```
//!
//! ### Float semantics
//!
//! Setters reject NaN and infinite geometry with [`SceneError::InvalidValue`]. Lifetimes may
//! be infinite; that is the default and means "always alive".

mod behavior;
mod buffered;
mod cache;
mod clock;
mod composite;
mod dependencies;
mod draw;
mod draw_node;
mod error;
mod handoff;
mod invalidation;
mod layout;
mod life;
mod load;
mod node;
mod renderer;
mod schedule;
mod stats;
mod transition;
mod tree;
mod types;
mod update;

pub use behavior::{Behavior, DrawContext, Empty, Fill, SizeProbe};
pub use buffered::{BufferedDrawNode, BufferedSharedData, FRAME_BUFFER_SLOTS};
pub use cache::{CacheState, Cached, LayoutCell};
pub use clock::{ClockId, FrameClock};
pub use dependencies::Dependencies;
pub use draw::{draw_tree, draw_tree_with};
pub use draw_node::{
    DRAW_NODE_SLOTS, DrawCommand, DrawInfo, DrawNode, DrawNodeKind, MaskingInfo, TextureId,
    TreeIndex,
};
pub use error::SceneError;
pub use handoff::{SnapshotReader, SnapshotWriter, TripleBuffer};
pub use invalidation::{ChildSizing, Invalidation, InvalidationSource, derive_child_invalidation};
pub use load::{AsyncLoad, CancellationToken, LoadContext};
pub use node::{NodeDesc, NodeKind};
pub use renderer::{
    BlurDirection, EffectPass, FrameBufferId, RecordingRenderer, RenderOp, Renderer,
};
pub use stats::{FrameStatistics, StatisticsCounter, StatisticsSink};
pub use transition::{AutoSizeTransition, Easing};
pub use tree::{Tree, TreeOptions};
pub use types::{Anchor, Axes, EdgeEffect, EdgeEffectKind, LoadState, MarginPadding, NodeId, Rgba};

pub use canopy_lifetime::{CrossingDirection, LifetimeBoundary};
