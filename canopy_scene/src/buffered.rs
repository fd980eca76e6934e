// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffered composites: subtrees rendered into offscreen targets.
//!
//! A buffered composite counts appearance changes in its subtree with an update
//! version. Its snapshots carry that version; the draw thread re-renders the subtree
//! only when the version differs from the one it last rendered, and otherwise
//! composites the existing target. Without caching the version moves every frame.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use kurbo::{Rect, Size, Vec2};
use parking_lot::Mutex;

use crate::draw_node::DrawNode;
use crate::error::{SceneError, finite};
use crate::renderer::{FrameBufferId, Renderer};
use crate::tree::Tree;
use crate::types::{NodeId, Rgba};

/// Offscreen targets per buffered composite: the main target and two effect targets.
pub const FRAME_BUFFER_SLOTS: usize = 3;

/// State shared between a buffered composite and every snapshot of it.
///
/// The update thread only reads it; the draw thread records what it rendered.
#[derive(Debug, Default)]
pub struct BufferedSharedData {
    draw_version: AtomicU64,
    initialised: AtomicBool,
    pixel_snapping: AtomicBool,
    /// Slot holding the unprocessed subtree after effect passes.
    original_slot: AtomicUsize,
    frame_buffers: Mutex<[Option<(FrameBufferId, Size)>; FRAME_BUFFER_SLOTS]>,
}

impl BufferedSharedData {
    /// Update version of the last rendered subtree; zero before the first render.
    pub fn draw_version(&self) -> u64 {
        self.draw_version.load(Ordering::Acquire)
    }

    /// Whether any offscreen target was created.
    pub fn is_initialised(&self) -> bool {
        self.initialised.load(Ordering::Acquire)
    }

    /// Whether targets are aligned to whole pixels.
    pub fn pixel_snapping(&self) -> bool {
        self.pixel_snapping.load(Ordering::Acquire)
    }

    /// The target in `slot`, if created.
    pub fn frame_buffer(&self, slot: usize) -> Option<FrameBufferId> {
        self.frame_buffers.lock().get(slot).copied().flatten().map(|(id, _)| id)
    }

    /// Slot of the target holding the subtree without effects.
    pub fn original_slot(&self) -> usize {
        self.original_slot.load(Ordering::Acquire)
    }

    pub(crate) fn set_draw_version(&self, version: u64) {
        self.draw_version.store(version, Ordering::Release);
    }

    pub(crate) fn set_original_slot(&self, slot: usize) {
        self.original_slot.store(slot, Ordering::Release);
    }

    /// The target in `slot`, created or resized to `size` as needed.
    pub(crate) fn ensure_frame_buffer(
        &self,
        slot: usize,
        size: Size,
        renderer: &mut impl Renderer,
    ) -> FrameBufferId {
        let mut slots = self.frame_buffers.lock();
        match slots[slot] {
            Some((id, current)) if current == size => id,
            Some((id, _)) => {
                renderer.resize_frame_buffer(id, size);
                slots[slot] = Some((id, size));
                id
            }
            None => {
                let id = renderer.create_frame_buffer(size, self.pixel_snapping());
                slots[slot] = Some((id, size));
                self.initialised.store(true, Ordering::Release);
                id
            }
        }
    }

    /// Exchange two targets.
    pub(crate) fn swap_slots(&self, a: usize, b: usize) {
        self.frame_buffers.lock().swap(a, b);
    }
}

/// Per-node configuration and bookkeeping of a buffered composite.
#[derive(Debug)]
pub(crate) struct BufferedState {
    pub(crate) shared: Arc<BufferedSharedData>,
    pub(crate) update_version: u64,
    pub(crate) cache_drawn_frame_buffer: bool,
    pub(crate) blur_sigma: Vec2,
    pub(crate) background_colour: Rgba,
    pub(crate) effect_colour: Rgba,
    pub(crate) draw_original: bool,
}

impl BufferedState {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::default(),
            // Ahead of the draw version so the first snapshot renders.
            update_version: 1,
            cache_drawn_frame_buffer: false,
            blur_sigma: Vec2::ZERO,
            background_colour: Rgba::TRANSPARENT,
            effect_colour: Rgba::WHITE,
            draw_original: false,
        }
    }
}

/// Snapshot payload of a buffered composite.
#[derive(Debug)]
pub struct BufferedDrawNode {
    /// State shared with the node and its other snapshots.
    pub shared: Arc<BufferedSharedData>,
    /// Update version at generation time.
    pub update_version: u64,
    /// Screen-space area the targets cover.
    pub screen_rect: Rect,
    /// Child snapshots rendered into the main target.
    pub children: Vec<Arc<DrawNode>>,
    /// Blur strength per axis; zero skips that pass.
    pub blur_sigma: Vec2,
    /// Colour the main target is cleared to.
    pub background_colour: Rgba,
    /// Tint of the processed result.
    pub effect_colour: Rgba,
    /// Also draw the subtree without effects, beneath the processed result.
    pub draw_original: bool,
}

impl BufferedDrawNode {
    /// Whether the subtree must be rendered again before compositing.
    pub fn requires_redraw(&self) -> bool {
        self.shared.draw_version() != self.update_version
    }

    /// Size of each offscreen target.
    pub fn frame_buffer_size(&self) -> Size {
        let size = self.screen_rect.size();
        if self.shared.pixel_snapping() {
            Size::new(size.width.ceil(), size.height.ceil())
        } else {
            size
        }
    }

    /// Whether any effect pass runs.
    pub fn has_effects(&self) -> bool {
        self.blur_sigma.x > 0.0 || self.blur_sigma.y > 0.0
    }
}

impl Tree {
    pub(crate) fn buffered_state(&self, id: NodeId) -> Option<&BufferedState> {
        self.composite_opt(id)?.buffered.as_ref()
    }

    fn buffered_mut(&mut self, id: NodeId) -> Result<&mut BufferedState, SceneError> {
        self.try_node_mut(id)?
            .composite
            .as_deref_mut()
            .and_then(|c| c.buffered.as_mut())
            .ok_or(SceneError::NotBuffered(id))
    }

    /// Record an appearance change of a buffered composite.
    ///
    /// Also invalidates the node's snapshot so the next generation pass carries the new
    /// version.
    pub(crate) fn bump_update_version(&mut self, id: NodeId) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        let Some(state) = node.composite.as_deref_mut().and_then(|c| c.buffered.as_mut()) else {
            return;
        };
        state.update_version += 1;
        if node.caches.draw_node.invalidate() {
            node.invalidation_id += 1;
        }
    }

    pub(crate) fn buffered_draw_node(
        &self,
        id: NodeId,
        children: Vec<Arc<DrawNode>>,
        screen_rect: Rect,
    ) -> Option<BufferedDrawNode> {
        let state = self.buffered_state(id)?;
        Some(BufferedDrawNode {
            shared: Arc::clone(&state.shared),
            update_version: state.update_version,
            screen_rect,
            children,
            blur_sigma: state.blur_sigma,
            background_colour: state.background_colour,
            effect_colour: state.effect_colour,
            draw_original: state.draw_original,
        })
    }

    fn configure_buffered(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut BufferedState),
    ) -> Result<(), SceneError> {
        f(self.buffered_mut(id)?);
        self.bump_update_version(id);
        Ok(())
    }

    /// Re-render the subtree of a buffered composite on its next draw.
    pub fn force_redraw(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.configure_buffered(id, |_| {})
    }

    /// Keep the rendered subtree until something in it changes, instead of rendering it
    /// every frame.
    pub fn set_cache_drawn_frame_buffer(&mut self, id: NodeId, cache: bool) -> Result<(), SceneError> {
        self.configure_buffered(id, |b| b.cache_drawn_frame_buffer = cache)
    }

    /// Align offscreen targets to whole pixels. Only allowed before the first render.
    pub fn set_pixel_snapping(&mut self, id: NodeId, snapping: bool) -> Result<(), SceneError> {
        let shared = &self.buffered_mut(id)?.shared;
        if shared.is_initialised() {
            return Err(SceneError::FrameBufferInitialised(id));
        }
        shared.pixel_snapping.store(snapping, Ordering::Release);
        Ok(())
    }

    /// Blur strength per axis.
    pub fn set_blur_sigma(&mut self, id: NodeId, sigma: Vec2) -> Result<(), SceneError> {
        for v in [sigma.x, sigma.y] {
            if finite("blur sigma", v)? < 0.0 {
                return Err(SceneError::InvalidValue {
                    what: "blur sigma",
                    value: v,
                });
            }
        }
        self.configure_buffered(id, |b| b.blur_sigma = sigma)
    }

    /// Colour the main target is cleared to before rendering the subtree.
    pub fn set_background_colour(&mut self, id: NodeId, colour: Rgba) -> Result<(), SceneError> {
        self.configure_buffered(id, |b| b.background_colour = colour)
    }

    /// Tint of the processed result.
    pub fn set_effect_colour(&mut self, id: NodeId, colour: Rgba) -> Result<(), SceneError> {
        self.configure_buffered(id, |b| b.effect_colour = colour)
    }

    /// Also draw the subtree without effects.
    pub fn set_draw_original(&mut self, id: NodeId, draw_original: bool) -> Result<(), SceneError> {
        self.configure_buffered(id, |b| b.draw_original = draw_original)
    }

    /// State shared with the snapshots of a buffered composite.
    pub fn buffered_shared(&self, id: NodeId) -> Option<Arc<BufferedSharedData>> {
        self.buffered_state(id).map(|b| Arc::clone(&b.shared))
    }

    /// Current update version of a buffered composite.
    pub fn update_version(&self, id: NodeId) -> Option<u64> {
        self.buffered_state(id).map(|b| b.update_version)
    }
}
