// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interface the draw thread renders snapshots through.

use core::num::NonZeroU64;

use kurbo::{Rect, Size};

use crate::draw_node::{DrawCommand, DrawInfo, MaskingInfo};
use crate::types::{EdgeEffect, Rgba};

/// Handle of an offscreen render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameBufferId(pub NonZeroU64);

/// Axis of a separable blur pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    /// Along x.
    Horizontal,
    /// Along y.
    Vertical,
}

/// One offscreen effect pass, reading one target and writing another.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EffectPass {
    /// Target read from.
    pub source: FrameBufferId,
    /// Target written to.
    pub target: FrameBufferId,
    /// Blur axis.
    pub direction: BlurDirection,
    /// Blur strength.
    pub sigma: f64,
}

/// A rendering backend.
///
/// Called only from the draw thread, in snapshot order.
pub trait Renderer {
    /// Create an offscreen target of `size` pixels.
    fn create_frame_buffer(&mut self, size: Size, pixel_snapping: bool) -> FrameBufferId;

    /// Resize an existing offscreen target.
    fn resize_frame_buffer(&mut self, frame_buffer: FrameBufferId, size: Size);

    /// Redirect drawing into `frame_buffer`, which covers `screen_rect`.
    fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferId, screen_rect: Rect);

    /// Stop drawing into `frame_buffer` and return to the previous target.
    fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferId);

    /// Fill the bound target with `colour`.
    fn clear(&mut self, colour: Rgba);

    /// Draw an edge effect around a masked area.
    fn draw_edge_effect(&mut self, effect: &EdgeEffect, masking: &MaskingInfo);

    /// Clip subsequent drawing to a masked area.
    fn push_masking(&mut self, masking: &MaskingInfo);

    /// Undo the matching [`Renderer::push_masking`].
    fn pop_masking(&mut self);

    /// Draw one command with the transform and tint of its node.
    fn draw(&mut self, command: &DrawCommand, info: &DrawInfo);

    /// Run an effect pass between two offscreen targets.
    fn effect_pass(&mut self, pass: &EffectPass);

    /// Composite an offscreen target onto the bound target.
    fn draw_frame_buffer(&mut self, frame_buffer: FrameBufferId, screen_rect: Rect, colour: Rgba);
}

/// A recorded [`Renderer`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOp {
    /// [`Renderer::create_frame_buffer`].
    CreateFrameBuffer(FrameBufferId, Size, bool),
    /// [`Renderer::resize_frame_buffer`].
    ResizeFrameBuffer(FrameBufferId, Size),
    /// [`Renderer::bind_frame_buffer`].
    BindFrameBuffer(FrameBufferId, Rect),
    /// [`Renderer::unbind_frame_buffer`].
    UnbindFrameBuffer(FrameBufferId),
    /// [`Renderer::clear`].
    Clear(Rgba),
    /// [`Renderer::draw_edge_effect`].
    EdgeEffect(EdgeEffect),
    /// [`Renderer::push_masking`].
    PushMasking(MaskingInfo),
    /// [`Renderer::pop_masking`].
    PopMasking,
    /// [`Renderer::draw`].
    Draw(DrawCommand, DrawInfo),
    /// [`Renderer::effect_pass`].
    EffectPass(EffectPass),
    /// [`Renderer::draw_frame_buffer`].
    DrawFrameBuffer(FrameBufferId, Rect, Rgba),
}

/// A [`Renderer`] that records every call, for tests and debugging.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    /// Calls so far, in order.
    pub ops: Vec<RenderOp>,
    next_frame_buffer: u64,
}

impl RecordingRenderer {
    /// An empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded calls, leaving the recording empty.
    pub fn take(&mut self) -> Vec<RenderOp> {
        core::mem::take(&mut self.ops)
    }

    /// The recorded [`RenderOp::Draw`] calls.
    pub fn draws(&self) -> impl Iterator<Item = (&DrawCommand, &DrawInfo)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            RenderOp::Draw(command, info) => Some((command, info)),
            _ => None,
        })
    }
}

impl Renderer for RecordingRenderer {
    fn create_frame_buffer(&mut self, size: Size, pixel_snapping: bool) -> FrameBufferId {
        self.next_frame_buffer += 1;
        let id = FrameBufferId(NonZeroU64::MIN.saturating_add(self.next_frame_buffer - 1));
        self.ops
            .push(RenderOp::CreateFrameBuffer(id, size, pixel_snapping));
        id
    }

    fn resize_frame_buffer(&mut self, frame_buffer: FrameBufferId, size: Size) {
        self.ops.push(RenderOp::ResizeFrameBuffer(frame_buffer, size));
    }

    fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferId, screen_rect: Rect) {
        self.ops
            .push(RenderOp::BindFrameBuffer(frame_buffer, screen_rect));
    }

    fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferId) {
        self.ops.push(RenderOp::UnbindFrameBuffer(frame_buffer));
    }

    fn clear(&mut self, colour: Rgba) {
        self.ops.push(RenderOp::Clear(colour));
    }

    fn draw_edge_effect(&mut self, effect: &EdgeEffect, _masking: &MaskingInfo) {
        self.ops.push(RenderOp::EdgeEffect(*effect));
    }

    fn push_masking(&mut self, masking: &MaskingInfo) {
        self.ops.push(RenderOp::PushMasking(*masking));
    }

    fn pop_masking(&mut self) {
        self.ops.push(RenderOp::PopMasking);
    }

    fn draw(&mut self, command: &DrawCommand, info: &DrawInfo) {
        self.ops.push(RenderOp::Draw(command.clone(), *info));
    }

    fn effect_pass(&mut self, pass: &EffectPass) {
        self.ops.push(RenderOp::EffectPass(*pass));
    }

    fn draw_frame_buffer(&mut self, frame_buffer: FrameBufferId, screen_rect: Rect, colour: Rgba) {
        self.ops
            .push(RenderOp::DrawFrameBuffer(frame_buffer, screen_rect, colour));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_hands_out_distinct_frame_buffers() {
        let mut r = RecordingRenderer::new();
        let a = r.create_frame_buffer(Size::new(4.0, 4.0), false);
        let b = r.create_frame_buffer(Size::new(4.0, 4.0), true);
        assert_ne!(a, b);
        assert_eq!(a.0.get(), 1);
        r.clear(Rgba::BLACK);
        assert_eq!(r.take().len(), 3);
        assert!(r.ops.is_empty());
    }
}
