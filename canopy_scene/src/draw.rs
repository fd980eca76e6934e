// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Executing snapshots on the draw thread.

use tracing::trace;

use crate::buffered::BufferedDrawNode;
use crate::draw_node::{DrawNode, DrawNodeKind};
use crate::renderer::{BlurDirection, EffectPass, Renderer};
use crate::stats::{StatisticsCounter, StatisticsSink};

/// Render a snapshot tree.
pub fn draw_tree(root: &DrawNode, renderer: &mut impl Renderer) {
    draw_tree_with(root, renderer, None);
}

/// Render a snapshot tree, reporting offscreen re-renders to `stats`.
pub fn draw_tree_with(
    root: &DrawNode,
    renderer: &mut impl Renderer,
    stats: Option<&dyn StatisticsSink>,
) {
    draw_node(root, renderer, stats);
}

fn draw_node(node: &DrawNode, renderer: &mut impl Renderer, stats: Option<&dyn StatisticsSink>) {
    match &node.kind {
        DrawNodeKind::Leaf { commands } => {
            for command in commands {
                renderer.draw(command, &node.draw_info);
            }
        }
        DrawNodeKind::Composite {
            masking,
            edge_effect,
            children,
        } => {
            if let Some(masking) = masking {
                if let Some(effect) = edge_effect {
                    renderer.draw_edge_effect(effect, masking);
                }
                renderer.push_masking(masking);
            }
            for child in children {
                draw_node(child, renderer, stats);
            }
            if masking.is_some() {
                renderer.pop_masking();
            }
        }
        DrawNodeKind::Buffered(buffered) => {
            if buffered.requires_redraw() {
                redraw(node, buffered, renderer, stats);
            }
            composite(node, buffered, renderer);
        }
    }
}

/// Render the subtree into the main target and run the effect passes.
///
/// Ends with the processed result in slot 0.
fn redraw(
    node: &DrawNode,
    buffered: &BufferedDrawNode,
    renderer: &mut impl Renderer,
    stats: Option<&dyn StatisticsSink>,
) {
    let shared = &buffered.shared;
    let size = buffered.frame_buffer_size();
    let main = shared.ensure_frame_buffer(0, size, renderer);
    renderer.bind_frame_buffer(main, buffered.screen_rect);
    renderer.clear(buffered.background_colour);
    for child in &buffered.children {
        draw_node(child, renderer, stats);
    }
    renderer.unbind_frame_buffer(main);

    let mut current = 0;
    let passes = [
        (BlurDirection::Horizontal, buffered.blur_sigma.x),
        (BlurDirection::Vertical, buffered.blur_sigma.y),
    ];
    for (direction, sigma) in passes {
        if sigma <= 0.0 {
            continue;
        }
        let next = if current == 1 { 2 } else { 1 };
        let source = shared.ensure_frame_buffer(current, size, renderer);
        let target = shared.ensure_frame_buffer(next, size, renderer);
        renderer.effect_pass(&EffectPass {
            source,
            target,
            direction,
            sigma,
        });
        current = next;
    }
    if current != 0 {
        shared.swap_slots(0, current);
    }
    shared.set_original_slot(current);
    shared.set_draw_version(buffered.update_version);

    if let Some(stats) = stats {
        stats.increment(StatisticsCounter::FrameBufferRedraws, 1);
    }
    trace!(node = ?node.source, version = buffered.update_version, "frame buffer redrawn");
}

fn composite(node: &DrawNode, buffered: &BufferedDrawNode, renderer: &mut impl Renderer) {
    let shared = &buffered.shared;
    let colour = node.draw_info.colour;
    if buffered.draw_original && buffered.has_effects() {
        if let Some(original) = shared.frame_buffer(shared.original_slot()) {
            renderer.draw_frame_buffer(original, buffered.screen_rect, colour);
        }
    }
    let colour = if buffered.has_effects() {
        colour.multiply(buffered.effect_colour)
    } else {
        colour
    };
    if let Some(result) = shared.frame_buffer(0) {
        renderer.draw_frame_buffer(result, buffered.screen_rect, colour);
    }
}
