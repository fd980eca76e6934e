// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame clocks shared by subtrees.

use tracing::trace;

use crate::error::{SceneError, finite};
use crate::tree::Tree;
use crate::types::NodeId;

/// Handle of a clock in the tree's clock table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClockId(pub(crate) u32);

impl ClockId {
    /// The clock driving the root and everything not given another clock.
    pub const ROOT: Self = Self(0);

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Time as seen by the nodes attached to a clock.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameClock {
    /// Current time, in the clock's own units.
    pub current_time: f64,
    /// Time elapsed between the last two frames.
    pub elapsed: f64,
}

impl FrameClock {
    /// A clock stopped at `time`.
    pub const fn new(time: f64) -> Self {
        Self {
            current_time: time,
            elapsed: 0.0,
        }
    }

    fn advance(&mut self, delta: f64) {
        self.current_time += delta;
        self.elapsed = delta;
    }

    fn seek(&mut self, time: f64) {
        self.elapsed = time - self.current_time;
        self.current_time = time;
    }
}

impl Tree {
    /// Add a clock starting at `time`.
    pub fn add_clock(&mut self, time: f64) -> ClockId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Clock tables hold far fewer than 2^32 clocks."
        )]
        let id = ClockId(self.clocks.len() as u32);
        self.clocks.push(FrameClock::new(time));
        id
    }

    /// The state of a clock.
    pub fn clock(&self, clock: ClockId) -> Option<FrameClock> {
        self.clocks.get(clock.idx()).copied()
    }

    /// Move a clock forward (or backward, with a negative `delta`).
    pub fn advance_clock(&mut self, clock: ClockId, delta: f64) -> Result<(), SceneError> {
        let delta = finite("clock delta", delta)?;
        let c = self
            .clocks
            .get_mut(clock.idx())
            .ok_or(SceneError::UnknownClock(clock))?;
        c.advance(delta);
        Ok(())
    }

    /// Jump a clock to `time`. Seeking backwards is allowed.
    pub fn set_clock_time(&mut self, clock: ClockId, time: f64) -> Result<(), SceneError> {
        let time = finite("clock time", time)?;
        let c = self
            .clocks
            .get_mut(clock.idx())
            .ok_or(SceneError::UnknownClock(clock))?;
        c.seek(time);
        Ok(())
    }

    /// Drive `node` and its subtree with `clock`.
    ///
    /// Descendants that were given their own clock keep it. Children attached later
    /// inherit the clock of their new parent.
    pub fn set_clock(&mut self, node: NodeId, clock: ClockId) -> Result<(), SceneError> {
        if self.clocks.get(clock.idx()).is_none() {
            return Err(SceneError::UnknownClock(clock));
        }
        let n = self.try_node_mut(node)?;
        n.clock = clock;
        n.own_clock = true;
        self.propagate_clock(node, clock);
        trace!(?node, ?clock, "clock assigned");
        Ok(())
    }

    /// The clock driving `node`.
    pub fn node_clock(&self, node: NodeId) -> Option<ClockId> {
        self.node_opt(node).map(|n| n.clock)
    }

    /// Current time as seen by `node`.
    pub fn time(&self, node: NodeId) -> Option<f64> {
        self.node_opt(node).map(|n| self.clocks[n.clock.idx()].current_time)
    }

    pub(crate) fn time_of(&self, id: NodeId) -> f64 {
        self.clocks[self.node(id).clock.idx()].current_time
    }

    /// Hand `clock` to every descendant that does not own a clock.
    pub(crate) fn propagate_clock(&mut self, id: NodeId, clock: ClockId) {
        let children = self.children_vec(id);
        for child in children {
            let n = self.node_mut(child);
            if n.own_clock {
                continue;
            }
            n.clock = clock;
            self.propagate_clock(child, clock);
        }
    }
}
