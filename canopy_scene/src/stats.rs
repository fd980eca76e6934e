// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Optional counters for external observability.

use core::sync::atomic::{AtomicU64, Ordering};

/// A counter the scene reports to a [`StatisticsSink`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatisticsCounter {
    /// Invalidations that changed at least one cache.
    Invalidations,
    /// Cached values recomputed by the update pass.
    Refreshes,
    /// Nodes visited by the update pass.
    NodesUpdated,
    /// Lifetime evaluations performed by life-cycle scans.
    LifetimeChecks,
    /// Scheduled tasks run.
    ScheduledTasks,
    /// Draw nodes built.
    DrawNodesCreated,
    /// Draw nodes reused from an earlier frame.
    DrawNodesReused,
    /// Offscreen buffers re-rendered.
    FrameBufferRedraws,
}

impl StatisticsCounter {
    /// Every counter, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Invalidations,
        Self::Refreshes,
        Self::NodesUpdated,
        Self::LifetimeChecks,
        Self::ScheduledTasks,
        Self::DrawNodesCreated,
        Self::DrawNodesReused,
        Self::FrameBufferRedraws,
    ];

    /// Position of this counter in [`FrameStatistics::take`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Receiver of counter increments.
///
/// Shared between the update and draw threads, so increments take `&self`.
pub trait StatisticsSink: Send + Sync {
    /// Add `amount` to `counter`.
    fn increment(&self, counter: StatisticsCounter, amount: u64);
}

/// A [`StatisticsSink`] backed by atomic counters.
#[derive(Debug, Default)]
pub struct FrameStatistics {
    counters: [AtomicU64; StatisticsCounter::ALL.len()],
}

impl FrameStatistics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `counter`.
    pub fn get(&self, counter: StatisticsCounter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Reset every counter to zero, returning the previous values.
    pub fn take(&self) -> [u64; StatisticsCounter::ALL.len()] {
        StatisticsCounter::ALL.map(|c| self.counters[c.index()].swap(0, Ordering::Relaxed))
    }
}

impl StatisticsSink for FrameStatistics {
    fn increment(&self, counter: StatisticsCounter, amount: u64) {
        self.counters[counter.index()].fetch_add(amount, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let stats = FrameStatistics::new();
        stats.increment(StatisticsCounter::NodesUpdated, 3);
        stats.increment(StatisticsCounter::NodesUpdated, 2);
        stats.increment(StatisticsCounter::FrameBufferRedraws, 1);
        assert_eq!(stats.get(StatisticsCounter::NodesUpdated), 5);

        let taken = stats.take();
        assert_eq!(taken[StatisticsCounter::NodesUpdated.index()], 5);
        assert_eq!(taken[StatisticsCounter::FrameBufferRedraws.index()], 1);
        assert_eq!(stats.get(StatisticsCounter::NodesUpdated), 0);
    }
}
