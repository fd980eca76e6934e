// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for lifetime tracking: entry handles, states, and events.

use core::cmp::Ordering;

/// Generational handle for an entry in a [`LifetimeEntryManager`](crate::LifetimeEntryManager).
///
/// A removed entry's handle becomes stale; reusing the slot bumps the generation,
/// so a stale handle never refers to a different entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(u32, u32);

impl EntryId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Entry handles use 32-bit slot indices by design."
    )]
    pub(crate) const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Where an entry sits relative to the last processed time range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Added (or re-queued after a lifetime change) but not yet processed.
    New,
    /// The lifetime contains the current time range.
    Current,
    /// The lifetime starts after the current time range.
    Future,
    /// The lifetime ended at or before the current time range.
    Past,
}

/// Which edge of a lifetime window was crossed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeBoundary {
    /// The lifetime start.
    Start,
    /// The lifetime end.
    End,
}

/// Direction of time when a boundary was crossed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CrossingDirection {
    /// Time moved forward across the boundary.
    Forward,
    /// Time moved backward (rewind) across the boundary.
    Backward,
}

/// Notification emitted by [`LifetimeEntryManager::update`](crate::LifetimeEntryManager::update).
///
/// Alive/dead notifications are queued in the order the transitions happen.
/// Boundary crossings are queued after all transitions of the same update, so a
/// consumer observes each crossing exactly once, in causal order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifetimeEvent<K> {
    /// The entry entered the alive set.
    BecameAlive(K),
    /// The entry left the alive set.
    BecameDead(K),
    /// The entry crossed one of its lifetime boundaries.
    CrossedBoundary {
        /// The entry key.
        key: K,
        /// Which boundary.
        boundary: LifetimeBoundary,
        /// Which direction time moved.
        direction: CrossingDirection,
    },
}

/// Sort key for the future (by start) and past (by end) sets.
///
/// Ties are broken by insertion order so entries with identical lifetimes keep a stable order.
#[derive(Copy, Clone, Debug)]
pub(crate) struct OrderKey {
    pub(crate) time: f64,
    pub(crate) insertion: u64,
    pub(crate) slot: usize,
}

impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.insertion.cmp(&other.insertion))
            .then(self.slot.cmp(&other.slot))
    }
}
