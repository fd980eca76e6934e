// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Lifetime: time-sorted lifetime tracking for large, sparsely alive sets.
//!
//! Each entry carries a lifetime window `[start, end)`. An entry is *alive* at time `t`
//! when `start <= t < end`. The manager keeps:
//!
//! - a set of entries whose lifetime is still ahead, ordered by start time,
//! - a set of entries whose lifetime is behind, ordered by end time,
//! - a flat list of alive entries.
//!
//! An update only inspects the alive list and the near ends of the two sets, so it scales
//! with the number of alive entries and transitions, not with the total entry count.
//! Time may move backwards (rewind); entries then leave the past set the same way they
//! leave the future set going forwards.
//!
//! Every transition queues a [`LifetimeEvent`]. Boundary crossings are queued after all
//! alive/dead events of the same update. [`LifetimeEntryManager::update_with`] feeds events
//! to a handler that may itself add or re-time entries; those changes are processed by a
//! follow-up pass at the same time instead of re-entering the update.
//!
//! # Example
//!
//! ```rust
//! use canopy_lifetime::{LifetimeEntryManager, LifetimeEvent};
//!
//! let mut lifetimes = LifetimeEntryManager::new();
//! let id = lifetimes.add("intro", 10.0, 20.0);
//!
//! assert!(!lifetimes.update(5.0));
//! assert!(lifetimes.update(15.0));
//! assert_eq!(lifetimes.alive().collect::<Vec<_>>(), ["intro"]);
//! assert!(lifetimes.drain_events().any(|e| e == LifetimeEvent::BecameAlive("intro")));
//!
//! assert!(lifetimes.update(25.0));
//! assert_eq!(lifetimes.alive().count(), 0);
//! assert!(lifetimes.contains(id));
//! ```
//!
//! ### Float semantics
//!
//! Lifetimes must not be NaN. Debug builds assert. Infinite bounds are fine and are the
//! usual way to express "always alive".

#![no_std]

extern crate alloc;

pub mod manager;
pub mod types;

pub use manager::LifetimeEntryManager;
pub use types::{CrossingDirection, EntryId, EntryState, LifetimeBoundary, LifetimeEvent};
