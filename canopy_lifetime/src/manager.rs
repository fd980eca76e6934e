// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The lifetime entry manager: sorted future/past sets plus an active list.

use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;

use crate::types::{
    CrossingDirection, EntryId, EntryState, LifetimeBoundary, LifetimeEvent, OrderKey,
};

#[derive(Clone, Debug)]
struct Entry<K> {
    generation: u32,
    key: K,
    start: f64,
    end: f64,
    state: EntryState,
    insertion: u64,
}

impl<K> Entry<K> {
    fn start_key(&self, slot: usize) -> OrderKey {
        OrderKey {
            time: self.start,
            insertion: self.insertion,
            slot,
        }
    }

    fn end_key(&self, slot: usize) -> OrderKey {
        OrderKey {
            time: self.end,
            insertion: self.insertion,
            slot,
        }
    }

    /// State of this entry for the time range `[start_time, end_time]`.
    ///
    /// ```text
    ///                 [-----------Entry-----------]
    /// [----Range----] |                           |                 (future)
    ///   [----Range----]                           |                 (current)
    ///                 |             [----Range----]                 (current)
    ///                 |                           [----Range----]   (past)
    /// ```
    fn state_at(&self, start_time: f64, end_time: f64) -> EntryState {
        if end_time < self.start {
            EntryState::Future
        } else if start_time >= self.end {
            EntryState::Past
        } else {
            EntryState::Current
        }
    }
}

/// Tracks lifetimes of many entries, re-evaluating only entries near the current time.
///
/// Entries that will come alive later live in a set ordered by lifetime start, entries
/// that were alive earlier in a set ordered by lifetime end, and alive entries in a flat
/// list. An update only walks the alive list and the boundary-proximate ends of the two
/// sets, so its cost is proportional to the number of alive entries plus the number of
/// transitions, not to the total number of entries.
#[derive(Debug)]
pub struct LifetimeEntryManager<K> {
    entries: Vec<Option<Entry<K>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    new_entries: Vec<usize>,
    active: Vec<usize>,
    future: BTreeSet<OrderKey>,
    past: BTreeSet<OrderKey>,
    events: VecDeque<LifetimeEvent<K>>,
    crossings: VecDeque<LifetimeEvent<K>>,
    next_insertion: u64,
    needs_update: bool,
    checks: u64,
}

impl<K: Copy> Default for LifetimeEntryManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy> LifetimeEntryManager<K> {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            new_entries: Vec::new(),
            active: Vec::new(),
            future: BTreeSet::new(),
            past: BTreeSet::new(),
            events: VecDeque::new(),
            crossings: VecDeque::new(),
            next_insertion: 0,
            needs_update: false,
            checks: 0,
        }
    }

    /// Add an entry with lifetime `[start, end)`. It is classified on the next update.
    pub fn add(&mut self, key: K, start: f64, end: f64) -> EntryId {
        debug_assert!(!start.is_nan() && !end.is_nan(), "lifetimes must not be NaN");
        self.next_insertion += 1;
        let insertion = self.next_insertion;
        let entry = |generation| Entry {
            generation,
            key,
            start,
            end,
            state: EntryState::New,
            insertion,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.entries[idx] = Some(entry(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(Some(entry(generation)));
            self.generations.push(generation);
            (self.entries.len() - 1, generation)
        };
        self.new_entries.push(idx);
        self.needs_update = true;
        EntryId::new(idx, generation)
    }

    /// Remove an entry. Returns `false` if the handle is stale.
    ///
    /// Removing an alive entry queues a [`LifetimeEvent::BecameDead`].
    pub fn remove(&mut self, id: EntryId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let slot = id.idx();
        let (state, key, start_key, end_key) = (
            entry.state,
            entry.key,
            entry.start_key(slot),
            entry.end_key(slot),
        );
        match state {
            EntryState::New => self.new_entries.retain(|s| *s != slot),
            EntryState::Current => {
                self.active.retain(|s| *s != slot);
                self.events.push_back(LifetimeEvent::BecameDead(key));
            }
            // Past/future entries may sit in the new list after a lifetime change.
            EntryState::Future => {
                if !self.future.remove(&start_key) {
                    self.new_entries.retain(|s| *s != slot);
                }
            }
            EntryState::Past => {
                if !self.past.remove(&end_key) {
                    self.new_entries.retain(|s| *s != slot);
                }
            }
        }
        self.entries[slot] = None;
        self.free_list.push(slot);
        true
    }

    /// Remove all entries, queueing [`LifetimeEvent::BecameDead`] for every alive one.
    pub fn clear(&mut self) {
        for slot in self.active.drain(..) {
            if let Some(entry) = self.entries[slot].as_ref() {
                self.events.push_back(LifetimeEvent::BecameDead(entry.key));
            }
        }
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            if entry.take().is_some() {
                self.free_list.push(slot);
            }
        }
        self.new_entries.clear();
        self.future.clear();
        self.past.clear();
        self.crossings.clear();
    }

    /// Change the lifetime of an entry. Returns `false` if the handle is stale.
    ///
    /// Entries waiting in the future/past sets are pulled out (their sort key is about to
    /// change) and re-queued, so the next update re-classifies them. Alive entries are
    /// re-checked by the next update anyway.
    pub fn set_lifetime(&mut self, id: EntryId, start: f64, end: f64) -> bool {
        debug_assert!(!start.is_nan() && !end.is_nan(), "lifetimes must not be NaN");
        let slot = id.idx();
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let (state, start_key, end_key) = (entry.state, entry.start_key(slot), entry.end_key(slot));
        let requeue = match state {
            EntryState::Future => self.future.remove(&start_key),
            EntryState::Past => self.past.remove(&end_key),
            EntryState::New | EntryState::Current => false,
        };
        if requeue {
            self.new_entries.push(slot);
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.start = start;
            entry.end = end;
        }
        self.needs_update = true;
        true
    }

    /// Lifetime `(start, end)` of an entry, if the handle is live.
    pub fn lifetime(&self, id: EntryId) -> Option<(f64, f64)> {
        self.entry(id).map(|e| (e.start, e.end))
    }

    /// Current classification of an entry, if the handle is live.
    pub fn state(&self, id: EntryId) -> Option<EntryState> {
        self.entry(id).map(|e| e.state)
    }

    /// The key an entry was added with, if the handle is live.
    pub fn key(&self, id: EntryId) -> Option<K> {
        self.entry(id).map(|e| e.key)
    }

    /// Whether `id` refers to a live entry.
    pub fn contains(&self, id: EntryId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    /// Whether no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the currently alive entries, in the order they became alive.
    pub fn alive(&self) -> impl Iterator<Item = K> + '_ {
        self.active
            .iter()
            .filter_map(|slot| self.entries[*slot].as_ref().map(|e| e.key))
    }

    /// Number of entry evaluations performed by the last update.
    pub fn last_update_checks(&self) -> u64 {
        self.checks
    }

    /// Whether an entry was added or changed since the last update.
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Update entries at a single point in time. Returns whether the alive set changed.
    pub fn update(&mut self, time: f64) -> bool {
        self.update_range(time, time)
    }

    /// Update entries for the time range `[start_time, end_time]`.
    ///
    /// An entry is alive if its lifetime overlaps the range. Returns whether the alive set
    /// changed. Events are queued; take them with [`Self::drain_events`].
    pub fn update_range(&mut self, start_time: f64, end_time: f64) -> bool {
        let end_time = end_time.max(start_time);
        self.needs_update = false;
        self.checks = 0;

        let mut changed = false;

        let new_entries = core::mem::take(&mut self.new_entries);
        for slot in new_entries {
            self.checks += 1;
            changed |= self.update_entry(slot, start_time, end_time, true, true);
        }

        // Entries coming alive as time moves forward.
        while let Some(first) = self.future.first().copied() {
            self.checks += 1;
            if self.state_of(first.slot, start_time, end_time) == EntryState::Future {
                break;
            }
            self.future.remove(&first);
            changed |= self.update_entry(first.slot, start_time, end_time, false, true);
        }

        // Entries coming alive as time moves backward.
        while let Some(last) = self.past.last().copied() {
            self.checks += 1;
            if self.state_of(last.slot, start_time, end_time) == EntryState::Past {
                break;
            }
            self.past.remove(&last);
            changed |= self.update_entry(last.slot, start_time, end_time, false, true);
        }

        // Entries dying in either direction.
        for i in 0..self.active.len() {
            self.checks += 1;
            let slot = self.active[i];
            changed |= self.update_entry(slot, start_time, end_time, false, false);
        }
        let entries = &self.entries;
        self.active.retain(|slot| {
            entries[*slot]
                .as_ref()
                .is_some_and(|e| e.state == EntryState::Current)
        });

        self.events.extend(self.crossings.drain(..));

        changed
    }

    /// Update at `time`, feeding every queued event to `handler`.
    ///
    /// The handler may add, remove, or re-time entries. Those changes are processed by a
    /// further update at the same `time` after the current events are drained, so every
    /// resulting transition is observed once, in causal order, without re-entrant updates.
    pub fn update_with<F>(&mut self, time: f64, mut handler: F) -> bool
    where
        F: FnMut(&mut Self, LifetimeEvent<K>),
    {
        let mut changed = self.update(time);
        loop {
            if let Some(event) = self.events.pop_front() {
                handler(self, event);
                continue;
            }
            if !self.needs_update {
                break;
            }
            changed |= self.update(time);
        }
        changed
    }

    /// Take all queued events, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = LifetimeEvent<K>> + '_ {
        self.events.drain(..)
    }

    /// Whether any events are queued.
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    // --- internals ---

    fn entry(&self, id: EntryId) -> Option<&Entry<K>> {
        let e = self.entries.get(id.idx())?.as_ref()?;
        (e.generation == id.generation()).then_some(e)
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry<K>> {
        let e = self.entries.get_mut(id.idx())?.as_mut()?;
        (e.generation == id.generation()).then_some(e)
    }

    fn state_of(&self, slot: usize, start_time: f64, end_time: f64) -> EntryState {
        self.entries[slot]
            .as_ref()
            .expect("sorted sets only hold live slots")
            .state_at(start_time, end_time)
    }

    fn insert_sorted(&mut self, slot: usize, state: EntryState) {
        let Some(entry) = self.entries[slot].as_ref() else {
            return;
        };
        match state {
            EntryState::Future => {
                self.future.insert(entry.start_key(slot));
            }
            EntryState::Past => {
                self.past.insert(entry.end_key(slot));
            }
            EntryState::New | EntryState::Current => {}
        }
    }

    /// Re-classify one entry. Returns whether it entered or left the alive set.
    ///
    /// `is_new` marks entries coming from the new list, which must be put back into a
    /// sorted set even when their state is unchanged. `mutate_active` is false while the
    /// caller iterates the active list itself.
    fn update_entry(
        &mut self,
        slot: usize,
        start_time: f64,
        end_time: f64,
        is_new: bool,
        mutate_active: bool,
    ) -> bool {
        let Some(entry) = self.entries[slot].as_ref() else {
            return false;
        };
        let old_state = entry.state;
        let key = entry.key;
        let new_state = entry.state_at(start_time, end_time);

        if new_state == old_state {
            if is_new {
                self.insert_sorted(slot, new_state);
            } else {
                debug_assert_eq!(new_state, EntryState::Current, "only alive entries are re-checked");
            }
            return false;
        }

        let mut alive_changed = false;
        if new_state == EntryState::Current {
            if mutate_active {
                self.active.push(slot);
            }
            self.events.push_back(LifetimeEvent::BecameAlive(key));
            alive_changed = true;
        } else if old_state == EntryState::Current {
            if mutate_active {
                self.active.retain(|s| *s != slot);
            }
            self.events.push_back(LifetimeEvent::BecameDead(key));
            alive_changed = true;
        }

        if let Some(entry) = self.entries[slot].as_mut() {
            entry.state = new_state;
        }
        self.insert_sorted(slot, new_state);
        self.queue_crossings(key, old_state, new_state);

        alive_changed
    }

    fn queue_crossings(&mut self, key: K, old_state: EntryState, new_state: EntryState) {
        use CrossingDirection::{Backward, Forward};
        use LifetimeBoundary::{End, Start};

        let mut cross = |boundary, direction| {
            self.crossings.push_back(LifetimeEvent::CrossedBoundary {
                key,
                boundary,
                direction,
            });
        };
        match old_state {
            EntryState::Future => {
                cross(Start, Forward);
                if new_state == EntryState::Past {
                    cross(End, Forward);
                }
            }
            EntryState::Current => {
                if new_state == EntryState::Past {
                    cross(End, Forward);
                } else {
                    cross(Start, Backward);
                }
            }
            EntryState::Past => {
                cross(End, Backward);
                if new_state == EntryState::Future {
                    cross(Start, Backward);
                }
            }
            EntryState::New => {}
        }
    }
}
