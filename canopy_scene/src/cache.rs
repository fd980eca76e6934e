// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memoized values with an explicit validity state.
//!
//! [`Cached`] uses interior mutability so resolved queries on a shared tree can fill
//! caches lazily. It is not `Sync`; the tree that owns it lives on one thread.

use core::cell::Cell;
use core::ops::Deref;

use crate::invalidation::Invalidation;

/// Validity of a [`Cached`] value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// The value must be recomputed before use.
    Invalid,
    /// The value is being recomputed; reads see the previous value.
    Computing,
    /// The value may be reused.
    Valid,
}

/// A memoized value.
///
/// While a recompute is in progress ([`CacheState::Computing`]), [`Cached::get`] returns
/// the last value that was valid instead of recursing into the computation again.
#[derive(Clone, Debug)]
pub struct Cached<T: Copy> {
    state: Cell<CacheState>,
    value: Cell<Option<T>>,
}

impl<T: Copy> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Cached<T> {
    /// An invalid cache with no previous value.
    pub const fn new() -> Self {
        Self {
            state: Cell::new(CacheState::Invalid),
            value: Cell::new(None),
        }
    }

    /// A valid cache holding `value`.
    pub const fn valid(value: T) -> Self {
        Self {
            state: Cell::new(CacheState::Valid),
            value: Cell::new(Some(value)),
        }
    }

    /// Current validity.
    pub fn state(&self) -> CacheState {
        self.state.get()
    }

    /// Whether the stored value may be reused.
    pub fn is_valid(&self) -> bool {
        self.state.get() == CacheState::Valid
    }

    /// Whether a recompute is in progress.
    pub fn is_computing(&self) -> bool {
        self.state.get() == CacheState::Computing
    }

    /// Mark the value stale. Returns `true` only if it was valid.
    ///
    /// Invalidating a cache that is already invalid, or that is being recomputed,
    /// is a no-op and returns `false`.
    pub fn invalidate(&self) -> bool {
        if self.state.get() == CacheState::Valid {
            self.state.set(CacheState::Invalid);
            true
        } else {
            false
        }
    }

    /// Mark the stored value valid again without recomputing it.
    ///
    /// Does nothing if no value was ever stored.
    pub fn validate(&self) {
        if self.value.get().is_some() {
            self.state.set(CacheState::Valid);
        }
    }

    /// Store `value` and mark it valid.
    pub fn set(&self, value: T) {
        self.value.set(Some(value));
        self.state.set(CacheState::Valid);
    }

    /// Enter the computing state, returning the previous value (if any).
    pub fn begin_compute(&self) -> Option<T> {
        self.state.set(CacheState::Computing);
        self.value.get()
    }

    /// Leave the computing state with a freshly computed value.
    pub fn finish(&self, value: T) {
        self.set(value);
    }

    /// The value if it may be read: the current value when valid, the previous value
    /// while computing, `None` when invalid.
    pub fn get(&self) -> Option<T> {
        match self.state.get() {
            CacheState::Invalid => None,
            CacheState::Computing | CacheState::Valid => self.value.get(),
        }
    }

    /// The last stored value regardless of validity.
    pub fn last(&self) -> Option<T> {
        self.value.get()
    }

    /// Return the cached value, recomputing it with `compute` if it is invalid.
    ///
    /// A re-entrant call made while `compute` runs returns the previous value. With no
    /// previous value it falls back to calling `compute` again, so `compute` must not
    /// depend on this cache without one.
    pub fn refresh(&self, compute: impl FnOnce() -> T) -> T {
        if let Some(value) = self.get() {
            return value;
        }
        self.state.set(CacheState::Computing);
        let value = compute();
        self.set(value);
        value
    }
}

/// A [`Cached`] value paired with the invalidation categories it depends on.
#[derive(Clone, Debug)]
pub struct LayoutCell<T: Copy> {
    cache: Cached<T>,
    trigger: Invalidation,
}

impl<T: Copy> LayoutCell<T> {
    /// An invalid cell invalidated by any of `trigger`.
    pub const fn new(trigger: Invalidation) -> Self {
        Self {
            cache: Cached::new(),
            trigger,
        }
    }

    /// The categories that invalidate this cell.
    pub fn trigger(&self) -> Invalidation {
        self.trigger
    }

    /// Invalidate if `mask` intersects the trigger. Returns whether the cell was valid.
    pub fn invalidate_for(&self, mask: Invalidation) -> bool {
        mask.intersects(self.trigger) && self.cache.invalidate()
    }
}

impl<T: Copy> Deref for LayoutCell<T> {
    type Target = Cached<T>;

    fn deref(&self) -> &Cached<T> {
        &self.cache
    }
}
