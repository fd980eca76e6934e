// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-keyed context handed to nodes when they load.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SceneError;
use crate::tree::Tree;
use crate::types::NodeId;

/// A set of shared values keyed by type.
///
/// Cloning is cheap; inserting into a clone copies the table once and leaves the
/// original untouched. The scene never interprets the contents.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl core::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dependencies")
            .field("len", &self.values.len())
            .finish_non_exhaustive()
    }
}

impl Dependencies {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// This set plus `value`, replacing any previous value of the same type.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Insert `value`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Borrow the value of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        let value = self.values.get(&TypeId::of::<T>())?;
        (**value).downcast_ref::<T>()
    }

    /// Share the value of type `T`.
    pub fn get_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.values.get(&TypeId::of::<T>())?;
        Arc::clone(value).downcast::<T>().ok()
    }

    /// Whether a value of type `T` is present.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Tree {
    /// Give `node` and its subtree a different dependency set than their ancestors.
    ///
    /// Only affects nodes that load afterwards.
    pub fn set_dependencies(
        &mut self,
        node: NodeId,
        dependencies: Dependencies,
    ) -> Result<(), SceneError> {
        self.try_node_mut(node)?.dependencies = Some(dependencies);
        Ok(())
    }

    /// The dependency set `node` loads with: the nearest override on the path to the
    /// root, or the tree-wide set.
    pub fn dependencies_for(&self, node: NodeId) -> Option<&Dependencies> {
        let mut cursor = Some(self.node_opt(node)?);
        while let Some(n) = cursor {
            if let Some(deps) = n.dependencies.as_ref() {
                return Some(deps);
            }
            cursor = n.parent.map(|p| self.node(p));
        }
        Some(&self.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Skin(&'static str);

    #[test]
    fn typed_lookup() {
        let deps = Dependencies::new().with(Skin("dark")).with(42_u32);
        assert_eq!(deps.get::<Skin>(), Some(&Skin("dark")));
        assert_eq!(deps.get::<u32>(), Some(&42));
        assert_eq!(deps.get::<i64>(), None);
        assert_eq!(deps.len(), 2);
        assert_eq!(*deps.get_arc::<u32>().unwrap(), 42);
    }

    #[test]
    fn clones_are_independent() {
        let base = Dependencies::new().with(1_u8);
        let derived = base.clone().with(Skin("light"));
        assert!(!base.contains::<Skin>());
        assert!(derived.contains::<Skin>());
        assert!(derived.contains::<u8>());
    }
}
