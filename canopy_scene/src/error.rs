// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for misuse of the scene tree.

use thiserror::Error;

use crate::clock::ClockId;
use crate::types::{Axes, NodeId};

/// A precondition violation reported by a [`Tree`](crate::Tree) operation.
///
/// These are programmer errors. They are reported at the offending call and the tree is
/// left unchanged. Internal consistency failures panic instead.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum SceneError {
    /// The id is stale or was never issued by this tree.
    #[error("node {0:?} does not exist")]
    StaleNode(NodeId),
    /// A node cannot become its own child.
    #[error("node {0:?} cannot be added to itself")]
    AddToSelf(NodeId),
    /// The child already belongs to a composite.
    #[error("node {child:?} already belongs to {parent:?}")]
    AlreadyParented {
        /// The node being added.
        child: NodeId,
        /// Its current parent.
        parent: NodeId,
    },
    /// The root composite cannot become anyone's child.
    #[error("root {0:?} cannot be attached to a composite")]
    RootNotAttachable(NodeId),
    /// Adding the child would make a node its own ancestor.
    #[error("adding {child:?} to {parent:?} would create a cycle")]
    Cycle {
        /// The node being added.
        child: NodeId,
        /// The intended parent.
        parent: NodeId,
    },
    /// The operation needs a composite node.
    #[error("node {0:?} is not a composite")]
    NotAComposite(NodeId),
    /// The operation needs a buffered composite node.
    #[error("node {0:?} is not a buffered composite")]
    NotBuffered(NodeId),
    /// The node is not a child of the given composite.
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// The node.
        child: NodeId,
        /// The composite.
        parent: NodeId,
    },
    /// The size of an auto-sized axis was set manually.
    #[error("size of {node:?} cannot be set on auto-sized axes {axes:?}")]
    AutoSizedAxis {
        /// The composite.
        node: NodeId,
        /// The offending axes.
        axes: Axes,
    },
    /// An axis was made both relative to the parent and auto-sized from children.
    #[error("{node:?} cannot be both relatively sized and auto-sized on axes {axes:?}")]
    RelativeAndAutoSized {
        /// The node.
        node: NodeId,
        /// The conflicting axes.
        axes: Axes,
    },
    /// Borders and edge effects require masking.
    #[error("{0:?} needs masking enabled for borders and edge effects")]
    EffectWithoutMasking(NodeId),
    /// Frame buffer configuration changed after first use.
    #[error("frame buffer of {0:?} is already initialised")]
    FrameBufferInitialised(NodeId),
    /// A numeric argument was out of range.
    #[error("invalid value for {what}: {value}")]
    InvalidValue {
        /// Which argument.
        what: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// Children of a lifetime-managed composite stay attached when they die.
    #[error("children of lifetime-managed {0:?} cannot be removed when not alive")]
    LifetimeManagedRemoveWhenNotAlive(NodeId),
    /// The node has already started loading.
    #[error("node {0:?} is already loading or loaded")]
    AlreadyLoaded(NodeId),
    /// The clock does not exist.
    #[error("clock {0:?} does not exist")]
    UnknownClock(ClockId),
}

/// Reject NaN and infinities.
pub(crate) fn finite(what: &'static str, value: f64) -> Result<f64, SceneError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SceneError::InvalidValue { what, value })
    }
}
