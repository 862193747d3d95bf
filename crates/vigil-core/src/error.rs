#![forbid(unsafe_code)]

use thiserror::Error;

use crate::graph::NodeId;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Structural errors raised by [`crate::graph::Graph`] accessors.
///
/// These are programming or staleness errors (a handle outliving its node, a
/// key lookup on an array node), never data errors: traversal over malformed
/// data is handled by the engine, which degrades to `error` leaves instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("no node with id {id}")]
    MissingNode { id: NodeId },

    #[error("node {id} is not an object")]
    NotAnObject { id: NodeId },

    #[error("node {id} is not an array")]
    NotAnArray { id: NodeId },

    #[error("index {index} out of bounds for array {id} of length {len}")]
    IndexOutOfBounds { id: NodeId, index: usize, len: usize },
}
