//! Error types for the branch-and-bound core.

use thiserror::Error;

use crate::search::NodeType;

/// Errors that can occur in tree, pool and price-store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BnbError {
    /// Operation requires a node of a different type.
    #[error("Node {node} is a {found:?}, expected {expected}")]
    NodeTypeMismatch {
        /// Offending node index.
        node: usize,
        /// Actual node type.
        found: NodeType,
        /// Human readable description of the accepted type(s).
        expected: &'static str,
    },

    /// Children cannot be attached to a leaf.
    #[error("Node {0} is a leaf and cannot have children")]
    LeafParent(usize),

    /// A node still referenced by children was asked to be destroyed.
    #[error("Node {node} still has {children} live children")]
    NodeHasChildren {
        /// Node index.
        node: usize,
        /// Remaining child count.
        children: usize,
    },

    /// More child releases than captures on a parent node.
    #[error("Child count underflow on node {0}")]
    ChildCountUnderflow(usize),

    /// Handle refers to a freed or reused slot.
    #[error("Stale {kind} handle (slot {index})")]
    StaleHandle {
        /// What kind of object the handle names.
        kind: &'static str,
        /// Slot index.
        index: usize,
    },

    /// More releases than captures on a reference-counted object.
    #[error("Reference count underflow on {kind} (slot {index})")]
    RefCountUnderflow {
        /// What kind of object.
        kind: &'static str,
        /// Slot index.
        index: usize,
    },

    /// Modifiable rows/columns cannot be stored in a pool.
    #[error("Cannot store modifiable {0} in a pool")]
    ModifiableEntry(&'static str),

    /// Node is not waiting in the leaf queue.
    #[error("Node {0} is not in the leaf queue")]
    NotInLeafQueue(usize),

    /// Entry is not stored in the pool.
    #[error("{0} is not stored in the pool")]
    NotInPool(String),

    /// Input data is malformed.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Memory could not be reserved.
    #[error("Out of memory while growing {0}")]
    OutOfMemory(&'static str),
}

impl BnbError {
    /// Returns true for errors that signal a bug in the calling code.
    ///
    /// These are never recoverable; a driver receiving one should abort the
    /// solve.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, BnbError::OutOfMemory(_) | BnbError::NotInPool(_))
    }
}

impl From<std::collections::TryReserveError> for BnbError {
    fn from(_: std::collections::TryReserveError) -> Self {
        BnbError::OutOfMemory("array")
    }
}

/// Result type for branch-and-bound core operations.
pub type BnbResult<T> = Result<T, BnbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(BnbError::LeafParent(3).is_usage_error());
        assert!(BnbError::ModifiableEntry("row").is_usage_error());
        assert!(!BnbError::OutOfMemory("pool").is_usage_error());
        assert!(!BnbError::NotInPool("row <c1>".into()).is_usage_error());
    }

    #[test]
    fn test_error_display() {
        let err = BnbError::NodeHasChildren { node: 4, children: 2 };
        assert_eq!(err.to_string(), "Node 4 still has 2 live children");
    }
}
