//! Branch-and-bound search tree management.

mod node;
mod queue;
mod tree;

pub use node::{BoundChange, ForkData, LeafData, Node, NodeData, NodeId, NodeType, SubrootData};
pub use queue::NodeQueue;
pub use tree::{LpChange, Tree, TreeStats};
