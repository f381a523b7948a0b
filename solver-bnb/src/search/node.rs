//! Search node representation.

use crate::error::{BnbError, BnbResult};
use crate::lp::{LpStateId, RowId};

/// Identifier of a node in the search tree.
///
/// Carries a generation so that ids of destroyed nodes are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index of the node.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Representation of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Unsolved node holding a warm start basis.
    Leaf,

    /// Solved node whose LP only added rows to its parent's LP.
    Fork,

    /// Solved node storing its complete LP row list.
    Subroot,
}

/// A bound change from branching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundChange {
    /// Variable index.
    pub var: usize,

    /// Previous lower bound.
    pub old_lb: f64,

    /// Previous upper bound.
    pub old_ub: f64,

    /// New lower bound.
    pub new_lb: f64,

    /// New upper bound.
    pub new_ub: f64,
}

impl BoundChange {
    /// Create a "down" branch: x <= floor(value).
    pub fn down_branch(var: usize, old_lb: f64, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            old_lb,
            old_ub,
            new_lb: old_lb,
            new_ub: value.floor(),
        }
    }

    /// Create an "up" branch: x >= ceil(value).
    pub fn up_branch(var: usize, old_lb: f64, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            old_lb,
            old_ub,
            new_lb: value.ceil(),
            new_ub: old_ub,
        }
    }

    /// Check if the bound change creates an empty domain.
    pub fn is_infeasible(&self) -> bool {
        self.new_lb > self.new_ub + 1e-9
    }
}

/// Payload of an unsolved node.
#[derive(Debug)]
pub struct LeafData {
    /// Captured warm start basis.
    pub(crate) lp_state: LpStateId,

    /// Rows added to the LP at this node (captured).
    pub(crate) added_rows: Vec<RowId>,
}

/// Payload of a solved node that only added rows.
#[derive(Debug)]
pub struct ForkData {
    /// Rows added to the LP at this node (captured).
    pub(crate) added_rows: Vec<RowId>,

    /// Number of live children.
    pub(crate) n_children: usize,
}

/// Payload of a solved node with a full LP snapshot.
#[derive(Debug)]
pub struct SubrootData {
    /// All LP rows in LP order (captured).
    pub(crate) rows: Vec<RowId>,

    /// Number of live children.
    pub(crate) n_children: usize,
}

/// Type specific node payload.
#[derive(Debug)]
pub enum NodeData {
    /// Leaf payload.
    Leaf(LeafData),

    /// Fork payload.
    Fork(ForkData),

    /// Subroot payload.
    Subroot(SubrootData),
}

impl NodeData {
    /// Type tag of the payload.
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::Leaf(_) => NodeType::Leaf,
            NodeData::Fork(_) => NodeType::Fork,
            NodeData::Subroot(_) => NodeType::Subroot,
        }
    }

    /// Rows this node adds relative to its parent (none for subroots).
    pub fn added_rows(&self) -> &[RowId] {
        match self {
            NodeData::Leaf(leaf) => &leaf.added_rows,
            NodeData::Fork(fork) => &fork.added_rows,
            NodeData::Subroot(_) => &[],
        }
    }

    /// Live child count (zero for leaves).
    pub fn n_children(&self) -> usize {
        match self {
            NodeData::Leaf(_) => 0,
            NodeData::Fork(fork) => fork.n_children,
            NodeData::Subroot(subroot) => subroot.n_children,
        }
    }

    /// Register a new child. Leaves cannot have children.
    pub(crate) fn capture_child(&mut self, node: usize) -> BnbResult<()> {
        match self {
            NodeData::Leaf(_) => Err(BnbError::LeafParent(node)),
            NodeData::Fork(fork) => {
                fork.n_children += 1;
                Ok(())
            }
            NodeData::Subroot(subroot) => {
                subroot.n_children += 1;
                Ok(())
            }
        }
    }

    /// Unregister a child. Returns the remaining child count.
    pub(crate) fn release_child(&mut self, node: usize) -> BnbResult<usize> {
        let count = match self {
            NodeData::Leaf(_) => return Err(BnbError::LeafParent(node)),
            NodeData::Fork(fork) => &mut fork.n_children,
            NodeData::Subroot(subroot) => &mut subroot.n_children,
        };
        if *count == 0 {
            return Err(BnbError::ChildCountUnderflow(node));
        }
        *count -= 1;
        Ok(*count)
    }
}

/// A node in the B&B search tree.
#[derive(Debug)]
pub struct Node {
    /// Type specific payload.
    pub(crate) data: NodeData,

    /// Parent node (None for the root). Not owning.
    pub(crate) parent: Option<NodeId>,

    /// Snapshot of the active constraint list.
    pub(crate) constraints: Vec<usize>,

    /// Domain changes applied at this node.
    pub(crate) dom_changes: Vec<BoundChange>,

    /// Lower (dual) bound of the subtree.
    pub(crate) lower_bound: f64,

    /// Depth in the tree (0 for root).
    pub(crate) depth: usize,

    /// Whether the node is on the path to the focus node.
    pub(crate) active: bool,

    /// Creation number; breaks ties in the leaf queue.
    pub(crate) seq: u64,
}

impl Node {
    /// Type of the node.
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    /// Type specific payload.
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Lower bound of the subtree.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Depth in the tree.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the node lies on the active path.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Domain changes applied at this node.
    pub fn dom_changes(&self) -> &[BoundChange] {
        &self.dom_changes
    }

    /// Snapshot of the active constraints.
    pub fn constraints(&self) -> &[usize] {
        &self.constraints
    }

    /// Live child count.
    pub fn n_children(&self) -> usize {
        self.data.n_children()
    }

    /// Rows added at this node (leaf and fork).
    pub fn added_rows(&self) -> &[RowId] {
        self.data.added_rows()
    }

    /// Full row snapshot of a subroot.
    pub fn subroot_rows(&self) -> Option<&[RowId]> {
        match &self.data {
            NodeData::Subroot(subroot) => Some(&subroot.rows),
            _ => None,
        }
    }

    /// Warm start basis of a leaf.
    pub fn lp_state(&self) -> Option<LpStateId> {
        match &self.data {
            NodeData::Leaf(leaf) => Some(leaf.lp_state),
            _ => None,
        }
    }

    /// Check if this node can be pruned by a cutoff bound.
    ///
    /// A node can be pruned if its lower bound >= cutoff.
    pub fn can_prune(&self, cutoff: f64) -> bool {
        self.lower_bound >= cutoff - 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork() -> NodeData {
        NodeData::Fork(ForkData {
            added_rows: Vec::new(),
            n_children: 0,
        })
    }

    #[test]
    fn test_bound_changes() {
        // Down branch on x with value 2.7: x <= 2
        let down = BoundChange::down_branch(0, 0.0, 5.0, 2.7);
        assert_eq!(down.new_lb, 0.0);
        assert_eq!(down.new_ub, 2.0);
        assert!(!down.is_infeasible());

        // Up branch on x with value 2.7: x >= 3
        let up = BoundChange::up_branch(0, 0.0, 5.0, 2.7);
        assert_eq!(up.new_lb, 3.0);
        assert_eq!(up.new_ub, 5.0);
        assert!(!up.is_infeasible());

        // Infeasible bound change
        let bad = BoundChange::down_branch(0, 3.0, 5.0, 2.7);
        assert!(bad.is_infeasible()); // new_ub = 2 < new_lb = 3
    }

    #[test]
    fn test_child_counting() {
        let mut data = fork();
        data.capture_child(1).unwrap();
        data.capture_child(1).unwrap();
        assert_eq!(data.n_children(), 2);

        assert_eq!(data.release_child(1).unwrap(), 1);
        assert_eq!(data.release_child(1).unwrap(), 0);
        assert_eq!(data.release_child(1), Err(BnbError::ChildCountUnderflow(1)));
    }

    #[test]
    fn test_subroot_keeps_child_count() {
        let mut data = NodeData::Subroot(SubrootData {
            rows: Vec::new(),
            n_children: 3,
        });
        assert_eq!(data.node_type(), NodeType::Subroot);
        assert!(data.added_rows().is_empty());
        assert_eq!(data.release_child(0).unwrap(), 2);
    }
}
