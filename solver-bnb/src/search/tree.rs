//! Branch-and-bound tree.
//!
//! Nodes live in a generation-checked arena. A node does not own its
//! children; it only counts them. When the last child of a fork or subroot
//! is destroyed the parent is destroyed as well, which frees exhausted
//! subtrees bottom-up.
//!
//! The LP of a node is not stored in full. A leaf or fork stores the rows it
//! added to its parent's LP, a subroot stores its complete row list. The LP
//! of any node is rebuilt by taking the row list of the nearest subroot
//! ancestor (the root counts as an empty one) and replaying the deltas of
//! the forks below it.

use std::mem;

use super::node::{ForkData, LeafData, Node, NodeData, NodeId, NodeType, SubrootData};
use super::{BoundChange, NodeQueue};
use crate::error::{BnbError, BnbResult};
use crate::lp::{Lp, LpStateId, RowId};
use crate::settings::TreeSettings;

/// One operation applied to the LP when switching the focus node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpChange {
    /// Remove all rows from position `new_len` on.
    Shrink {
        /// Number of rows kept.
        new_len: usize,
    },

    /// Append a row.
    Add(RowId),
}

/// Statistics of the tree.
#[derive(Debug, Default, Clone)]
pub struct TreeStats {
    /// Nodes created.
    pub nodes_created: u64,

    /// Nodes destroyed.
    pub nodes_freed: u64,

    /// Leaf to fork conversions.
    pub forks_created: u64,

    /// Fork to subroot conversions.
    pub subroots_created: u64,

    /// Maximal number of nodes alive at the same time.
    pub peak_nodes: usize,
}

struct NodeSlot {
    generation: u32,
    node: Option<Node>,
}

/// Branch-and-bound tree with its leaf queue.
pub struct Tree {
    slots: Vec<NodeSlot>,
    free_slots: Vec<u32>,
    n_nodes: usize,

    root: Option<NodeId>,

    /// Unsolved leaves waiting to be processed.
    leaves: NodeQueue,

    /// Node whose LP is currently loaded.
    focus: Option<NodeId>,

    /// Path from the root to the focus node.
    active_path: Vec<NodeId>,

    next_seq: u64,
    settings: TreeSettings,
    stats: TreeStats,
}

impl Tree {
    /// Create an empty tree.
    pub fn new(settings: TreeSettings) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            n_nodes: 0,
            root: None,
            leaves: NodeQueue::new(settings.node_selection),
            focus: None,
            active_path: Vec::new(),
            next_seq: 0,
            settings,
            stats: TreeStats::default(),
        }
    }

    // === Node access ===

    fn stale(id: NodeId) -> BnbError {
        BnbError::StaleHandle {
            kind: "node",
            index: id.index(),
        }
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> BnbResult<&Node> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or_else(|| Self::stale(id))
    }

    fn node_mut(&mut self, id: NodeId) -> BnbResult<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or_else(|| Self::stale(id))
    }

    /// Check whether the id names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    fn type_mismatch(id: NodeId, found: NodeType, expected: &'static str) -> BnbError {
        BnbError::NodeTypeMismatch {
            node: id.index(),
            found,
            expected,
        }
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        self.n_nodes += 1;
        self.stats.nodes_created += 1;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.n_nodes);

        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(NodeSlot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn take(&mut self, id: NodeId) -> BnbResult<Node> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .ok_or_else(|| Self::stale(id))?;
        let node = slot.node.take().ok_or_else(|| Self::stale(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(id.index);
        self.n_nodes -= 1;
        Ok(node)
    }

    // === Creation and destruction ===

    /// Create the root leaf, capturing `lp_state`.
    pub fn create_root(&mut self, lp_state: LpStateId, lp: &mut Lp) -> BnbResult<NodeId> {
        if self.root.is_some() {
            return Err(BnbError::InvalidData("tree already has a root".into()));
        }
        let id = self.create_node(None, lp_state, lp)?;
        self.root = Some(id);
        Ok(id)
    }

    /// Create a leaf below `parent`, capturing `lp_state`.
    ///
    /// The parent must be a fork or subroot; its child count is increased.
    pub fn create_leaf(&mut self, parent: NodeId, lp_state: LpStateId, lp: &mut Lp) -> BnbResult<NodeId> {
        self.create_node(Some(parent), lp_state, lp)
    }

    fn create_node(&mut self, parent: Option<NodeId>, lp_state: LpStateId, lp: &mut Lp) -> BnbResult<NodeId> {
        let (lower_bound, depth) = match parent {
            Some(p) => {
                let parent_node = self.node(p)?;
                if parent_node.node_type() == NodeType::Leaf {
                    return Err(BnbError::LeafParent(p.index()));
                }
                (parent_node.lower_bound, parent_node.depth + 1)
            }
            None => (f64::NEG_INFINITY, 0),
        };

        lp.states_mut().capture(lp_state)?;
        if let Some(p) = parent {
            self.node_mut(p)?.data.capture_child(p.index())?;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let id = self.allocate(Node {
            data: NodeData::Leaf(LeafData {
                lp_state,
                added_rows: Vec::new(),
            }),
            parent,
            constraints: Vec::new(),
            dom_changes: Vec::new(),
            lower_bound,
            depth,
            active: false,
            seq,
        });
        log::trace!("created leaf {} at depth {}", id.index(), depth);
        Ok(id)
    }

    /// Destroy a node and release everything it captured.
    ///
    /// Fails while the node still has children. If the parent loses its
    /// last child it is destroyed too, up the tree.
    pub fn free_node(&mut self, id: NodeId, lp: &mut Lp) -> BnbResult<()> {
        let children = self.node(id)?.n_children();
        if children > 0 {
            return Err(BnbError::NodeHasChildren {
                node: id.index(),
                children,
            });
        }

        let mut current = id;
        loop {
            let node = self.take(current)?;
            self.leaves.remove(current);
            if self.focus == Some(current) {
                self.focus = None;
            }
            self.active_path.retain(|n| *n != current);
            if self.root == Some(current) {
                self.root = None;
            }
            self.stats.nodes_freed += 1;

            Self::release_payload(node.data, lp)?;
            log::trace!("freed node {} at depth {}", current.index(), node.depth);

            let Some(parent) = node.parent else {
                return Ok(());
            };
            let remaining = self.node_mut(parent)?.data.release_child(parent.index())?;
            if remaining > 0 {
                return Ok(());
            }
            current = parent;
        }
    }

    fn release_payload(data: NodeData, lp: &mut Lp) -> BnbResult<()> {
        match data {
            NodeData::Leaf(leaf) => {
                lp.release_state(leaf.lp_state)?;
                Self::release_rows(leaf.added_rows, lp)
            }
            NodeData::Fork(fork) => Self::release_rows(fork.added_rows, lp),
            NodeData::Subroot(subroot) => Self::release_rows(subroot.rows, lp),
        }
    }

    fn require_focus(&self, id: NodeId) -> BnbResult<()> {
        if self.focus != Some(id) {
            return Err(BnbError::InvalidData(format!(
                "node {} is not the focus node, the loaded LP is not its own",
                id.index()
            )));
        }
        Ok(())
    }

    fn release_rows(rows: Vec<RowId>, lp: &mut Lp) -> BnbResult<()> {
        rows.into_iter().try_for_each(|r| lp.release_row(r))
    }

    // === Type conversion ===

    /// Convert a solved leaf into a fork.
    ///
    /// The added rows move to the fork payload, the warm start basis is
    /// released. A leaf still waiting in the queue is taken out of it.
    pub fn leaf_to_fork(&mut self, id: NodeId, lp: &mut Lp) -> BnbResult<()> {
        let node = self.node_mut(id)?;
        let found = node.node_type();
        let NodeData::Leaf(leaf) = &mut node.data else {
            return Err(Self::type_mismatch(id, found, "leaf"));
        };

        let lp_state = leaf.lp_state;
        let added_rows = mem::take(&mut leaf.added_rows);
        node.data = NodeData::Fork(ForkData {
            added_rows,
            n_children: 0,
        });

        self.leaves.remove(id);
        self.stats.forks_created += 1;
        lp.release_state(lp_state)?;

        log::debug!("node {} converted to fork", id.index());
        Ok(())
    }

    /// Convert a fork into a subroot holding the complete current LP row list.
    ///
    /// The loaded LP must be the one of `id`, so the fork has to be the
    /// focus node.
    pub fn fork_to_subroot(&mut self, id: NodeId, lp: &mut Lp) -> BnbResult<()> {
        let node = self.node(id)?;
        if node.node_type() != NodeType::Fork {
            return Err(Self::type_mismatch(id, node.node_type(), "fork"));
        }
        self.require_focus(id)?;

        let mut rows = Vec::new();
        rows.try_reserve_exact(lp.n_rows())
            .map_err(|_| BnbError::OutOfMemory("subroot rows"))?;
        for &row in lp.row_ids() {
            rows.push(row);
        }
        for &row in &rows {
            lp.rows_mut().capture(row)?;
        }

        let node = self.node_mut(id)?;
        let n_children = node.n_children();
        let old = mem::replace(
            &mut node.data,
            NodeData::Subroot(SubrootData { rows, n_children }),
        );

        self.stats.subroots_created += 1;
        if let NodeData::Fork(fork) = old {
            Self::release_rows(fork.added_rows, lp)?;
        }

        log::debug!(
            "node {} converted to subroot with {} rows",
            id.index(),
            lp.n_rows()
        );
        Ok(())
    }

    /// Convert a freshly solved leaf into a fork, and further into a
    /// subroot if needed.
    ///
    /// A subroot is required when the LP is not the parent's LP plus the
    /// rows recorded at this leaf (rows were removed or reordered), and
    /// chosen by the subroot policy when replaying deltas gets too long.
    pub fn promote_solved(&mut self, id: NodeId, lp: &mut Lp) -> BnbResult<NodeType> {
        let node = self.node(id)?;
        if node.node_type() != NodeType::Leaf {
            return Err(Self::type_mismatch(id, node.node_type(), "leaf"));
        }
        self.require_focus(id)?;

        let mut expected = match node.parent {
            Some(parent) => self.lp_rows(parent)?,
            None => Vec::new(),
        };
        expected.extend_from_slice(node.added_rows());
        let pure_extension = expected.as_slice() == lp.row_ids();

        self.leaf_to_fork(id, lp)?;

        let (fork_chain, delta_rows) = self.delta_chain(id)?;
        let flatten = !pure_extension
            || self
                .settings
                .subroot_policy
                .should_flatten(fork_chain, delta_rows, lp.n_rows());

        if flatten {
            self.fork_to_subroot(id, lp)?;
            Ok(NodeType::Subroot)
        } else {
            Ok(NodeType::Fork)
        }
    }

    /// Number of non-subroot nodes and delta rows between `id` (inclusive)
    /// and its nearest subroot ancestor.
    pub fn delta_chain(&self, id: NodeId) -> BnbResult<(usize, usize)> {
        let mut chain = 0;
        let mut delta_rows = 0;
        let mut current = Some(id);

        while let Some(c) = current {
            let node = self.node(c)?;
            if node.node_type() == NodeType::Subroot {
                break;
            }
            chain += 1;
            delta_rows += node.added_rows().len();
            current = node.parent;
        }
        Ok((chain, delta_rows))
    }

    // === Node content ===

    /// Add a row to the LP at the focus leaf and record it in the leaf.
    pub fn add_row(&mut self, id: NodeId, row: RowId, lp: &mut Lp) -> BnbResult<()> {
        if self.focus != Some(id) {
            return Err(BnbError::InvalidData(format!(
                "rows can only be added at the focus node, not node {}",
                id.index()
            )));
        }
        let node = self.node(id)?;
        if node.node_type() != NodeType::Leaf {
            return Err(Self::type_mismatch(id, node.node_type(), "leaf"));
        }

        lp.add_row(row)?;
        lp.rows_mut().capture(row)?;
        if let NodeData::Leaf(leaf) = &mut self.node_mut(id)?.data {
            leaf.added_rows.push(row);
        }
        Ok(())
    }

    /// Record a domain change at a node.
    pub fn add_domain_change(&mut self, id: NodeId, change: BoundChange) -> BnbResult<()> {
        if change.is_infeasible() {
            return Err(BnbError::InvalidData(format!(
                "empty domain for variable {} at node {}",
                change.var,
                id.index()
            )));
        }
        self.node_mut(id)?.dom_changes.push(change);
        Ok(())
    }

    /// Store the active constraint list snapshot of a node.
    pub fn set_constraints(&mut self, id: NodeId, constraints: Vec<usize>) -> BnbResult<()> {
        self.node_mut(id)?.constraints = constraints;
        Ok(())
    }

    /// Raise the lower bound of a leaf. Returns the effective bound.
    ///
    /// Bounds never decrease, so a child's bound never drops below its
    /// parent's.
    pub fn update_lower_bound(&mut self, id: NodeId, bound: f64) -> BnbResult<f64> {
        if bound.is_nan() {
            return Err(BnbError::InvalidData("NaN lower bound".into()));
        }
        let node = self.node_mut(id)?;
        if node.node_type() != NodeType::Leaf {
            return Err(Self::type_mismatch(id, node.node_type(), "leaf"));
        }
        if bound <= node.lower_bound {
            return Ok(node.lower_bound);
        }

        node.lower_bound = bound;
        let (depth, seq) = (node.depth, node.seq);
        if self.leaves.remove(id) {
            self.leaves.push(id, bound, depth, seq);
        }
        Ok(bound)
    }

    /// Lower bound of a node.
    pub fn node_lower_bound(&self, id: NodeId) -> BnbResult<f64> {
        Ok(self.node(id)?.lower_bound)
    }

    // === LP reconstruction ===

    /// Rows of the LP of `id`, in LP order.
    ///
    /// The rows of a leaf include those recorded at the leaf itself.
    pub fn lp_rows(&self, id: NodeId) -> BnbResult<Vec<RowId>> {
        let mut deltas: Vec<&[RowId]> = Vec::new();
        let mut base: &[RowId] = &[];
        let mut current = Some(id);

        while let Some(c) = current {
            let node = self.node(c)?;
            if let Some(rows) = node.subroot_rows() {
                base = rows;
                break;
            }
            deltas.push(node.added_rows());
            current = node.parent;
        }

        let total = base.len() + deltas.iter().map(|d| d.len()).sum::<usize>();
        let mut rows = Vec::with_capacity(total);
        rows.extend_from_slice(base);
        for delta in deltas.iter().rev() {
            rows.extend_from_slice(delta);
        }
        Ok(rows)
    }

    /// Make `id` the focus node and load its LP.
    ///
    /// Rows shared with the currently loaded LP as a common prefix stay;
    /// the rest is shrunk away and the missing rows are appended. A leaf's
    /// warm start basis becomes the LP basis. Returns the applied changes.
    pub fn focus(&mut self, id: NodeId, lp: &mut Lp) -> BnbResult<Vec<LpChange>> {
        let target = self.lp_rows(id)?;
        let warm_start = match self.node(id)?.lp_state() {
            Some(state) => Some(lp.states().get(state)?.clone()),
            None => None,
        };

        let common = target
            .iter()
            .zip(lp.row_ids())
            .take_while(|(a, b)| a == b)
            .count();

        let mut changes = Vec::new();
        if common < lp.n_rows() {
            lp.shrink_rows(common)?;
            changes.push(LpChange::Shrink { new_len: common });
        }
        for &row in &target[common..] {
            lp.add_row(row)?;
            changes.push(LpChange::Add(row));
        }
        if let Some(basis) = warm_start {
            lp.set_basis(basis);
        }

        self.set_active_path(id)?;
        self.focus = Some(id);
        log::trace!(
            "focus on node {}: kept {} rows, {} changes",
            id.index(),
            common,
            changes.len()
        );
        Ok(changes)
    }

    fn set_active_path(&mut self, id: NodeId) -> BnbResult<()> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            path.push(c);
            current = self.node(c)?.parent;
        }
        path.reverse();

        for old in mem::take(&mut self.active_path) {
            if let Ok(node) = self.node_mut(old) {
                node.active = false;
            }
        }
        for &n in &path {
            self.node_mut(n)?.active = true;
        }
        self.active_path = path;
        Ok(())
    }

    /// Node whose LP is loaded.
    pub fn focus_node(&self) -> Option<NodeId> {
        self.focus
    }

    /// Path from the root to the focus node.
    pub fn active_path(&self) -> &[NodeId] {
        &self.active_path
    }

    // === Leaf queue ===

    /// Queue a leaf for processing.
    pub fn insert_leaf(&mut self, id: NodeId) -> BnbResult<()> {
        let node = self.node(id)?;
        if node.node_type() != NodeType::Leaf {
            return Err(Self::type_mismatch(id, node.node_type(), "leaf"));
        }
        if !self.leaves.contains(id) {
            let (bound, depth, seq) = (node.lower_bound, node.depth, node.seq);
            self.leaves.push(id, bound, depth, seq);
        }
        Ok(())
    }

    /// Take a leaf out of the queue without processing it.
    pub fn remove_leaf(&mut self, id: NodeId) -> BnbResult<()> {
        if self.leaves.remove(id) {
            Ok(())
        } else {
            Err(BnbError::NotInLeafQueue(id.index()))
        }
    }

    /// Pop the next leaf according to the selection strategy.
    pub fn pop_best_leaf(&mut self) -> Option<NodeId> {
        self.leaves.pop()
    }

    /// Next leaf according to the selection strategy.
    pub fn peek_best_leaf(&self) -> Option<NodeId> {
        self.leaves.peek()
    }

    /// Lowest lower bound of all queued leaves (infinity if none).
    pub fn best_bound(&self) -> f64 {
        self.leaves.best_bound()
    }

    /// Number of queued leaves.
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Destroy every queued leaf whose bound reaches `cutoff`.
    pub fn prune_leaves(&mut self, cutoff: f64, lp: &mut Lp) -> BnbResult<usize> {
        let pruned = self.leaves.drain_prunable(cutoff);
        for &id in &pruned {
            self.free_node(id, lp)?;
        }
        if !pruned.is_empty() {
            log::debug!("pruned {} leaves at cutoff {:.6e}", pruned.len(), cutoff);
        }
        Ok(pruned.len())
    }

    // === Whole tree ===

    /// Root node.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of live nodes.
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Ids of all live nodes.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.node.is_some())
            .map(|(i, s)| NodeId {
                index: i as u32,
                generation: s.generation,
            })
            .collect()
    }

    /// Release every node regardless of child counts.
    pub fn clear(&mut self, lp: &mut Lp) -> BnbResult<()> {
        for id in self.node_ids() {
            let node = self.take(id)?;
            self.stats.nodes_freed += 1;
            Self::release_payload(node.data, lp)?;
        }
        self.leaves = NodeQueue::new(self.settings.node_selection);
        self.root = None;
        self.focus = None;
        self.active_path.clear();
        Ok(())
    }

    /// Tree statistics.
    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Tree settings.
    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }
}
