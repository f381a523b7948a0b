//! Priority queue of unsolved leaves.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::NodeId;
use crate::settings::NodeSelection;

/// Entry in the leaf queue with priority.
#[derive(Debug, Clone, Copy)]
struct QueuedNode {
    node: NodeId,
    lower_bound: f64,
    seq: u64,
    priority: f64, // Higher = selected first
}

impl PartialEq for QueuedNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedNode {}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then the most recently created node
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Priority queue for leaves.
pub struct NodeQueue {
    /// Node selection strategy.
    strategy: NodeSelection,

    /// Priority queue (max-heap by priority).
    heap: BinaryHeap<QueuedNode>,

    /// Count of nodes popped; drives the hybrid dive rhythm.
    nodes_popped: u64,
}

impl NodeQueue {
    /// Create a new queue with the given strategy.
    pub fn new(strategy: NodeSelection) -> Self {
        Self {
            strategy,
            heap: BinaryHeap::new(),
            nodes_popped: 0,
        }
    }

    /// Add a leaf to the queue.
    pub fn push(&mut self, node: NodeId, lower_bound: f64, depth: usize, seq: u64) {
        let priority = self.compute_priority(lower_bound, depth);
        self.heap.push(QueuedNode {
            node,
            lower_bound,
            seq,
            priority,
        });
    }

    /// Get the next leaf to process.
    pub fn pop(&mut self) -> Option<NodeId> {
        let queued = self.heap.pop()?;
        self.nodes_popped += 1;
        Some(queued.node)
    }

    /// Peek at the next leaf without removing it.
    pub fn peek(&self) -> Option<NodeId> {
        self.heap.peek().map(|q| q.node)
    }

    /// Remove a specific leaf. Returns whether it was queued.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let before = self.heap.len();
        self.heap.retain(|q| q.node != node);
        before != self.heap.len()
    }

    /// Check whether a leaf is queued.
    pub fn contains(&self, node: NodeId) -> bool {
        self.heap.iter().any(|q| q.node == node)
    }

    /// Get the best (lowest) lower bound across all queued leaves.
    ///
    /// Infinity when the queue is empty.
    pub fn best_bound(&self) -> f64 {
        self.heap
            .iter()
            .map(|q| q.lower_bound)
            .fold(f64::INFINITY, f64::min)
    }

    /// Drain all leaves whose lower bound reaches `cutoff`.
    pub fn drain_prunable(&mut self, cutoff: f64) -> Vec<NodeId> {
        let mut pruned = Vec::new();
        let remaining: Vec<QueuedNode> = self
            .heap
            .drain()
            .filter(|q| {
                if q.lower_bound >= cutoff - 1e-9 {
                    pruned.push(q.node);
                    false
                } else {
                    true
                }
            })
            .collect();

        self.heap = remaining.into_iter().collect();
        pruned
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Get the number of leaves in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Compute priority for a leaf based on selection strategy.
    fn compute_priority(&self, lower_bound: f64, depth: usize) -> f64 {
        match self.strategy {
            NodeSelection::BestBound => {
                // Lowest lower bound first (negate for max-heap)
                -lower_bound
            }
            NodeSelection::DepthFirst => {
                // Deepest first
                depth as f64
            }
            NodeSelection::Hybrid { dive_freq } => {
                // Alternate between diving and best-bound
                if dive_freq > 0 && self.nodes_popped % dive_freq as u64 == 0 {
                    depth as f64
                } else {
                    -lower_bound
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> NodeId {
        NodeId {
            index: i,
            generation: 0,
        }
    }

    #[test]
    fn test_best_bound_selection() {
        let mut queue = NodeQueue::new(NodeSelection::BestBound);

        queue.push(id(1), 10.0, 1, 1);
        queue.push(id(2), 5.0, 1, 2);
        queue.push(id(3), 15.0, 1, 3);

        assert_eq!(queue.best_bound(), 5.0);

        // Best bound (lowest) should come first
        assert_eq!(queue.pop(), Some(id(2)));
        assert_eq!(queue.pop(), Some(id(1)));
        assert_eq!(queue.pop(), Some(id(3)));

        assert!(queue.is_empty());
        assert_eq!(queue.best_bound(), f64::INFINITY);
    }

    #[test]
    fn test_depth_first_selection() {
        let mut queue = NodeQueue::new(NodeSelection::DepthFirst);

        queue.push(id(1), 0.0, 0, 1);
        queue.push(id(2), 0.0, 2, 2);
        queue.push(id(3), 0.0, 1, 3);

        // Deepest first
        assert_eq!(queue.pop(), Some(id(2)));
        assert_eq!(queue.pop(), Some(id(3)));
        assert_eq!(queue.pop(), Some(id(1)));
    }

    #[test]
    fn test_ties_prefer_newest() {
        let mut queue = NodeQueue::new(NodeSelection::BestBound);
        queue.push(id(1), 1.0, 1, 1);
        queue.push(id(2), 1.0, 1, 2);
        assert_eq!(queue.peek(), Some(id(2)));
    }

    #[test]
    fn test_pruning() {
        let mut queue = NodeQueue::new(NodeSelection::BestBound);

        for i in 0..5 {
            // 0, 10, 20, 30, 40
            queue.push(id(i), i as f64 * 10.0, 1, i as u64);
        }

        assert_eq!(queue.len(), 5);

        // Prune leaves with bound >= 25
        let pruned = queue.drain_prunable(25.0);
        assert_eq!(pruned.len(), 2); // bounds 30 and 40
        assert_eq!(queue.len(), 3);
        assert!(!queue.contains(id(4)));
    }

    #[test]
    fn test_remove() {
        let mut queue = NodeQueue::new(NodeSelection::BestBound);
        queue.push(id(1), 1.0, 1, 1);
        queue.push(id(2), 2.0, 1, 2);

        assert!(queue.remove(id(1)));
        assert!(!queue.remove(id(1)));
        assert_eq!(queue.pop(), Some(id(2)));
    }
}
