//! Branch-and-bound session.
//!
//! Bundles the tree, the live LP, the cut and column pools and the round
//! stores. A driver owning the LP solver, the separators and the pricers
//! steps through the search with these methods:
//!
//! 1. [`BranchAndBound::start`] creates the root leaf.
//! 2. [`BranchAndBound::next_node`] selects a leaf and loads its LP.
//! 3. After solving, [`BranchAndBound::install_solution`] records the result
//!    and raises the leaf's bound.
//! 4. Separation and pricing rounds add rows and columns.
//! 5. [`BranchAndBound::branch`] or [`BranchAndBound::finish_node`] closes
//!    the node.

use std::time::Instant;

use crate::cuts::{CutPool, SepaStore};
use crate::error::{BnbError, BnbResult};
use crate::incumbent::Incumbent;
use crate::lp::{ColId, Lp, LpStateId, RowId};
use crate::pool::{PoolStats, SeparationResult};
use crate::price::{ColumnPool, PriceRoundResult, PriceStore, PricingMode};
use crate::search::{BoundChange, NodeId, NodeType, Tree, TreeStats};
use crate::settings::BnbSettings;

/// Branch-and-bound session.
pub struct BranchAndBound {
    tree: Tree,
    lp: Lp,
    cut_pool: CutPool,
    col_pool: ColumnPool,
    sepa: SepaStore,
    price: PriceStore,

    /// Incumbent solution tracker.
    pub incumbent: Incumbent,

    /// Nodes taken from the leaf queue and processed.
    nodes_processed: u64,

    /// Leaves discarded by the cutoff bound.
    nodes_pruned: u64,

    /// Rows added by separation rounds.
    cuts_added: u64,

    /// Columns added by pricing rounds.
    cols_added: u64,

    start_time: Option<Instant>,
    settings: BnbSettings,
}

/// Statistics of a session.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Nodes processed.
    pub nodes_processed: u64,

    /// Leaves pruned by the cutoff bound.
    pub nodes_pruned: u64,

    /// Leaves waiting in the queue.
    pub nodes_open: usize,

    /// Rows added by separation.
    pub cuts_added: u64,

    /// Columns added by pricing.
    pub cols_added: u64,

    /// Lowest bound of the open leaves.
    pub best_bound: f64,

    /// Objective value of the incumbent.
    pub incumbent_obj: f64,

    /// Relative gap.
    pub gap: f64,

    /// Tree statistics.
    pub tree: TreeStats,

    /// Cut pool statistics.
    pub cut_pool: PoolStats,

    /// Column pool statistics.
    pub col_pool: PoolStats,

    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
}

impl BranchAndBound {
    /// Create a session around an LP holding the initial rows and columns.
    pub fn new(settings: BnbSettings, lp: Lp) -> BnbResult<Self> {
        Ok(Self {
            tree: Tree::new(settings.tree.clone()),
            lp,
            cut_pool: CutPool::new(settings.cut_pool.clone())?,
            col_pool: ColumnPool::new(settings.col_pool.clone())?,
            sepa: SepaStore::new(),
            price: PriceStore::new(settings.price_store.clone()),
            incumbent: Incumbent::new(),
            nodes_processed: 0,
            nodes_pruned: 0,
            cuts_added: 0,
            cols_added: 0,
            start_time: None,
            settings,
        })
    }

    /// Create the root leaf and queue it.
    ///
    /// Rows already in the LP become the root's base rows.
    pub fn start(&mut self) -> BnbResult<NodeId> {
        self.start_time = Some(Instant::now());

        // Base rows move from the bare LP into the root leaf
        let base_rows: Vec<RowId> = self.lp.row_ids().to_vec();
        for &row in &base_rows {
            self.lp.rows_mut().capture(row)?;
        }
        self.lp.shrink_rows(0)?;

        let state = self.lp.capture_state();
        let root = self.tree.create_root(state, &mut self.lp);
        self.lp.release_state(state)?;
        let root = root?;

        self.tree.focus(root, &mut self.lp)?;
        for row in base_rows {
            self.tree.add_row(root, row, &mut self.lp)?;
            self.lp.release_row(row)?;
        }
        self.tree.insert_leaf(root)?;

        if self.settings.verbose {
            log::info!(
                "B&B started: {} base rows, {} columns",
                self.lp.n_rows(),
                self.lp.n_cols()
            );
        }
        Ok(root)
    }

    /// Select the next leaf and load its LP.
    ///
    /// Leaves that can no longer beat the incumbent are destroyed on the
    /// way. Returns `None` when the search is exhausted.
    pub fn next_node(&mut self) -> BnbResult<Option<NodeId>> {
        let cutoff = self.incumbent.cutoff();
        while let Some(node) = self.tree.pop_best_leaf() {
            if self.tree.node(node)?.can_prune(cutoff) {
                self.tree.free_node(node, &mut self.lp)?;
                self.nodes_pruned += 1;
                continue;
            }

            self.tree.focus(node, &mut self.lp)?;
            self.nodes_processed += 1;
            self.log_progress();
            return Ok(Some(node));
        }
        Ok(None)
    }

    /// Record the solution of the focus LP and raise the node bound.
    ///
    /// Returns the id of the installed LP.
    pub fn install_solution(&mut self, node: NodeId, primal: Vec<f64>, duals: Vec<f64>, obj: f64) -> BnbResult<u64> {
        let lp_id = self.lp.install_solution(primal, duals, obj);
        self.tree.update_lower_bound(node, obj)?;
        Ok(lp_id)
    }

    /// Record a Farkas proof for an infeasible focus LP.
    pub fn install_farkas(&mut self, farkas: Vec<f64>) -> u64 {
        self.lp.install_farkas(farkas)
    }

    /// Hand a freshly separated cut to the current round and pool it.
    ///
    /// The caller keeps its own use of `row`. Modifiable rows are not pooled.
    pub fn add_cut(&mut self, row: RowId, forced: bool) -> BnbResult<()> {
        let stored = if self.lp.rows().get(row)?.is_modifiable() {
            row
        } else {
            self.cut_pool.add_row(row, &mut self.lp)?.0
        };
        let efficacy = self.lp.rows().get(stored)?.efficacy(self.lp.primal());
        self.sepa.add_cut(self.lp.rows_mut(), stored, efficacy, forced)
    }

    /// Run one separation round at the focus leaf.
    ///
    /// Pooled cuts violated by the current solution join the cuts handed in
    /// by [`BranchAndBound::add_cut`]; the best of them enter the LP.
    /// Returns the number of rows added.
    pub fn separation_round(&mut self, node: NodeId) -> BnbResult<usize> {
        let result = self.cut_pool.separate(&mut self.lp, &mut self.sepa)?;
        if result == SeparationResult::NotRun && self.sepa.is_empty() {
            return Ok(0);
        }

        let added = self
            .sepa
            .apply(&mut self.tree, node, &mut self.lp, self.settings.max_cuts_per_round)?;
        self.cuts_added += added as u64;
        Ok(added)
    }

    /// Hand a freshly priced column to the current round and pool it.
    pub fn add_priced_column(&mut self, col: ColId, red_cost: f64, forced: bool) -> BnbResult<()> {
        let stored = if self.lp.cols().get(col)?.is_modifiable() {
            col
        } else {
            self.col_pool.add_column(col, &mut self.lp)?.0
        };
        self.price.add_column(stored, red_cost, forced, &mut self.lp)
    }

    /// Run one pricing round: price the pool, then admit the best columns.
    pub fn price_round(&mut self, mode: PricingMode) -> BnbResult<PriceRoundResult> {
        self.col_pool.price(&mut self.lp, mode, &mut self.price)?;
        let max_cols = self.settings.price_store.max_cols;
        let result = self.price.select_best(&mut self.lp, max_cols)?;
        self.cols_added += result.n_added as u64;
        Ok(result)
    }

    /// Branch on the solved focus leaf.
    ///
    /// Every entry of `children` lists the domain changes of one child. The
    /// children share a snapshot of the current basis and are queued. A
    /// leaf without children is closed with [`BranchAndBound::finish_node`].
    pub fn branch(&mut self, node: NodeId, children: &[Vec<BoundChange>]) -> BnbResult<Vec<NodeId>> {
        if children.is_empty() {
            return Err(BnbError::InvalidData(format!(
                "branching on node {} without children",
                node.index()
            )));
        }
        let kind = self.tree.promote_solved(node, &mut self.lp)?;
        if kind == NodeType::Subroot {
            log::debug!("node {} stored as subroot", node.index());
        }

        let state = self.lp.capture_state();
        let created = self.create_children(node, state, children);
        self.lp.release_state(state)?;
        created
    }

    fn create_children(&mut self, node: NodeId, state: LpStateId, children: &[Vec<BoundChange>]) -> BnbResult<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(children.len());
        for changes in children {
            let child = self.tree.create_leaf(node, state, &mut self.lp)?;
            for change in changes {
                self.tree.add_domain_change(child, *change)?;
            }
            self.tree.insert_leaf(child)?;
            ids.push(child);
        }
        Ok(ids)
    }

    /// Close a processed leaf that is not branched on (infeasible, pruned by
    /// bound or integral).
    pub fn finish_node(&mut self, node: NodeId) -> BnbResult<()> {
        self.tree.free_node(node, &mut self.lp)
    }

    /// Report a feasible solution.
    ///
    /// If it improves the incumbent, queued leaves that cannot beat it are
    /// destroyed. Returns whether the incumbent improved.
    pub fn report_incumbent(&mut self, x: &[f64], obj: f64) -> BnbResult<bool> {
        if !self.incumbent.update(x, obj) {
            return Ok(false);
        }

        let pruned = self.tree.prune_leaves(obj, &mut self.lp)?;
        self.nodes_pruned += pruned as u64;

        if self.settings.verbose {
            log::info!("New incumbent: obj={:.6e}, pruned {} nodes", obj, pruned);
        }
        Ok(true)
    }

    /// Release every node, pooled entry and LP row.
    pub fn clear(&mut self) -> BnbResult<()> {
        self.sepa.clear(&mut self.lp)?;
        self.price.clear(&mut self.lp)?;
        self.tree.clear(&mut self.lp)?;
        self.cut_pool.clear(&mut self.lp)?;
        self.col_pool.clear(&mut self.lp)?;
        self.lp.clear()
    }

    /// Search tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Live LP.
    pub fn lp(&self) -> &Lp {
        &self.lp
    }

    /// Mutable live LP, for registering rows and columns.
    pub fn lp_mut(&mut self) -> &mut Lp {
        &mut self.lp
    }

    /// Cut pool.
    pub fn cut_pool(&self) -> &CutPool {
        &self.cut_pool
    }

    /// Column pool.
    pub fn col_pool(&self) -> &ColumnPool {
        &self.col_pool
    }

    /// Get the best dual bound.
    pub fn best_bound(&self) -> f64 {
        self.tree.best_bound()
    }

    /// Get the current optimality gap.
    pub fn gap(&self) -> f64 {
        self.incumbent.gap(self.best_bound())
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Log progress (if verbose).
    pub fn log_progress(&self) {
        if !self.settings.verbose {
            return;
        }
        if self.settings.log_freq == 0 || self.nodes_processed % self.settings.log_freq != 0 {
            return;
        }

        log::info!(
            "Nodes: {} ({} open, {} alive) | Bound: {:.6e} | Incumbent: {:.6e} | Gap: {:.2}% | Cuts: {} | Cols: {} | Time: {:.1}s",
            self.nodes_processed,
            self.tree.n_leaves(),
            self.tree.n_nodes(),
            self.best_bound(),
            self.incumbent.obj_val,
            self.gap() * 100.0,
            self.cuts_added,
            self.cols_added,
            self.elapsed_ms() as f64 / 1000.0,
        );
    }

    /// Get statistics for display.
    pub fn stats(&self) -> SolveStats {
        SolveStats {
            nodes_processed: self.nodes_processed,
            nodes_pruned: self.nodes_pruned,
            nodes_open: self.tree.n_leaves(),
            cuts_added: self.cuts_added,
            cols_added: self.cols_added,
            best_bound: self.best_bound(),
            incumbent_obj: self.incumbent.obj_val,
            gap: self.gap(),
            tree: self.tree.stats().clone(),
            cut_pool: self.cut_pool.stats().clone(),
            col_pool: self.col_pool.stats().clone(),
            elapsed_ms: self.elapsed_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::Row;

    #[test]
    fn test_start_and_exhaust() {
        let mut bnb = BranchAndBound::new(BnbSettings::default(), Lp::new()).unwrap();
        let root = bnb.start().unwrap();

        assert_eq!(bnb.next_node().unwrap(), Some(root));
        bnb.finish_node(root).unwrap();
        assert_eq!(bnb.next_node().unwrap(), None);
        assert_eq!(bnb.tree().n_nodes(), 0);
    }

    #[test]
    fn test_base_rows_belong_to_root() {
        let mut lp = Lp::new();
        let row = lp.create_row(Row::new("base", 2, vec![(0, 1.0)], 0.0, 1.0).unwrap());
        lp.add_row(row).unwrap();
        lp.release_row(row).unwrap();

        let mut bnb = BranchAndBound::new(BnbSettings::default(), lp).unwrap();
        let root = bnb.start().unwrap();
        assert_eq!(bnb.tree().lp_rows(root).unwrap(), vec![row]);
        assert_eq!(bnb.lp().row_ids(), &[row]);
        // LP + root leaf
        assert_eq!(bnb.lp().rows().nuses(row).unwrap(), 2);
    }

    #[test]
    fn test_incumbent_prunes_leaves() {
        let mut bnb = BranchAndBound::new(BnbSettings::default(), Lp::new()).unwrap();
        let root = bnb.start().unwrap();
        bnb.next_node().unwrap();
        bnb.install_solution(root, vec![0.5], vec![], 1.0).unwrap();

        let down = BoundChange::down_branch(0, 0.0, 1.0, 0.5);
        let up = BoundChange::up_branch(0, 0.0, 1.0, 0.5);
        let children = bnb.branch(root, &[vec![down], vec![up]]).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(bnb.tree().n_leaves(), 2);

        // Both children inherit bound 1.0, an incumbent at 1.0 closes them
        assert!(bnb.report_incumbent(&[0.0], 1.0).unwrap());
        assert_eq!(bnb.tree().n_nodes(), 0);
        assert_eq!(bnb.stats().nodes_pruned, 2);
        assert_eq!(bnb.next_node().unwrap(), None);
    }

    #[test]
    fn test_branch_without_children_rejected() {
        let mut bnb = BranchAndBound::new(BnbSettings::default(), Lp::new()).unwrap();
        let root = bnb.start().unwrap();
        bnb.next_node().unwrap();

        assert!(matches!(bnb.branch(root, &[]), Err(BnbError::InvalidData(_))));
        assert_eq!(bnb.tree().node(root).unwrap().node_type(), NodeType::Leaf);

        bnb.finish_node(root).unwrap();
        assert_eq!(bnb.tree().n_nodes(), 0);
    }
}
