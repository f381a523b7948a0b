//! LP rows, columns, basis snapshots and the live LP they are loaded into.
//!
//! The numerical LP solve happens elsewhere. This module only tracks which
//! rows and columns are currently loaded, the last installed solution, and
//! the reference counts that decide when a row, column or basis snapshot
//! can be freed.

mod arena;
mod column;
mod row;
mod state;

use std::collections::{HashMap, HashSet};

use sprs::CsVec;

pub use arena::{ArenaItem, Handle, RefArena};
pub use column::Column;
pub use row::{Row, RowSummary};
pub use state::{BasisStatus, LpState};

use crate::error::{BnbError, BnbResult};

/// Handle of a row.
pub type RowId = Handle<Row>;

/// Handle of a column.
pub type ColId = Handle<Column>;

/// Handle of a captured basis snapshot.
pub type LpStateId = Handle<LpState>;

/// Build a sorted sparse vector, rejecting duplicate, out-of-range and
/// non-finite entries.
pub(crate) fn sparse_from_entries(
    dim: usize,
    mut entries: Vec<(usize, f64)>,
    owner: &str,
) -> BnbResult<CsVec<f64>> {
    entries.retain(|&(_, v)| v != 0.0);
    entries.sort_by_key(|&(i, _)| i);

    for pair in entries.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(BnbError::InvalidData(format!(
                "<{}> has duplicate index {}",
                owner, pair[0].0
            )));
        }
    }
    if let Some(&(i, _)) = entries.iter().find(|&&(i, _)| i >= dim) {
        return Err(BnbError::InvalidData(format!(
            "<{}> index {} out of range {}",
            owner, i, dim
        )));
    }
    if entries.iter().any(|&(_, v)| !v.is_finite()) {
        return Err(BnbError::InvalidData(format!(
            "<{}> has a non-finite coefficient",
            owner
        )));
    }

    let (indices, values): (Vec<usize>, Vec<f64>) = entries.into_iter().unzip();
    Ok(CsVec::new(dim, indices, values))
}

pub(crate) fn sparse_norm(v: &CsVec<f64>) -> f64 {
    v.data().iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product of two sorted sparse vectors.
pub(crate) fn sparse_dot(a: &CsVec<f64>, b: &CsVec<f64>) -> f64 {
    let (ai, av) = (a.indices(), a.data());
    let (bi, bv) = (b.indices(), b.data());
    let (mut p, mut q) = (0, 0);
    let mut sum = 0.0;

    while p < ai.len() && q < bi.len() {
        match ai[p].cmp(&bi[q]) {
            std::cmp::Ordering::Less => p += 1,
            std::cmp::Ordering::Greater => q += 1,
            std::cmp::Ordering::Equal => {
                sum += av[p] * bv[q];
                p += 1;
                q += 1;
            }
        }
    }
    sum
}

/// Read-only view of the LP used while scanning a row pool.
pub struct RowView<'a> {
    /// Current primal solution.
    pub primal: &'a [f64],
    positions: &'a HashMap<RowId, usize>,
}

impl RowView<'_> {
    /// Check whether a row is loaded in the LP.
    pub fn contains(&self, row: RowId) -> bool {
        self.positions.contains_key(&row)
    }
}

/// Read-only view of the LP used while scanning a column pool.
pub struct ColView<'a> {
    /// Current dual solution.
    pub duals: &'a [f64],
    /// Current Farkas proof (empty unless the LP is infeasible).
    pub farkas: &'a [f64],
    members: &'a HashSet<ColId>,
}

impl ColView<'_> {
    /// Check whether a column is loaded in the LP.
    pub fn contains(&self, col: ColId) -> bool {
        self.members.contains(&col)
    }
}

/// The live LP relaxation.
pub struct Lp {
    rows: RefArena<Row>,
    cols: RefArena<Column>,
    states: RefArena<LpState>,

    /// Rows loaded in the LP, in LP order. Each holds one use.
    lp_rows: Vec<RowId>,
    row_pos: HashMap<RowId, usize>,

    /// Columns loaded in the LP. Each holds one use.
    lp_cols: Vec<ColId>,
    col_set: HashSet<ColId>,

    primal: Vec<f64>,
    duals: Vec<f64>,
    farkas: Vec<f64>,
    obj_val: f64,

    /// Number of LP solutions installed so far; identifies the current LP.
    lp_count: u64,

    /// Current basis, copied on [`Lp::capture_state`].
    basis: LpState,
}

impl Default for Lp {
    fn default() -> Self {
        Self::new()
    }
}

impl Lp {
    /// Create an empty LP.
    pub fn new() -> Self {
        Self {
            rows: RefArena::new(),
            cols: RefArena::new(),
            states: RefArena::new(),
            lp_rows: Vec::new(),
            row_pos: HashMap::new(),
            lp_cols: Vec::new(),
            col_set: HashSet::new(),
            primal: Vec::new(),
            duals: Vec::new(),
            farkas: Vec::new(),
            obj_val: f64::NEG_INFINITY,
            lp_count: 0,
            basis: LpState::default(),
        }
    }

    // === Registries ===

    /// Register a row. The caller holds the returned use.
    pub fn create_row(&mut self, row: Row) -> RowId {
        self.rows.insert(row)
    }

    /// Register a column. The caller holds the returned use.
    pub fn create_column(&mut self, col: Column) -> ColId {
        self.cols.insert(col)
    }

    /// Register a basis snapshot. The caller holds the returned use.
    pub fn create_state(&mut self, state: LpState) -> LpStateId {
        self.states.insert(state)
    }

    /// Snapshot the current basis. The caller holds the returned use.
    pub fn capture_state(&mut self) -> LpStateId {
        self.states.insert(self.basis.clone())
    }

    /// Replace the current basis.
    pub fn set_basis(&mut self, basis: LpState) {
        self.basis = basis;
    }

    /// Current basis.
    pub fn basis(&self) -> &LpState {
        &self.basis
    }

    /// Row registry.
    pub fn rows(&self) -> &RefArena<Row> {
        &self.rows
    }

    /// Mutable row registry.
    pub fn rows_mut(&mut self) -> &mut RefArena<Row> {
        &mut self.rows
    }

    /// Column registry.
    pub fn cols(&self) -> &RefArena<Column> {
        &self.cols
    }

    /// Mutable column registry.
    pub fn cols_mut(&mut self) -> &mut RefArena<Column> {
        &mut self.cols
    }

    /// Basis snapshot registry.
    pub fn states(&self) -> &RefArena<LpState> {
        &self.states
    }

    /// Mutable basis snapshot registry.
    pub fn states_mut(&mut self) -> &mut RefArena<LpState> {
        &mut self.states
    }

    /// Drop one use of a row.
    pub fn release_row(&mut self, row: RowId) -> BnbResult<()> {
        self.rows.release(row).map(|_| ())
    }

    /// Drop one use of a column.
    pub fn release_column(&mut self, col: ColId) -> BnbResult<()> {
        self.cols.release(col).map(|_| ())
    }

    /// Drop one use of a basis snapshot.
    pub fn release_state(&mut self, state: LpStateId) -> BnbResult<()> {
        self.states.release(state).map(|_| ())
    }

    // === Rows in the LP ===

    /// Append a row to the LP and capture it.
    pub fn add_row(&mut self, row: RowId) -> BnbResult<()> {
        if self.row_pos.contains_key(&row) {
            return Err(BnbError::InvalidData(format!("{:?} is already in the LP", row)));
        }
        self.rows.capture(row)?;
        self.row_pos.insert(row, self.lp_rows.len());
        self.lp_rows.push(row);
        Ok(())
    }

    /// Remove a single row from the LP, keeping the order of the others.
    pub fn remove_row(&mut self, row: RowId) -> BnbResult<()> {
        let pos = self
            .row_pos
            .remove(&row)
            .ok_or_else(|| BnbError::InvalidData(format!("{:?} is not in the LP", row)))?;
        self.lp_rows.remove(pos);
        for (i, r) in self.lp_rows.iter().enumerate().skip(pos) {
            self.row_pos.insert(*r, i);
        }
        self.release_row(row)
    }

    /// Remove all rows from position `n` on.
    pub fn shrink_rows(&mut self, n: usize) -> BnbResult<()> {
        while self.lp_rows.len() > n {
            if let Some(row) = self.lp_rows.pop() {
                self.row_pos.remove(&row);
                self.rows.release(row)?;
            }
        }
        Ok(())
    }

    /// Rows currently in the LP, in LP order.
    pub fn row_ids(&self) -> &[RowId] {
        &self.lp_rows
    }

    /// Number of rows in the LP.
    pub fn n_rows(&self) -> usize {
        self.lp_rows.len()
    }

    /// Check whether a row is loaded in the LP.
    pub fn is_row_in_lp(&self, row: RowId) -> bool {
        self.row_pos.contains_key(&row)
    }

    // === Columns in the LP ===

    /// Add a column to the LP and capture it.
    pub fn add_column(&mut self, col: ColId) -> BnbResult<()> {
        if self.col_set.contains(&col) {
            return Err(BnbError::InvalidData(format!("{:?} is already in the LP", col)));
        }
        self.cols.capture(col)?;
        self.col_set.insert(col);
        self.lp_cols.push(col);
        Ok(())
    }

    /// Columns currently in the LP.
    pub fn col_ids(&self) -> &[ColId] {
        &self.lp_cols
    }

    /// Number of columns in the LP.
    pub fn n_cols(&self) -> usize {
        self.lp_cols.len()
    }

    /// Check whether a column is loaded in the LP.
    pub fn is_column_in_lp(&self, col: ColId) -> bool {
        self.col_set.contains(&col)
    }

    // === Solution ===

    /// Install the solution of a freshly solved LP. Returns the new LP id.
    pub fn install_solution(&mut self, primal: Vec<f64>, duals: Vec<f64>, obj_val: f64) -> u64 {
        self.primal = primal;
        self.duals = duals;
        self.farkas.clear();
        self.obj_val = obj_val;
        self.lp_count += 1;
        self.lp_count
    }

    /// Install a Farkas proof of an infeasible LP. Returns the new LP id.
    pub fn install_farkas(&mut self, farkas: Vec<f64>) -> u64 {
        self.primal.clear();
        self.duals.clear();
        self.farkas = farkas;
        self.obj_val = f64::INFINITY;
        self.lp_count += 1;
        self.lp_count
    }

    /// Identifier of the current LP solution (0 before the first solve).
    pub fn lp_count(&self) -> u64 {
        self.lp_count
    }

    /// Current primal solution.
    pub fn primal(&self) -> &[f64] {
        &self.primal
    }

    /// Current dual solution.
    pub fn duals(&self) -> &[f64] {
        &self.duals
    }

    /// Current Farkas proof.
    pub fn farkas(&self) -> &[f64] {
        &self.farkas
    }

    /// Objective value of the current solution.
    pub fn obj_val(&self) -> f64 {
        self.obj_val
    }

    /// Feasibility of a row at the current primal solution.
    pub fn row_feasibility(&self, row: RowId) -> BnbResult<f64> {
        Ok(self.rows.get(row)?.feasibility(&self.primal))
    }

    /// Split into the mutable row registry and a view of the LP.
    pub fn split_rows(&mut self) -> (&mut RefArena<Row>, RowView<'_>) {
        (
            &mut self.rows,
            RowView {
                primal: &self.primal,
                positions: &self.row_pos,
            },
        )
    }

    /// Split into the mutable column registry and a view of the LP.
    pub fn split_cols(&mut self) -> (&mut RefArena<Column>, ColView<'_>) {
        (
            &mut self.cols,
            ColView {
                duals: &self.duals,
                farkas: &self.farkas,
                members: &self.col_set,
            },
        )
    }

    /// Unload every row and column.
    pub fn clear(&mut self) -> BnbResult<()> {
        self.shrink_rows(0)?;
        for col in std::mem::take(&mut self.lp_cols) {
            self.col_set.remove(&col);
            self.cols.release(col)?;
        }
        Ok(())
    }
}
