//! Separation storage.
//!
//! Collects the cuts found in one separation round and decides which of them
//! enter the LP of the focus node.

use std::cmp::Ordering;

use crate::error::BnbResult;
use crate::lp::{Lp, RefArena, Row, RowId};
use crate::search::{NodeId, Tree};

/// A cut waiting in the separation store.
#[derive(Debug, Clone, Copy)]
pub struct StoredCut {
    /// Captured row.
    pub row: RowId,

    /// Violation scaled by the row norm.
    pub efficacy: f64,

    /// Whether the cut enters the LP regardless of the round limit.
    pub forced: bool,
}

/// Sink for the cuts of one separation round.
#[derive(Debug, Default)]
pub struct SepaStore {
    cuts: Vec<StoredCut>,
    n_forced: usize,
}

impl SepaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store and capture a cut. A row that is already stored is ignored.
    pub fn add_cut(
        &mut self,
        rows: &mut RefArena<Row>,
        row: RowId,
        efficacy: f64,
        forced: bool,
    ) -> BnbResult<()> {
        if let Some(stored) = self.cuts.iter_mut().find(|c| c.row == row) {
            if forced && !stored.forced {
                stored.forced = true;
                self.n_forced += 1;
            }
            return Ok(());
        }

        rows.capture(row)?;
        self.cuts.push(StoredCut {
            row,
            efficacy,
            forced,
        });
        if forced {
            self.n_forced += 1;
        }
        Ok(())
    }

    /// Add the forced cuts and the `max_cuts` most efficacious other cuts to
    /// the LP of the focus leaf `node`, then empty the store.
    ///
    /// Returns the number of rows added.
    pub fn apply(&mut self, tree: &mut Tree, node: NodeId, lp: &mut Lp, max_cuts: usize) -> BnbResult<usize> {
        self.cuts.sort_by(|a, b| match (a.forced, b.forced) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => b.efficacy.total_cmp(&a.efficacy),
        });

        // Only non-forced rows that actually enter count against the limit
        let mut applied = 0;
        let mut n_optional = 0;
        let mut result = Ok(());
        for cut in &self.cuts {
            if !cut.forced && n_optional >= max_cuts {
                break;
            }
            if lp.is_row_in_lp(cut.row) {
                continue;
            }
            result = tree.add_row(node, cut.row, lp);
            if result.is_err() {
                break;
            }
            applied += 1;
            if !cut.forced {
                n_optional += 1;
            }
        }

        self.clear(lp)?;
        result?;

        if applied > 0 {
            log::debug!("applied {} cuts at node {}", applied, node.index());
        }
        Ok(applied)
    }

    /// Release every stored cut.
    pub fn clear(&mut self, lp: &mut Lp) -> BnbResult<()> {
        self.n_forced = 0;
        for cut in self.cuts.drain(..) {
            lp.release_row(cut.row)?;
        }
        Ok(())
    }

    /// Stored cuts.
    pub fn cuts(&self) -> &[StoredCut] {
        &self.cuts
    }

    /// Number of forced cuts.
    pub fn n_forced(&self) -> usize {
        self.n_forced
    }

    /// Number of stored cuts.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}
