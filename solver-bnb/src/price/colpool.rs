//! Column pool.
//!
//! Keeps generated columns that left the LP or were never admitted, so they
//! can be priced again before a pricer is called.

use super::PriceStore;
use crate::error::BnbResult;
use crate::lp::{ColId, Column, Lp};
use crate::pool::{Pool, PoolEntry, PoolStats, SeparationResult, Verdict};
use crate::settings::PoolSettings;

/// What the pooled columns are priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    /// Reduced cost with respect to the dual solution of a feasible LP.
    Redcost,

    /// Farkas value with respect to the proof of an infeasible LP.
    /// Columns found this way are forced into the LP.
    Farkas,
}

/// Pool of generated columns.
pub struct ColumnPool {
    pool: Pool<Column>,
    settings: PoolSettings,
}

impl ColumnPool {
    /// Create a new column pool.
    pub fn new(settings: PoolSettings) -> BnbResult<Self> {
        let mut pool = Pool::new(settings.age_limit, settings.dedup_eps);
        pool.reserve(settings.initial_capacity)?;
        Ok(Self { pool, settings })
    }

    /// Add a column unless an equal one is pooled.
    ///
    /// Returns the pooled column and whether `col` was a duplicate.
    pub fn add_column(&mut self, col: ColId, lp: &mut Lp) -> BnbResult<(ColId, bool)> {
        self.pool.add_if_new(col, lp.cols_mut())
    }

    /// Add a column known not to be pooled yet.
    pub fn add_new_column(&mut self, col: ColId, lp: &mut Lp) -> BnbResult<()> {
        self.pool.add_unconditional(col, lp.cols_mut())
    }

    /// Remove the pooled column equal to `col`.
    pub fn del_column(&mut self, col: ColId, lp: &mut Lp) -> BnbResult<()> {
        self.pool.remove(col, lp.cols_mut())
    }

    /// Check whether a column equal to `col` is pooled.
    pub fn contains(&self, col: ColId, lp: &Lp) -> BnbResult<bool> {
        self.pool.contains(col, lp.cols())
    }

    /// Price the pooled columns against the current LP.
    ///
    /// Improving columns go to `store`. Only columns not yet priced against
    /// the current LP are examined.
    pub fn price(&mut self, lp: &mut Lp, mode: PricingMode, store: &mut PriceStore) -> BnbResult<SeparationResult> {
        let lp_id = lp.lp_count();
        let tol = self.settings.feas_tol;

        let (cols, view) = lp.split_cols();
        let (result, found) = self.pool.scan(lp_id, cols, |handle, col| {
            if view.contains(handle) {
                return Verdict::InLp;
            }
            let value = match mode {
                PricingMode::Redcost => col.reduced_cost(view.duals),
                PricingMode::Farkas => col.farkas_value(view.farkas),
            };
            if value < -tol {
                Verdict::Useful(value)
            } else {
                Verdict::Useless
            }
        })?;

        let forced = mode == PricingMode::Farkas;
        for (col, value) in found {
            store.add_column(col, value, forced, lp)?;
        }
        Ok(result)
    }

    /// Release every pooled column.
    pub fn clear(&mut self, lp: &mut Lp) -> BnbResult<()> {
        self.pool.clear(lp.cols_mut())
    }

    /// Pooled entries.
    pub fn entries(&self) -> &[PoolEntry<Column>] {
        self.pool.entries()
    }

    /// Number of pooled columns.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &PoolStats {
        self.pool.stats()
    }
}
