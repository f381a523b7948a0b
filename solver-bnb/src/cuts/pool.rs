//! Cut pool.
//!
//! Keeps cuts that were removed from the LP or never entered it, so they
//! can be separated again cheaply at later nodes.

use super::SepaStore;
use crate::error::BnbResult;
use crate::lp::{Lp, Row, RowId};
use crate::pool::{Pool, PoolEntry, PoolStats, SeparationResult, Verdict};
use crate::settings::PoolSettings;

/// Pool of globally valid cuts.
pub struct CutPool {
    pool: Pool<Row>,
    settings: PoolSettings,
}

impl CutPool {
    /// Create a new cut pool.
    pub fn new(settings: PoolSettings) -> BnbResult<Self> {
        let mut pool = Pool::new(settings.age_limit, settings.dedup_eps);
        pool.reserve(settings.initial_capacity)?;
        Ok(Self { pool, settings })
    }

    /// Add a cut unless an equal one is pooled.
    ///
    /// Returns the pooled row and whether `row` was a duplicate.
    pub fn add_row(&mut self, row: RowId, lp: &mut Lp) -> BnbResult<(RowId, bool)> {
        let (stored, duplicate) = self.pool.add_if_new(row, lp.rows_mut())?;
        if duplicate {
            log::trace!("{:?} duplicates pooled {:?}", row, stored);
        }
        Ok((stored, duplicate))
    }

    /// Add a cut known not to be pooled yet.
    pub fn add_new_row(&mut self, row: RowId, lp: &mut Lp) -> BnbResult<()> {
        self.pool.add_unconditional(row, lp.rows_mut())
    }

    /// Remove the pooled cut equal to `row`.
    pub fn del_row(&mut self, row: RowId, lp: &mut Lp) -> BnbResult<()> {
        self.pool.remove(row, lp.rows_mut())
    }

    /// Check whether a cut equal to `row` is pooled.
    pub fn contains(&self, row: RowId, lp: &Lp) -> BnbResult<bool> {
        self.pool.contains(row, lp.rows())
    }

    /// Pool entry of the cut equal to `row`.
    pub fn entry(&self, row: RowId, lp: &Lp) -> BnbResult<Option<&PoolEntry<Row>>> {
        self.pool.get_entry(row, lp.rows())
    }

    /// Separate the current LP solution with the pooled cuts.
    ///
    /// Only cuts not yet checked against the current LP are examined.
    /// Violated cuts go to `sepa` with their efficacy.
    pub fn separate(&mut self, lp: &mut Lp, sepa: &mut SepaStore) -> BnbResult<SeparationResult> {
        let lp_id = lp.lp_count();
        let feas_tol = self.settings.feas_tol;

        let (rows, view) = lp.split_rows();
        let (result, found) = self.pool.scan(lp_id, rows, |handle, row| {
            if view.contains(handle) {
                return Verdict::InLp;
            }
            if row.feasibility(view.primal) < -feas_tol {
                Verdict::Useful(row.efficacy(view.primal))
            } else {
                Verdict::Useless
            }
        })?;

        for (row, efficacy) in found {
            sepa.add_cut(lp.rows_mut(), row, efficacy, false)?;
        }
        Ok(result)
    }

    /// Release every pooled cut.
    pub fn clear(&mut self, lp: &mut Lp) -> BnbResult<()> {
        self.pool.clear(lp.rows_mut())
    }

    /// Pooled entries.
    pub fn entries(&self) -> &[PoolEntry<Row>] {
        self.pool.entries()
    }

    /// Number of pooled cuts.
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
