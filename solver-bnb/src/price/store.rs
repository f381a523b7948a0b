//! Price store.
//!
//! Collects the columns priced in one round, scores them, and admits the
//! best ones to the LP. Columns too parallel to an already admitted column
//! are penalized so that one round admits diverse columns. Nothing survives
//! the end of a round.

use crate::error::{BnbError, BnbResult};
use crate::lp::{ColId, Column, Lp, RefArena};
use crate::settings::PriceStoreSettings;

/// A column waiting in the price store.
#[derive(Debug, Clone, Copy)]
pub struct PricedColumn {
    /// Captured column.
    pub col: ColId,

    /// Reduced cost (or Farkas value) it was priced with.
    pub red_cost: f64,

    /// Improvement scaled by the column norm.
    pub efficacy: f64,

    /// Parallelism to the objective axis.
    pub objparal: f64,

    /// Minimal orthogonality to the columns admitted this round.
    pub orthogonality: f64,

    /// Whether a selected column was too parallel to this one.
    pub parallel: bool,

    /// Combined score; higher is selected first.
    pub score: f64,
}

/// Result of [`PriceStore::select_best`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PriceRoundResult {
    /// Columns added to the LP.
    pub n_added: usize,

    /// Forced columns among them.
    pub n_forced: usize,

    /// Columns of the round with a sufficiently negative reduced cost.
    pub n_efficacious: usize,
}

/// Price store for one pricing round.
pub struct PriceStore {
    /// Columns admitted regardless of score.
    forced: Vec<PricedColumn>,

    /// Other columns, sorted by descending score.
    cols: Vec<PricedColumn>,

    /// Columns admitted this round; captured until the round ends.
    selected: Vec<PricedColumn>,

    n_efficacious: usize,
    settings: PriceStoreSettings,
}

impl PriceStore {
    /// Create an empty store.
    pub fn new(settings: PriceStoreSettings) -> Self {
        Self {
            forced: Vec::new(),
            cols: Vec::new(),
            selected: Vec::new(),
            n_efficacious: 0,
            settings,
        }
    }

    fn contains(&self, col: ColId) -> bool {
        self.forced
            .iter()
            .chain(&self.cols)
            .chain(&self.selected)
            .any(|c| c.col == col)
    }

    /// Store and capture a priced column. A column already stored is ignored.
    pub fn add_column(&mut self, col: ColId, red_cost: f64, forced: bool, lp: &mut Lp) -> BnbResult<()> {
        if self.contains(col) {
            return Ok(());
        }

        let column = lp.cols().get(col)?;
        let efficacy = if column.norm() > 1e-12 {
            -red_cost / column.norm()
        } else {
            -red_cost
        };
        let mut priced = PricedColumn {
            col,
            red_cost,
            efficacy,
            objparal: column.objective_parallelism(),
            orthogonality: 1.0,
            parallel: false,
            score: 0.0,
        };
        priced.score = score(&self.settings, &priced);

        let target = if forced { &mut self.forced } else { &mut self.cols };
        target
            .try_reserve(1)
            .map_err(|_| BnbError::OutOfMemory("price store"))?;
        lp.cols_mut().capture(col)?;

        if red_cost < -self.settings.red_cost_tol {
            self.n_efficacious += 1;
        }
        if forced {
            self.forced.push(priced);
        } else {
            let pos = self.cols.partition_point(|c| c.score >= priced.score);
            self.cols.insert(pos, priced);
        }
        Ok(())
    }

    /// Update the remaining columns after `selected` was admitted.
    ///
    /// Each column keeps its minimal orthogonality to the admitted set;
    /// columns below the minimal orthogonality are penalized.
    pub fn update_orthogonality(&mut self, selected: ColId, cols: &RefArena<Column>) -> BnbResult<()> {
        let selected = cols.get(selected)?;
        let min_orth = self.settings.min_col_orth;

        let settings = &self.settings;
        for c in &mut self.cols {
            let orth = selected.orthogonality(cols.get(c.col)?);
            c.orthogonality = c.orthogonality.min(orth);
            if orth < min_orth {
                c.parallel = true;
            }
            c.score = score(settings, c);
        }
        self.cols.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(())
    }

    /// Add the forced columns and up to `max_cols` best other columns to the
    /// LP, then empty the store.
    pub fn select_best(&mut self, lp: &mut Lp, max_cols: usize) -> BnbResult<PriceRoundResult> {
        let result = self.admit(lp, max_cols);
        self.clear(lp)?;
        let result = result?;

        log::debug!(
            "price store admitted {} columns ({} forced, {} efficacious)",
            result.n_added,
            result.n_forced,
            result.n_efficacious
        );
        Ok(result)
    }

    fn admit(&mut self, lp: &mut Lp, max_cols: usize) -> BnbResult<PriceRoundResult> {
        let mut result = PriceRoundResult {
            n_efficacious: self.n_efficacious,
            ..Default::default()
        };

        for i in 0..self.forced.len() {
            let col = self.forced[i].col;
            if lp.is_column_in_lp(col) {
                continue;
            }
            lp.add_column(col)?;
            self.update_orthogonality(col, lp.cols())?;
            result.n_added += 1;
            result.n_forced += 1;
        }

        let mut n_selected = 0;
        while n_selected < max_cols && !self.cols.is_empty() {
            let best = self.cols.remove(0);
            if lp.is_column_in_lp(best.col) {
                continue;
            }
            log::trace!("admitting {:?} with score {:.6e}", best.col, best.score);
            lp.add_column(best.col)?;
            self.selected.push(best);
            self.update_orthogonality(best.col, lp.cols())?;
            n_selected += 1;
            result.n_added += 1;
        }
        Ok(result)
    }

    /// Release every stored column.
    pub fn clear(&mut self, lp: &mut Lp) -> BnbResult<()> {
        self.n_efficacious = 0;
        let stored: Vec<PricedColumn> = self
            .forced
            .drain(..)
            .chain(self.cols.drain(..))
            .chain(self.selected.drain(..))
            .collect();
        for c in stored {
            lp.release_column(c.col)?;
        }
        Ok(())
    }

    /// Unselected non-forced columns, in selection order.
    pub fn columns(&self) -> &[PricedColumn] {
        &self.cols
    }

    /// Number of stored columns.
    pub fn len(&self) -> usize {
        self.forced.len() + self.cols.len() + self.selected.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of efficacious columns stored this round.
    pub fn n_efficacious(&self) -> usize {
        self.n_efficacious
    }
}

fn score(settings: &PriceStoreSettings, c: &PricedColumn) -> f64 {
    let score = settings.efficacy_weight * c.efficacy
        + settings.objparal_weight * c.objparal
        + settings.ortho_weight * c.orthogonality;
    if c.parallel {
        score - settings.parallel_penalty
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(lp: &mut Lp, name: &str, obj: f64, entries: Vec<(usize, f64)>) -> ColId {
        lp.create_column(Column::new(name, obj, 0.0, f64::INFINITY, 3, entries).unwrap())
    }

    #[test]
    fn test_columns_sorted_by_score() {
        let mut lp = Lp::new();
        let mut store = PriceStore::new(PriceStoreSettings::default());

        let a = column(&mut lp, "a", 1.0, vec![(0, 1.0)]);
        let b = column(&mut lp, "b", 1.0, vec![(1, 1.0)]);
        let c = column(&mut lp, "c", 1.0, vec![(2, 1.0)]);
        store.add_column(a, -0.5, false, &mut lp).unwrap();
        store.add_column(b, -2.0, false, &mut lp).unwrap();
        store.add_column(c, -1.0, false, &mut lp).unwrap();
        store.add_column(c, -1.0, false, &mut lp).unwrap();

        let order: Vec<ColId> = store.columns().iter().map(|p| p.col).collect();
        assert_eq!(order, vec![b, c, a]);
        assert_eq!(store.n_efficacious(), 3);
        assert_eq!(lp.cols().nuses(c).unwrap(), 2);
    }

    #[test]
    fn test_parallel_column_penalized() {
        let mut lp = Lp::new();
        let settings = PriceStoreSettings::default().with_min_col_orth(0.5);
        let mut store = PriceStore::new(settings);

        let best = column(&mut lp, "best", 1.0, vec![(0, 1.0), (1, 1.0)]);
        let twin = column(&mut lp, "twin", 1.0, vec![(0, 2.0), (1, 2.0)]);
        let other = column(&mut lp, "other", 1.0, vec![(2, 1.0)]);
        store.add_column(best, -3.0, false, &mut lp).unwrap();
        store.add_column(twin, -2.8, false, &mut lp).unwrap();
        store.add_column(other, -0.2, false, &mut lp).unwrap();

        let result = store.select_best(&mut lp, 2).unwrap();
        assert_eq!(result.n_added, 2);
        assert!(lp.is_column_in_lp(best));
        assert!(lp.is_column_in_lp(other));
        assert!(!lp.is_column_in_lp(twin));

        // Round over: only the LP and the caller hold columns
        assert!(store.is_empty());
        assert_eq!(lp.cols().nuses(twin).unwrap(), 1);
        assert_eq!(lp.cols().nuses(best).unwrap(), 2);
    }

    #[test]
    fn test_forced_columns_bypass_limit() {
        let mut lp = Lp::new();
        let mut store = PriceStore::new(PriceStoreSettings::default());

        let f1 = column(&mut lp, "f1", 0.0, vec![(0, 1.0)]);
        let f2 = column(&mut lp, "f2", 0.0, vec![(1, 1.0)]);
        let n = column(&mut lp, "n", 1.0, vec![(2, 1.0)]);
        store.add_column(f1, 0.0, true, &mut lp).unwrap();
        store.add_column(f2, 0.0, true, &mut lp).unwrap();
        store.add_column(n, -1.0, false, &mut lp).unwrap();

        let result = store.select_best(&mut lp, 0).unwrap();
        assert_eq!(
            result,
            PriceRoundResult {
                n_added: 2,
                n_forced: 2,
                n_efficacious: 1
            }
        );
        assert!(!lp.is_column_in_lp(n));
    }
}
