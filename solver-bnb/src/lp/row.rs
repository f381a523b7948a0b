//! LP rows (constraints and cutting planes).

use sprs::CsVec;

use super::arena::ArenaItem;
use super::{sparse_from_entries, sparse_norm};
use crate::error::{BnbError, BnbResult};

/// Cached structural characteristics of a row.
///
/// These are the cheap fields compared first when two rows are checked for
/// being the same cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSummary {
    /// Number of nonzeros.
    pub len: usize,

    /// Smallest column index with a nonzero (0 for empty rows).
    pub min_idx: usize,

    /// Largest column index with a nonzero (0 for empty rows).
    pub max_idx: usize,

    /// Number of coefficients whose magnitude equals the maximum magnitude.
    pub num_max_val: usize,

    /// Maximum coefficient magnitude.
    pub max_val: f64,

    /// Euclidean norm of the coefficients.
    pub norm: f64,
}

/// A linear row `lhs <= a^T x <= rhs`.
#[derive(Debug, Clone)]
pub struct Row {
    name: String,
    coefs: CsVec<f64>,
    lhs: f64,
    rhs: f64,
    modifiable: bool,
    summary: RowSummary,
}

impl ArenaItem for Row {
    const KIND: &'static str = "row";
}

impl Row {
    /// Create a row over `num_cols` columns from `(column, value)` pairs.
    ///
    /// Entries may come in any order; explicit zeros are dropped.
    pub fn new(
        name: impl Into<String>,
        num_cols: usize,
        entries: Vec<(usize, f64)>,
        lhs: f64,
        rhs: f64,
    ) -> BnbResult<Self> {
        let name = name.into();
        if lhs.is_nan() || rhs.is_nan() || lhs > rhs {
            return Err(BnbError::InvalidData(format!(
                "row <{}> has invalid sides [{}, {}]",
                name, lhs, rhs
            )));
        }

        let coefs = sparse_from_entries(num_cols, entries, &name)?;
        let summary = Self::summarize(&coefs);

        Ok(Self {
            name,
            coefs,
            lhs,
            rhs,
            modifiable: false,
            summary,
        })
    }

    /// Mark the row as modifiable (subject to change by column generation).
    pub fn with_modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    fn summarize(coefs: &CsVec<f64>) -> RowSummary {
        let indices = coefs.indices();
        let max_val = coefs.data().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let num_max_val = coefs
            .data()
            .iter()
            .filter(|v| (v.abs() - max_val).abs() <= 1e-12 * max_val.max(1.0))
            .count();

        RowSummary {
            len: indices.len(),
            min_idx: indices.first().copied().unwrap_or(0),
            max_idx: indices.last().copied().unwrap_or(0),
            num_max_val,
            max_val,
            norm: sparse_norm(coefs),
        }
    }

    /// Row name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sparse coefficient vector (sorted by column index).
    pub fn coefs(&self) -> &CsVec<f64> {
        &self.coefs
    }

    /// Column indices of the nonzeros, ascending.
    pub fn indices(&self) -> &[usize] {
        self.coefs.indices()
    }

    /// Nonzero values, in column order.
    pub fn values(&self) -> &[f64] {
        self.coefs.data()
    }

    /// Left-hand side.
    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    /// Right-hand side.
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Whether the row may change during column generation.
    pub fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    /// Cached structural summary.
    pub fn summary(&self) -> &RowSummary {
        &self.summary
    }

    /// Number of nonzeros.
    pub fn len(&self) -> usize {
        self.summary.len
    }

    /// Check if the row has no nonzeros.
    pub fn is_empty(&self) -> bool {
        self.summary.len == 0
    }

    /// Euclidean norm of the coefficients.
    pub fn norm(&self) -> f64 {
        self.summary.norm
    }

    /// Compute `a^T x`. Missing entries of `x` count as zero.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefs
            .iter()
            .map(|(j, a)| a * x.get(j).copied().unwrap_or(0.0))
            .sum()
    }

    /// Distance to the nearer side: negative means violated.
    pub fn feasibility(&self, x: &[f64]) -> f64 {
        let activity = self.activity(x);
        (self.rhs - activity).min(activity - self.lhs)
    }

    /// Violation scaled by the row norm (positive means violated).
    pub fn efficacy(&self, x: &[f64]) -> f64 {
        let feasibility = self.feasibility(x);
        if self.summary.norm > 1e-12 {
            -feasibility / self.summary.norm
        } else {
            -feasibility
        }
    }

    /// Tolerant structural equality.
    ///
    /// Comparison order: length, min/max column index, count of maximal
    /// coefficients, sides, column indices, then coefficient values. Object
    /// identity and name are ignored.
    pub fn same_cut(&self, other: &Row, eps: f64) -> bool {
        let (a, b) = (&self.summary, &other.summary);
        if a.len != b.len
            || a.min_idx != b.min_idx
            || a.max_idx != b.max_idx
            || a.num_max_val != b.num_max_val
        {
            return false;
        }

        if !sides_close(self.lhs, other.lhs, eps) || !sides_close(self.rhs, other.rhs, eps) {
            return false;
        }

        if self.indices() != other.indices() {
            return false;
        }

        self.values()
            .iter()
            .zip(other.values())
            .all(|(x, y)| (x - y).abs() <= eps)
    }

    /// Hash of the structural summary; consistent with [`Row::same_cut`].
    pub fn structural_hash(&self) -> u64 {
        let s = &self.summary;
        ((s.num_max_val as u64) << 48)
            ^ ((s.len as u64) << 32)
            ^ ((s.min_idx as u64) << 16)
            ^ (s.max_idx as u64)
    }
}

/// Compare two sides, treating equal infinities as equal.
fn sides_close(a: f64, b: f64, eps: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= eps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: Vec<(usize, f64)>, lhs: f64, rhs: f64) -> Row {
        Row::new("r", 10, entries, lhs, rhs).unwrap()
    }

    #[test]
    fn test_row_sorted_and_summarized() {
        let r = row(vec![(5, -2.0), (1, 1.0), (3, 2.0), (7, 0.0)], f64::NEG_INFINITY, 4.0);
        assert_eq!(r.indices(), &[1, 3, 5]);
        assert_eq!(r.values(), &[1.0, 2.0, -2.0]);

        let s = r.summary();
        assert_eq!(s.len, 3);
        assert_eq!(s.min_idx, 1);
        assert_eq!(s.max_idx, 5);
        assert_eq!(s.num_max_val, 2);
        assert!((s.max_val - 2.0).abs() < 1e-12);
        assert!((s.norm - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_rows_rejected() {
        assert!(Row::new("dup", 4, vec![(1, 1.0), (1, 2.0)], 0.0, 1.0).is_err());
        assert!(Row::new("range", 4, vec![(4, 1.0)], 0.0, 1.0).is_err());
        assert!(Row::new("sides", 4, vec![(0, 1.0)], 2.0, 1.0).is_err());
        assert!(Row::new("nan", 4, vec![(0, f64::NAN)], 0.0, 1.0).is_err());
    }

    #[test]
    fn test_feasibility() {
        // x0 + x1 <= 1
        let r = row(vec![(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, 1.0);

        assert!((r.feasibility(&[0.25, 0.25]) - 0.5).abs() < 1e-12);
        assert!((r.feasibility(&[0.75, 0.75]) + 0.5).abs() < 1e-12);

        let eff = r.efficacy(&[0.75, 0.75]);
        assert!((eff - 0.5 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_same_cut_is_tolerant() {
        let a = row(vec![(0, 1.0), (2, 3.0)], 0.0, 5.0);
        let b = row(vec![(2, 3.0 + 1e-12), (0, 1.0)], 0.0, 5.0);
        let c = row(vec![(0, 1.0), (2, 3.0)], 0.0, 6.0);
        let d = row(vec![(0, 1.0), (3, 3.0)], 0.0, 5.0);

        assert!(a.same_cut(&b, 1e-9));
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert!(!a.same_cut(&c, 1e-9));
        assert!(!a.same_cut(&d, 1e-9));
    }
}
