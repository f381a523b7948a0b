//! LP basis snapshots used for warm starts.

use super::arena::ArenaItem;

/// Basis status of a row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasisStatus {
    /// Nonbasic at lower bound.
    #[default]
    Lower,

    /// Basic.
    Basic,

    /// Nonbasic at upper bound.
    Upper,

    /// Free nonbasic variable at zero.
    Zero,
}

/// Captured LP basis.
///
/// A leaf keeps the basis its parent was solved with so that its own LP can
/// be warm started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpState {
    /// Status of each LP column.
    pub col_status: Vec<BasisStatus>,

    /// Status of each LP row.
    pub row_status: Vec<BasisStatus>,
}

impl ArenaItem for LpState {
    const KIND: &'static str = "lp state";
}

impl LpState {
    /// Create a basis snapshot.
    pub fn new(col_status: Vec<BasisStatus>, row_status: Vec<BasisStatus>) -> Self {
        Self {
            col_status,
            row_status,
        }
    }

    /// Number of basic entries.
    pub fn num_basic(&self) -> usize {
        self.col_status
            .iter()
            .chain(&self.row_status)
            .filter(|s| **s == BasisStatus::Basic)
            .count()
    }
}
