//! Pricing columns.

use sprs::CsVec;

use super::arena::ArenaItem;
use super::{sparse_dot, sparse_from_entries, sparse_norm};
use crate::error::{BnbError, BnbResult};

/// A variable of the master LP, with its coefficients in the master
/// constraints.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    obj: f64,
    lb: f64,
    ub: f64,
    coefs: CsVec<f64>,
    modifiable: bool,
    norm: f64,
}

impl ArenaItem for Column {
    const KIND: &'static str = "column";
}

impl Column {
    /// Create a column with objective `obj`, bounds `[lb, ub]` and
    /// coefficients `(constraint, value)` over `num_conss` master constraints.
    pub fn new(
        name: impl Into<String>,
        obj: f64,
        lb: f64,
        ub: f64,
        num_conss: usize,
        entries: Vec<(usize, f64)>,
    ) -> BnbResult<Self> {
        let name = name.into();
        if !obj.is_finite() || lb.is_nan() || ub.is_nan() || lb > ub {
            return Err(BnbError::InvalidData(format!(
                "column <{}> has invalid objective or bounds",
                name
            )));
        }

        let coefs = sparse_from_entries(num_conss, entries, &name)?;
        let norm = sparse_norm(&coefs);

        Ok(Self {
            name,
            obj,
            lb,
            ub,
            coefs,
            modifiable: false,
            norm,
        })
    }

    /// Mark the column as modifiable.
    pub fn with_modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Objective coefficient.
    pub fn obj(&self) -> f64 {
        self.obj
    }

    /// Lower bound.
    pub fn lb(&self) -> f64 {
        self.lb
    }

    /// Upper bound.
    pub fn ub(&self) -> f64 {
        self.ub
    }

    /// Sparse coefficients over master constraints.
    pub fn coefs(&self) -> &CsVec<f64> {
        &self.coefs
    }

    /// Whether the column may still change.
    pub fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    /// Euclidean norm of the constraint coefficients.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Reduced cost `c_j - y^T a_j` for dual values `y`.
    pub fn reduced_cost(&self, duals: &[f64]) -> f64 {
        self.obj - self.dual_activity(duals)
    }

    /// Farkas pricing value `-y^T a_j` for a Farkas proof `y`.
    pub fn farkas_value(&self, farkas: &[f64]) -> f64 {
        -self.dual_activity(farkas)
    }

    fn dual_activity(&self, y: &[f64]) -> f64 {
        self.coefs
            .iter()
            .map(|(i, a)| a * y.get(i).copied().unwrap_or(0.0))
            .sum()
    }

    /// Cosine between the column `(c_j, a_j)` and the objective axis.
    pub fn objective_parallelism(&self) -> f64 {
        let full = (self.obj * self.obj + self.norm * self.norm).sqrt();
        if full > 1e-12 {
            self.obj.abs() / full
        } else {
            0.0
        }
    }

    /// `1 - |cos|` of the angle between the constraint coefficient vectors.
    pub fn orthogonality(&self, other: &Column) -> f64 {
        let denom = self.norm * other.norm;
        if denom <= 1e-12 {
            return 1.0;
        }
        1.0 - (sparse_dot(&self.coefs, &other.coefs) / denom).abs()
    }

    /// Tolerant structural equality (objective, bounds, pattern, values).
    pub fn same_column(&self, other: &Column, eps: f64) -> bool {
        if self.coefs.nnz() != other.coefs.nnz()
            || (self.obj - other.obj).abs() > eps
            || !bounds_close(self.lb, other.lb, eps)
            || !bounds_close(self.ub, other.ub, eps)
            || self.coefs.indices() != other.coefs.indices()
        {
            return false;
        }

        self.coefs
            .data()
            .iter()
            .zip(other.coefs.data())
            .all(|(x, y)| (x - y).abs() <= eps)
    }

    /// Hash of the sparsity pattern; consistent with [`Column::same_column`].
    pub fn structural_hash(&self) -> u64 {
        let indices = self.coefs.indices();
        let first = indices.first().copied().unwrap_or(0) as u64;
        let last = indices.last().copied().unwrap_or(0) as u64;
        ((indices.len() as u64) << 40) ^ (first << 20) ^ last
    }
}

fn bounds_close(a: f64, b: f64, eps: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= eps
}
