//! Best known feasible solution.

/// Compute the relative gap between a primal and a dual bound.
pub fn compute_gap(primal: f64, dual: f64) -> f64 {
    if primal.is_infinite() || dual.is_infinite() {
        return f64::INFINITY;
    }
    let denom = primal.abs().max(1e-10);
    (primal - dual).abs() / denom
}

/// Tracks the best known feasible solution (incumbent).
///
/// Its objective value is the cutoff bound for the search: leaves whose
/// lower bound reaches it cannot contain a better solution.
#[derive(Debug, Clone)]
pub struct Incumbent {
    /// Current best solution (if any).
    pub solution: Option<Vec<f64>>,

    /// Objective value of incumbent (primal bound).
    /// Initialized to +inf for minimization.
    pub obj_val: f64,

    /// Number of times incumbent was updated.
    pub update_count: u64,
}

impl Default for Incumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl Incumbent {
    /// Create an empty incumbent.
    pub fn new() -> Self {
        Self {
            solution: None,
            obj_val: f64::INFINITY,
            update_count: 0,
        }
    }

    /// Check if we have an incumbent.
    pub fn has_incumbent(&self) -> bool {
        self.solution.is_some()
    }

    /// Try to update incumbent with a new solution.
    ///
    /// Returns true if the incumbent was improved.
    pub fn update(&mut self, x: &[f64], obj: f64) -> bool {
        if obj < self.obj_val - 1e-9 {
            self.solution = Some(x.to_vec());
            self.obj_val = obj;
            self.update_count += 1;
            true
        } else {
            false
        }
    }

    /// Cutoff bound for pruning.
    pub fn cutoff(&self) -> f64 {
        self.obj_val
    }

    /// Compute relative gap to a dual bound.
    pub fn gap(&self, dual_bound: f64) -> f64 {
        compute_gap(self.obj_val, dual_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incumbent_updates() {
        let mut incumbent = Incumbent::new();
        assert!(!incumbent.has_incumbent());
        assert_eq!(incumbent.cutoff(), f64::INFINITY);

        assert!(incumbent.update(&[1.0, 2.0], 10.0));
        assert_eq!(incumbent.cutoff(), 10.0);

        // Worse solution (rejected)
        assert!(!incumbent.update(&[2.0, 3.0], 15.0));
        assert_eq!(incumbent.update_count, 1);

        assert!(incumbent.update(&[0.5, 1.0], 5.0));
        assert_eq!(incumbent.solution.as_deref(), Some(&[0.5, 1.0][..]));
        assert_eq!(incumbent.update_count, 2);
    }

    #[test]
    fn test_gap_computation() {
        // Gap = |10 - 8| / |10| = 0.2
        assert!((compute_gap(10.0, 8.0) - 0.2).abs() < 1e-10);
        assert_eq!(compute_gap(f64::INFINITY, 8.0), f64::INFINITY);
        assert_eq!(Incumbent::new().gap(0.0), f64::INFINITY);
    }
}
