//! Configuration settings for the branch-and-bound core.

/// Leaf selection strategy for the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeSelection {
    /// Always select the leaf with the best (lowest) lower bound.
    #[default]
    BestBound,

    /// Depth-first search (helps find feasible solutions quickly).
    DepthFirst,

    /// Hybrid: alternate between diving and best-bound.
    Hybrid {
        /// How often to dive (every N pops).
        dive_freq: usize,
    },
}

/// Rule deciding when a solved fork is flattened into a subroot.
///
/// A subroot stores the full LP row list, so reconstructing any descendant
/// starts there instead of replaying every delta up to the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubrootPolicy {
    /// Flatten once this many forks separate the node from its nearest
    /// subroot (or the root). Zero disables the rule.
    pub max_fork_chain: usize,

    /// Flatten once the delta rows replayed from the nearest subroot exceed
    /// this fraction of the current LP row count.
    pub max_delta_ratio: f64,

    /// The delta ratio rule only applies to LPs with at least this many rows.
    pub min_rows_for_ratio: usize,
}

impl Default for SubrootPolicy {
    fn default() -> Self {
        Self {
            max_fork_chain: 8,
            max_delta_ratio: 0.5,
            min_rows_for_ratio: 16,
        }
    }
}

impl SubrootPolicy {
    /// A policy that never flattens (only forced conversions happen).
    pub fn never() -> Self {
        Self {
            max_fork_chain: 0,
            max_delta_ratio: f64::INFINITY,
            min_rows_for_ratio: usize::MAX,
        }
    }

    /// Decide from the chain statistics of a freshly solved node.
    pub fn should_flatten(&self, fork_chain: usize, delta_rows: usize, lp_rows: usize) -> bool {
        if self.max_fork_chain > 0 && fork_chain >= self.max_fork_chain {
            return true;
        }
        lp_rows >= self.min_rows_for_ratio
            && delta_rows as f64 > self.max_delta_ratio * lp_rows as f64
    }
}

/// Search tree settings.
#[derive(Debug, Clone, Default)]
pub struct TreeSettings {
    /// Leaf selection strategy.
    pub node_selection: NodeSelection,

    /// Fork to subroot conversion rule.
    pub subroot_policy: SubrootPolicy,
}

/// Settings shared by cut and column pools.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of consecutive useless rounds before an entry is evicted.
    pub age_limit: usize,

    /// Feasibility tolerance for violation / reduced cost checks.
    pub feas_tol: f64,

    /// Tolerance of the structural duplicate comparison.
    pub dedup_eps: f64,

    /// Initial capacity of the entry array.
    pub initial_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            age_limit: 100,
            feas_tol: 1e-6,
            dedup_eps: 1e-9,
            initial_capacity: 64,
        }
    }
}

impl PoolSettings {
    /// Set the age limit.
    pub fn with_age_limit(mut self, age_limit: usize) -> Self {
        self.age_limit = age_limit;
        self
    }

    /// Set the feasibility tolerance.
    pub fn with_feas_tol(mut self, tol: f64) -> Self {
        self.feas_tol = tol;
        self
    }
}

/// Price store settings.
#[derive(Debug, Clone)]
pub struct PriceStoreSettings {
    /// Columns with orthogonality below this to a selected column are penalized.
    pub min_col_orth: f64,

    /// Weight of the efficacy in the column score.
    pub efficacy_weight: f64,

    /// Weight of the objective parallelism in the column score.
    pub objparal_weight: f64,

    /// Weight of the orthogonality in the column score.
    pub ortho_weight: f64,

    /// Score penalty applied to columns too parallel to a selected column.
    pub parallel_penalty: f64,

    /// Maximum number of non-forced columns admitted per round.
    pub max_cols: usize,

    /// A column is efficacious if its reduced cost is below `-red_cost_tol`.
    pub red_cost_tol: f64,
}

impl Default for PriceStoreSettings {
    fn default() -> Self {
        Self {
            min_col_orth: 0.0,
            efficacy_weight: 1.0,
            objparal_weight: 0.0,
            ortho_weight: 0.0,
            parallel_penalty: 1e3,
            max_cols: 100,
            red_cost_tol: 1e-6,
        }
    }
}

impl PriceStoreSettings {
    /// Set the minimal column orthogonality.
    pub fn with_min_col_orth(mut self, orth: f64) -> Self {
        self.min_col_orth = orth;
        self
    }

    /// Set the score weights (efficacy, objective parallelism, orthogonality).
    pub fn with_weights(mut self, efficacy: f64, objparal: f64, ortho: f64) -> Self {
        self.efficacy_weight = efficacy;
        self.objparal_weight = objparal;
        self.ortho_weight = ortho;
        self
    }
}

/// Aggregate settings for a branch-and-bound run.
#[derive(Debug, Clone)]
pub struct BnbSettings {
    /// Search tree settings.
    pub tree: TreeSettings,

    /// Cut pool settings.
    pub cut_pool: PoolSettings,

    /// Column pool settings.
    pub col_pool: PoolSettings,

    /// Price store settings.
    pub price_store: PriceStoreSettings,

    /// Maximum cuts applied from the separation store per round.
    pub max_cuts_per_round: usize,

    // === Output ===
    /// Print progress information.
    pub verbose: bool,

    /// Log frequency (print every N processed nodes).
    pub log_freq: u64,
}

impl Default for BnbSettings {
    fn default() -> Self {
        Self {
            tree: TreeSettings::default(),
            cut_pool: PoolSettings::default(),
            col_pool: PoolSettings {
                age_limit: 10,
                ..PoolSettings::default()
            },
            price_store: PriceStoreSettings::default(),
            max_cuts_per_round: 100,
            verbose: false,
            log_freq: 100,
        }
    }
}

impl BnbSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.verbose = true;
        s.log_freq = 1;
        s
    }

    /// Set the leaf selection strategy.
    pub fn with_node_selection(mut self, selection: NodeSelection) -> Self {
        self.tree.node_selection = selection;
        self
    }

    /// Set the fork to subroot conversion rule.
    pub fn with_subroot_policy(mut self, policy: SubrootPolicy) -> Self {
        self.tree.subroot_policy = policy;
        self
    }

    /// Set the cut pool age limit.
    pub fn with_cut_age_limit(mut self, age_limit: usize) -> Self {
        self.cut_pool.age_limit = age_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subroot_policy_chain() {
        let policy = SubrootPolicy {
            max_fork_chain: 3,
            ..Default::default()
        };
        assert!(!policy.should_flatten(2, 0, 100));
        assert!(policy.should_flatten(3, 0, 100));
    }

    #[test]
    fn test_subroot_policy_ratio() {
        let policy = SubrootPolicy::default();
        // 40 delta rows against 50 LP rows exceeds the 0.5 ratio
        assert!(policy.should_flatten(1, 40, 50));
        assert!(!policy.should_flatten(1, 20, 50));
        // Small LPs never trigger the ratio rule
        assert!(!policy.should_flatten(1, 10, 10));
        assert!(!SubrootPolicy::never().should_flatten(1000, 1000, 1000));
    }

    #[test]
    fn test_builders() {
        let s = BnbSettings::verbose()
            .with_cut_age_limit(2)
            .with_node_selection(NodeSelection::DepthFirst);
        assert!(s.verbose);
        assert_eq!(s.cut_pool.age_limit, 2);
        assert_eq!(s.tree.node_selection, NodeSelection::DepthFirst);
    }
}
